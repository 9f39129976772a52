//! Town aggregate and relationship records

use serde::Serialize;
use uuid::Uuid;

use crate::leveling::xp_threshold;

/// Plots a town may claim per level
pub const PLOTS_PER_LEVEL: u32 = 5;

/// Claim limit reported for towns that do not exist
pub const DEFAULT_MAX_PLOTS: u32 = PLOTS_PER_LEVEL;

/// A town, persisted as one row of `towns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Town {
    pub id: Uuid,
    /// Unique across all towns
    pub name: String,
    pub owner_id: Uuid,
    pub center_plot_id: String,
    /// Always at least 1
    pub level: u32,
    pub budget: i64,
    /// `0 <= xp < xp_to_next_level` after every leveling operation
    pub xp: i64,
    pub xp_to_next_level: i64,
    pub tax: u32,
    pub max_claimed_plots: u32,
    pub is_public: bool,
}

impl Town {
    /// A fresh level-1 town with a random id
    pub fn new(name: &str, owner_id: Uuid, center_plot_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            center_plot_id: center_plot_id.to_string(),
            level: 1,
            budget: 0,
            xp: 0,
            xp_to_next_level: xp_threshold(1),
            tax: 0,
            max_claimed_plots: PLOTS_PER_LEVEL,
            is_public: false,
        }
    }
}

/// A player's membership in a town
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citizen {
    pub player_id: Uuid,
    pub town_id: Uuid,
    pub role: String,
}

/// A named permission set within a town
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rank {
    pub town_id: Uuid,
    pub name: String,
    pub permissions: String,
}
