//! Town level progression
//!
//! Pure functions over [`Town`]; persisting the result is up to the caller.

use serde::Serialize;

use crate::town::{Town, PLOTS_PER_LEVEL};

/// XP needed to advance from `level` to the next level
pub fn xp_threshold(level: u32) -> i64 {
    (1000.0 * level as f64 * 1.5).round() as i64
}

/// Result of an XP grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LevelOutcome {
    pub levels_gained: u32,
}

impl LevelOutcome {
    pub fn leveled_up(&self) -> bool {
        self.levels_gained > 0
    }
}

/// Add `amount` XP and consume whole levels
///
/// Negative amounts remove XP down to zero but never remove a level.
pub fn apply_xp(town: &mut Town, amount: i64) -> LevelOutcome {
    let mut outcome = LevelOutcome::default();
    town.level = town.level.max(1);
    town.xp = town.xp.saturating_add(amount).max(0);

    let mut threshold = xp_threshold(town.level);
    while town.xp >= threshold {
        town.xp -= threshold;
        town.level += 1;
        outcome.levels_gained += 1;
        threshold = xp_threshold(town.level);
    }
    town.xp_to_next_level = threshold;
    outcome
}

/// Manual upgrade: one level up, XP reset, claim limit raised
pub fn upgrade(town: &mut Town) {
    town.level = town.level.max(1) + 1;
    town.xp = 0;
    town.xp_to_next_level = xp_threshold(town.level);
    town.max_claimed_plots = town.level * PLOTS_PER_LEVEL;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn fresh_town() -> Town {
        Town::new("Testville", Uuid::new_v4(), "0:0")
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(xp_threshold(1), 1500);
        assert_eq!(xp_threshold(2), 3000);
        assert_eq!(xp_threshold(3), 4500);
    }

    #[test]
    fn test_exact_level_up() {
        let mut town = fresh_town();
        let outcome = apply_xp(&mut town, 1500);
        assert_eq!(outcome.levels_gained, 1);
        assert_eq!(town.level, 2);
        assert_eq!(town.xp, 0);
        assert_eq!(town.xp_to_next_level, 3000);
    }

    #[test]
    fn test_multi_level_up() {
        let mut town = fresh_town();
        let outcome = apply_xp(&mut town, 4000);
        assert_eq!(outcome.levels_gained, 1);
        assert_eq!(town.level, 2);
        assert_eq!(town.xp, 2500);

        let mut town = fresh_town();
        let outcome = apply_xp(&mut town, 5000);
        assert_eq!(outcome.levels_gained, 2);
        assert_eq!(town.level, 3);
        assert_eq!(town.xp, 500);
        assert_eq!(town.xp_to_next_level, 4500);
    }

    #[test]
    fn test_below_threshold() {
        let mut town = fresh_town();
        let outcome = apply_xp(&mut town, 1499);
        assert!(!outcome.leveled_up());
        assert_eq!(town.level, 1);
        assert_eq!(town.xp, 1499);
        assert!(town.xp < town.xp_to_next_level);
    }

    #[test]
    fn test_negative_xp_clamps() {
        let mut town = fresh_town();
        apply_xp(&mut town, 200);
        let outcome = apply_xp(&mut town, -1000);
        assert!(!outcome.leveled_up());
        assert_eq!(town.xp, 0);
        assert_eq!(town.level, 1);
    }

    #[test]
    fn test_upgrade() {
        let mut town = fresh_town();
        apply_xp(&mut town, 700);
        upgrade(&mut town);
        assert_eq!(town.level, 2);
        assert_eq!(town.xp, 0);
        assert_eq!(town.max_claimed_plots, 10);
        assert_eq!(town.xp_to_next_level, 3000);
    }
}
