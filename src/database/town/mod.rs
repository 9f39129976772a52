//! Town repository
//!
//! CRUD for the town aggregate and its relationship tables (plots,
//! citizens, ranks, invitations). All five tables share one connection.
//! Like the attribute store, reads fall back to `None`, an empty list or a
//! documented default when anything goes wrong, and writes log failures
//! instead of returning them.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::core::{
    ConnectionManager, DatabaseConn, Dialect, SqlParam, SqlValue, CITIZENS_TABLE,
    INVITATIONS_TABLE, PLOTS_TABLE, RANKS_TABLE, TOWNS_TABLE,
};
use crate::error::{StoreError, StoreResult};
use crate::leveling::{self, LevelOutcome};
use crate::town::{Citizen, Rank, Town, DEFAULT_MAX_PLOTS};

/// Callback fired after a town gains one or more levels
pub type LevelUpHook = Box<dyn Fn(&Town, u32) + Send + Sync>;

const TOWN_COLUMNS: [&str; 11] = [
    "Id",
    "Name",
    "Owner",
    "CenterPlotId",
    "Level",
    "Budget",
    "Xp",
    "XpToNextLevel",
    "Tax",
    "MaxClaimedPlots",
    "IsPublic",
];

const SELECT_TOWN: &str = "SELECT t.Id, t.Name, t.Owner, t.CenterPlotId, t.Level, t.Budget, \
                           t.Xp, t.XpToNextLevel, t.Tax, t.MaxClaimedPlots, t.IsPublic \
                           FROM towns t";

/// Typed column access for one result row
struct RowReader<'a> {
    row: &'a [SqlValue],
    table: &'static str,
}

impl RowReader<'_> {
    fn invalid(&self, column: &str) -> StoreError {
        StoreError::InvalidRow(format!("{}.{}", self.table, column))
    }

    fn uuid(&self, index: usize, column: &str) -> StoreResult<Uuid> {
        self.row
            .get(index)
            .and_then(SqlValue::as_uuid)
            .ok_or_else(|| self.invalid(column))
    }

    fn text(&self, index: usize, column: &str) -> StoreResult<String> {
        self.row
            .get(index)
            .and_then(SqlValue::as_text)
            .ok_or_else(|| self.invalid(column))
    }

    fn int(&self, index: usize, column: &str) -> StoreResult<i64> {
        self.row
            .get(index)
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| self.invalid(column))
    }

    fn uint(&self, index: usize, column: &str) -> StoreResult<u32> {
        u32::try_from(self.int(index, column)?).map_err(|_| self.invalid(column))
    }

    fn flag(&self, index: usize, column: &str) -> StoreResult<bool> {
        self.row
            .get(index)
            .and_then(SqlValue::as_bool)
            .ok_or_else(|| self.invalid(column))
    }
}

fn town_from_row(row: &[SqlValue]) -> StoreResult<Town> {
    let r = RowReader {
        row,
        table: TOWNS_TABLE,
    };
    Ok(Town {
        id: r.uuid(0, "Id")?,
        name: r.text(1, "Name")?,
        owner_id: r.uuid(2, "Owner")?,
        center_plot_id: r.text(3, "CenterPlotId")?,
        level: r.uint(4, "Level")?,
        budget: r.int(5, "Budget")?,
        xp: r.int(6, "Xp")?,
        xp_to_next_level: r.int(7, "XpToNextLevel")?,
        tax: r.uint(8, "Tax")?,
        max_claimed_plots: r.uint(9, "MaxClaimedPlots")?,
        is_public: r.flag(10, "IsPublic")?,
    })
}

fn town_params(town: &Town) -> Vec<SqlParam> {
    vec![
        SqlParam::from(town.id),
        SqlParam::from(town.name.as_str()),
        SqlParam::from(town.owner_id),
        SqlParam::from(town.center_plot_id.as_str()),
        SqlParam::from(town.level),
        SqlParam::from(town.budget),
        SqlParam::from(town.xp),
        SqlParam::from(town.xp_to_next_level),
        SqlParam::from(town.tax),
        SqlParam::from(town.max_claimed_plots),
        SqlParam::from(town.is_public),
    ]
}

fn query_towns(conn: &mut DatabaseConn, sql: &str, params: &[SqlParam]) -> StoreResult<Vec<Town>> {
    conn.query(sql, params)?
        .iter()
        .map(|row| town_from_row(row))
        .collect()
}

/// Repository for the town aggregate and its relationships
pub struct TownRepository {
    manager: Arc<ConnectionManager>,
    level_up_hook: LevelUpHook,
}

impl TownRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            level_up_hook: Box::new(|town: &Town, gained: u32| {
                info!(
                    "Town '{}' gained {} level(s), now level {}",
                    town.name, gained, town.level
                );
            }),
        }
    }

    /// Replace the level-up notification hook
    pub fn on_level_up<F>(&mut self, hook: F)
    where
        F: Fn(&Town, u32) + Send + Sync + 'static,
    {
        self.level_up_hook = Box::new(hook);
    }

    fn dialect(&self) -> &'static dyn Dialect {
        self.manager.dialect()
    }

    /// Run `op` on the shared connection, logging and falling back on error
    fn run<T, F>(&self, action: &str, fallback: T, op: F) -> T
    where
        F: FnOnce(&mut DatabaseConn) -> StoreResult<T>,
    {
        match self.manager.with_connection(op) {
            Ok(value) => value,
            Err(e) => {
                error!("Error while {}: {}", action, e);
                fallback
            }
        }
    }

    // =========================================================================
    // Aggregate
    // =========================================================================

    /// Insert or update every scalar field of `town`, keyed by its id
    ///
    /// Refused (and logged) when another town already uses the name.
    pub fn upsert_town(&self, town: &Town) {
        let sql = self.dialect().upsert(TOWNS_TABLE, &TOWN_COLUMNS, &["Id"]);
        let saved = self.run("saving town", None, |conn| {
            let holder = conn.query_first(
                "SELECT Id FROM towns WHERE Name = ?",
                &[SqlParam::from(town.name.as_str())],
            )?;
            if let Some(row) = holder {
                if row.first().and_then(SqlValue::as_uuid) != Some(town.id) {
                    return Ok(Some(false));
                }
            }
            conn.execute(&sql, &town_params(town))?;
            Ok(Some(true))
        });
        match saved {
            Some(true) => debug!("Saved town '{}' ({})", town.name, town.id),
            Some(false) => warn!(
                "Town name '{}' is already taken, not saving {}",
                town.name, town.id
            ),
            None => {}
        }
    }

    pub fn get_town(&self, id: Uuid) -> Option<Town> {
        let sql = format!("{} WHERE t.Id = ?", SELECT_TOWN);
        self.run("loading town", None, |conn| {
            Ok(query_towns(conn, &sql, &[SqlParam::from(id)])?
                .into_iter()
                .next())
        })
    }

    pub fn get_town_by_name(&self, name: &str) -> Option<Town> {
        let sql = format!("{} WHERE t.Name = ?", SELECT_TOWN);
        self.run("loading town by name", None, |conn| {
            Ok(query_towns(conn, &sql, &[SqlParam::from(name)])?
                .into_iter()
                .next())
        })
    }

    /// First town the player is a citizen of
    pub fn get_town_by_member(&self, player: Uuid) -> Option<Town> {
        let sql = format!(
            "{} JOIN town_citizens c ON c.TownId = t.Id WHERE c.PlayerId = ? LIMIT 1",
            SELECT_TOWN
        );
        self.run("loading town by member", None, |conn| {
            Ok(query_towns(conn, &sql, &[SqlParam::from(player)])?
                .into_iter()
                .next())
        })
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.run("checking town name", false, |conn| {
            Ok(conn
                .query_first(
                    "SELECT 1 FROM towns WHERE Name = ? LIMIT 1",
                    &[SqlParam::from(name)],
                )?
                .is_some())
        })
    }

    /// Delete a town and every row that references it
    ///
    /// Each table is cleared by its own statement; there is no transaction
    /// spanning them.
    pub fn delete_town(&self, id: Uuid) -> bool {
        self.run("deleting town", false, |conn| {
            for table in [PLOTS_TABLE, CITIZENS_TABLE, RANKS_TABLE, INVITATIONS_TABLE] {
                let sql = format!("DELETE FROM {} WHERE TownId = ?", table);
                conn.execute(&sql, &[SqlParam::from(id)])?;
            }
            let removed = conn.execute("DELETE FROM towns WHERE Id = ?", &[SqlParam::from(id)])?;
            Ok(removed > 0)
        })
    }

    // =========================================================================
    // Plots
    // =========================================================================

    /// Assign a plot to a town, taking it from any previous owner
    pub fn assign_plot(&self, plot_id: &str, town_id: Uuid) {
        let sql = self
            .dialect()
            .upsert(PLOTS_TABLE, &["PlotId", "TownId"], &["PlotId"]);
        self.run("assigning plot", (), |conn| {
            conn.execute(&sql, &[SqlParam::from(plot_id), SqlParam::from(town_id)])?;
            Ok(())
        })
    }

    pub fn unassign_plot(&self, plot_id: &str) -> bool {
        self.run("unassigning plot", false, |conn| {
            Ok(conn.execute(
                "DELETE FROM town_plots WHERE PlotId = ?",
                &[SqlParam::from(plot_id)],
            )? > 0)
        })
    }

    pub fn is_plot_assigned(&self, plot_id: &str) -> bool {
        self.town_of_plot(plot_id).is_some()
    }

    pub fn town_of_plot(&self, plot_id: &str) -> Option<Uuid> {
        self.run("looking up plot", None, |conn| {
            Ok(conn
                .query_first(
                    "SELECT TownId FROM town_plots WHERE PlotId = ?",
                    &[SqlParam::from(plot_id)],
                )?
                .and_then(|row| row.first().and_then(SqlValue::as_uuid)))
        })
    }

    pub fn list_plots(&self, town_id: Uuid) -> Vec<String> {
        self.run("listing plots", Vec::new(), |conn| {
            Ok(conn
                .query(
                    "SELECT PlotId FROM town_plots WHERE TownId = ? ORDER BY PlotId",
                    &[SqlParam::from(town_id)],
                )?
                .iter()
                .filter_map(|row| row.first().and_then(SqlValue::as_text))
                .collect())
        })
    }

    // =========================================================================
    // Citizens
    // =========================================================================

    /// Add a membership, or change the role of an existing one
    ///
    /// Membership in several towns at once is allowed.
    pub fn add_citizen(&self, player: Uuid, town_id: Uuid, role: &str) {
        let sql = self.dialect().upsert(
            CITIZENS_TABLE,
            &["PlayerId", "TownId", "Role"],
            &["PlayerId", "TownId"],
        );
        self.run("adding citizen", (), |conn| {
            conn.execute(
                &sql,
                &[
                    SqlParam::from(player),
                    SqlParam::from(town_id),
                    SqlParam::from(role),
                ],
            )?;
            Ok(())
        })
    }

    pub fn remove_citizen(&self, player: Uuid, town_id: Uuid) -> bool {
        self.run("removing citizen", false, |conn| {
            Ok(conn.execute(
                "DELETE FROM town_citizens WHERE PlayerId = ? AND TownId = ?",
                &[SqlParam::from(player), SqlParam::from(town_id)],
            )? > 0)
        })
    }

    pub fn list_citizens(&self, town_id: Uuid) -> Vec<Citizen> {
        self.run("listing citizens", Vec::new(), |conn| {
            conn.query(
                "SELECT PlayerId, TownId, Role FROM town_citizens WHERE TownId = ? ORDER BY Role, PlayerId",
                &[SqlParam::from(town_id)],
            )?
            .iter()
            .map(|row| -> StoreResult<Citizen> {
                let r = RowReader {
                    row,
                    table: CITIZENS_TABLE,
                };
                Ok(Citizen {
                    player_id: r.uuid(0, "PlayerId")?,
                    town_id: r.uuid(1, "TownId")?,
                    role: r.text(2, "Role")?,
                })
            })
            .collect()
        })
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    pub fn invite(&self, player: Uuid, town_id: Uuid) {
        let cols = ["PlayerId", "TownId"];
        let sql = self.dialect().upsert(INVITATIONS_TABLE, &cols, &cols);
        self.run("inviting player", (), |conn| {
            conn.execute(&sql, &[SqlParam::from(player), SqlParam::from(town_id)])?;
            Ok(())
        })
    }

    pub fn has_invitation(&self, player: Uuid, town_id: Uuid) -> bool {
        self.run("checking invitation", false, |conn| {
            Ok(conn
                .query_first(
                    "SELECT 1 FROM town_invitations WHERE PlayerId = ? AND TownId = ? LIMIT 1",
                    &[SqlParam::from(player), SqlParam::from(town_id)],
                )?
                .is_some())
        })
    }

    /// Remove a pending invitation (on accept, decline or revoke)
    pub fn revoke_invitation(&self, player: Uuid, town_id: Uuid) -> bool {
        self.run("revoking invitation", false, |conn| {
            Ok(conn.execute(
                "DELETE FROM town_invitations WHERE PlayerId = ? AND TownId = ?",
                &[SqlParam::from(player), SqlParam::from(town_id)],
            )? > 0)
        })
    }

    /// Towns with a pending invitation for the player
    pub fn list_invited_towns(&self, player: Uuid) -> Vec<Town> {
        let sql = format!(
            "{} JOIN town_invitations i ON i.TownId = t.Id WHERE i.PlayerId = ? ORDER BY t.Name",
            SELECT_TOWN
        );
        self.run("listing invitations", Vec::new(), |conn| {
            query_towns(conn, &sql, &[SqlParam::from(player)])
        })
    }

    // =========================================================================
    // Ranks
    // =========================================================================

    pub fn set_rank(&self, town_id: Uuid, rank: &str, permissions: &str) {
        let sql = self.dialect().upsert(
            RANKS_TABLE,
            &["TownId", "RankName", "Permissions"],
            &["TownId", "RankName"],
        );
        self.run("saving rank", (), |conn| {
            conn.execute(
                &sql,
                &[
                    SqlParam::from(town_id),
                    SqlParam::from(rank),
                    SqlParam::from(permissions),
                ],
            )?;
            Ok(())
        })
    }

    pub fn rank_permissions(&self, town_id: Uuid, rank: &str) -> Option<String> {
        self.run("loading rank", None, |conn| {
            Ok(conn
                .query_first(
                    "SELECT Permissions FROM town_ranks WHERE TownId = ? AND RankName = ?",
                    &[SqlParam::from(town_id), SqlParam::from(rank)],
                )?
                .and_then(|row| row.first().and_then(SqlValue::as_text)))
        })
    }

    pub fn list_ranks(&self, town_id: Uuid) -> Vec<Rank> {
        self.run("listing ranks", Vec::new(), |conn| {
            conn.query(
                "SELECT TownId, RankName, Permissions FROM town_ranks WHERE TownId = ? ORDER BY RankName",
                &[SqlParam::from(town_id)],
            )?
            .iter()
            .map(|row| -> StoreResult<Rank> {
                let r = RowReader {
                    row,
                    table: RANKS_TABLE,
                };
                Ok(Rank {
                    town_id: r.uuid(0, "TownId")?,
                    name: r.text(1, "RankName")?,
                    permissions: r.text(2, "Permissions").unwrap_or_default(),
                })
            })
            .collect()
        })
    }

    pub fn remove_rank(&self, town_id: Uuid, rank: &str) -> bool {
        self.run("removing rank", false, |conn| {
            Ok(conn.execute(
                "DELETE FROM town_ranks WHERE TownId = ? AND RankName = ?",
                &[SqlParam::from(town_id), SqlParam::from(rank)],
            )? > 0)
        })
    }

    // =========================================================================
    // Scalar settings
    // =========================================================================

    fn update_column(&self, action: &str, column: &str, value: SqlParam, town_id: Uuid) {
        let sql = format!("UPDATE towns SET {} = ? WHERE Id = ?", column);
        self.run(action, (), |conn| {
            if conn.execute(&sql, &[value, SqlParam::from(town_id)])? == 0 {
                warn!("No town {} to update", town_id);
            }
            Ok(())
        })
    }

    fn read_column(&self, action: &str, column: &str, town_id: Uuid) -> Option<SqlValue> {
        let sql = format!("SELECT {} FROM towns WHERE Id = ?", column);
        self.run(action, None, |conn| {
            Ok(conn
                .query_first(&sql, &[SqlParam::from(town_id)])?
                .and_then(|row| row.into_iter().next()))
        })
    }

    pub fn set_tax(&self, town_id: Uuid, tax: u32) {
        self.update_column("setting tax", "Tax", SqlParam::from(tax), town_id)
    }

    /// Town tax, or 0 when the town is missing
    pub fn get_tax(&self, town_id: Uuid) -> u32 {
        self.read_column("loading tax", "Tax", town_id)
            .and_then(|v| v.as_i64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    }

    pub fn set_visibility(&self, town_id: Uuid, is_public: bool) {
        self.update_column(
            "setting visibility",
            "IsPublic",
            SqlParam::from(is_public),
            town_id,
        )
    }

    /// Whether the town is public; `false` when the town is missing
    pub fn is_public_town(&self, town_id: Uuid) -> bool {
        self.read_column("loading visibility", "IsPublic", town_id)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Claim limit, or 5 when the town is missing
    pub fn get_max_plots(&self, town_id: Uuid) -> u32 {
        self.read_column("loading plot limit", "MaxClaimedPlots", town_id)
            .and_then(|v| v.as_i64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_MAX_PLOTS)
    }

    // =========================================================================
    // Leveling
    // =========================================================================

    /// Add XP, persist the town and notify if a level boundary was crossed
    pub fn grant_xp(&self, town: &mut Town, amount: i64) -> LevelOutcome {
        let outcome = leveling::apply_xp(town, amount);
        self.upsert_town(town);
        if outcome.leveled_up() {
            (self.level_up_hook)(town, outcome.levels_gained);
        }
        outcome
    }

    /// Manual one-level upgrade, persisted and notified
    pub fn upgrade_town(&self, town: &mut Town) {
        leveling::upgrade(town);
        self.upsert_town(town);
        (self.level_up_hook)(town, 1);
    }
}
