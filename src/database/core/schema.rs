//! Database schema provisioning
//!
//! Table definitions are generated per dialect so that column types, the
//! attribute key column and the MySQL table options stay consistent between
//! DDL and the statements that use the tables. Every statement is
//! `CREATE TABLE IF NOT EXISTS`; provisioning is idempotent and there are no
//! migrations.

use std::sync::Arc;

use tracing::{error, info};

use crate::database::core::connection::ConnectionManager;
use crate::database::core::dialect::Dialect;
use crate::error::StoreError;

/// Namespaces cleared by an entity wipe
pub const WELL_KNOWN_NAMESPACES: [&str; 3] = ["users", "currency", "info"];

/// Town aggregate table
pub const TOWNS_TABLE: &str = "towns";
/// Plot → town assignments
pub const PLOTS_TABLE: &str = "town_plots";
/// Player memberships
pub const CITIZENS_TABLE: &str = "town_citizens";
/// Named permission sets per town
pub const RANKS_TABLE: &str = "town_ranks";
/// Pending invitations
pub const INVITATIONS_TABLE: &str = "town_invitations";

/// Domain tables in creation order
pub const DOMAIN_TABLES: [&str; 5] = [
    TOWNS_TABLE,
    PLOTS_TABLE,
    CITIZENS_TABLE,
    RANKS_TABLE,
    INVITATIONS_TABLE,
];

/// Normalize a caller-supplied namespace into a table name
///
/// Names are case-folded to lowercase and must be plain identifiers
/// (`[a-z0-9_]`, not starting with a digit) because they end up
/// interpolated into SQL.
pub fn normalize_table_name(name: &str) -> Result<String, StoreError> {
    let lowered = name.trim().to_lowercase();
    let valid = !lowered.is_empty()
        && lowered.len() <= 64
        && !lowered.starts_with(|c: char| c.is_ascii_digit())
        && lowered
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(lowered)
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Schema definitions for the town domain
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// DDL for one domain table
    pub fn domain_table(dialect: &dyn Dialect, table: &str) -> Option<String> {
        let uuid = dialect.uuid_type();
        let short = dialect.short_text_type();
        let text = dialect.text_type();
        let int = dialect.int_type();
        let bigint = dialect.bigint_type();
        let boolean = dialect.bool_type();
        let options = dialect.table_options();

        let sql = match table {
            TOWNS_TABLE => format!(
                "CREATE TABLE IF NOT EXISTS towns (\
                 Id {uuid} NOT NULL PRIMARY KEY, \
                 Name {short} NOT NULL UNIQUE, \
                 Owner {uuid} NOT NULL, \
                 CenterPlotId {short} NOT NULL, \
                 Level {int} NOT NULL DEFAULT 1, \
                 Budget {bigint} NOT NULL DEFAULT 0, \
                 Xp {bigint} NOT NULL DEFAULT 0, \
                 XpToNextLevel {bigint} NOT NULL DEFAULT 1500, \
                 Tax {int} NOT NULL DEFAULT 0, \
                 MaxClaimedPlots {int} NOT NULL DEFAULT 5, \
                 IsPublic {boolean} NOT NULL DEFAULT 0\
                 ){options}"
            ),
            PLOTS_TABLE => format!(
                "CREATE TABLE IF NOT EXISTS town_plots (\
                 PlotId {short} NOT NULL PRIMARY KEY, \
                 TownId {uuid} NOT NULL\
                 ){options}"
            ),
            CITIZENS_TABLE => format!(
                "CREATE TABLE IF NOT EXISTS town_citizens (\
                 PlayerId {uuid} NOT NULL, \
                 TownId {uuid} NOT NULL, \
                 Role {short} NOT NULL, \
                 PRIMARY KEY (PlayerId, TownId)\
                 ){options}"
            ),
            RANKS_TABLE => format!(
                "CREATE TABLE IF NOT EXISTS town_ranks (\
                 TownId {uuid} NOT NULL, \
                 RankName {short} NOT NULL, \
                 Permissions {text}, \
                 PRIMARY KEY (TownId, RankName)\
                 ){options}"
            ),
            INVITATIONS_TABLE => format!(
                "CREATE TABLE IF NOT EXISTS town_invitations (\
                 PlayerId {uuid} NOT NULL, \
                 TownId {uuid} NOT NULL, \
                 PRIMARY KEY (PlayerId, TownId)\
                 ){options}"
            ),
            _ => return None,
        };
        Some(sql)
    }
}

/// Idempotent table creation over a shared connection
pub struct SchemaProvisioner {
    manager: Arc<ConnectionManager>,
}

impl SchemaProvisioner {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn create(&self, table: &str, sql: &str) -> bool {
        let result = self
            .manager
            .with_connection(|conn| conn.execute(sql, &[]))
            .map_err(|e| StoreError::SchemaFailure {
                table: table.to_string(),
                reason: e.to_string(),
            });
        match result {
            Ok(_) => {
                info!("Table '{}' created or already present", table);
                true
            }
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Create a four-column attribute table for `namespace`
    pub fn ensure_generic_table(&self, namespace: &str) -> bool {
        let table = match normalize_table_name(namespace) {
            Ok(t) => t,
            Err(e) => {
                error!("Cannot create attribute table: {}", e);
                return false;
            }
        };
        let sql = self.manager.dialect().attribute_table_ddl(&table);
        self.create(&table, &sql)
    }

    /// Create the `users`, `currency` and `info` attribute tables
    pub fn ensure_well_known_tables(&self) -> bool {
        WELL_KNOWN_NAMESPACES
            .iter()
            .fold(true, |ok, ns| self.ensure_generic_table(ns) && ok)
    }

    /// Create all five town-domain tables
    ///
    /// A failing table is logged and skipped; the rest are still created.
    /// Returns `true` only if every table is in place.
    pub fn ensure_domain_schema(&self) -> bool {
        let dialect = self.manager.dialect();
        let mut all_ok = true;
        for table in DOMAIN_TABLES {
            let ok = match SchemaDefinitions::domain_table(dialect, table) {
                Some(sql) => self.create(table, &sql),
                None => false,
            };
            all_ok &= ok;
        }
        all_ok
    }

    /// Execute caller-supplied DDL verbatim
    ///
    /// No validation is performed; the statement is the caller's
    /// responsibility.
    pub fn execute_ddl(&self, sql: &str) -> bool {
        match self.manager.with_connection(|conn| conn.execute_batch(sql)) {
            Ok(()) => {
                info!("Table statement executed");
                true
            }
            Err(e) => {
                error!("Error while executing table statement: {}", e);
                false
            }
        }
    }
}
