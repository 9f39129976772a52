//! Core database infrastructure
//!
//! This module provides the foundational database components used by the
//! attribute store and the town repository:
//! - `Dialect`: backend-specific SQL fragments (SQLite, MySQL)
//! - `DatabaseConn`: one live driver connection with a positional-parameter API
//! - `ConnectionManager`: lazy, reconnecting, mutex-guarded shared connection
//! - `SchemaProvisioner`: idempotent table creation

mod connection;
mod dialect;
mod schema;

pub use connection::{ConnectionManager, DatabaseConn, SqlParam, SqlRow, SqlValue};
pub use dialect::{Backend, Dialect, MysqlDialect, SqliteDialect};
pub use schema::{
    normalize_table_name, SchemaDefinitions, SchemaProvisioner, CITIZENS_TABLE, DOMAIN_TABLES,
    INVITATIONS_TABLE, PLOTS_TABLE, RANKS_TABLE, TOWNS_TABLE, WELL_KNOWN_NAMESPACES,
};
