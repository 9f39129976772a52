//! SQL dialect policy
//!
//! Everything that differs between the embedded and the networked backend
//! lives behind the [`Dialect`] trait: column types, the table option
//! clause, the name of the attribute key column, upsert syntax and the
//! catalog query for table existence. Implementations are stateless.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sqlite,
    Mysql,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Mysql => "mysql",
        }
    }

    /// The dialect implementation for this backend
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            Backend::Sqlite => &SqliteDialect,
            Backend::Mysql => &MysqlDialect,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "mysql" => Ok(Backend::Mysql),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Backend-specific SQL fragments
pub trait Dialect: Send + Sync {
    fn backend(&self) -> Backend;

    /// Name of the attribute key column; `Key` is reserved on MySQL
    fn key_column(&self) -> &'static str;

    /// Column type for a textual UUID
    fn uuid_type(&self) -> &'static str;

    /// Column type for short indexed strings (names, keys, tags)
    fn short_text_type(&self) -> &'static str;

    /// Column type for unbounded text
    fn text_type(&self) -> &'static str;

    fn int_type(&self) -> &'static str;

    fn bigint_type(&self) -> &'static str;

    fn bool_type(&self) -> &'static str;

    /// Trailing table options, including the leading space when non-empty
    fn table_options(&self) -> &'static str;

    /// Insert-or-update keyed by `key_columns`, one `?` per column
    ///
    /// Non-key columns are overwritten on conflict. When every column is a
    /// key column the statement becomes insert-or-ignore.
    fn upsert(&self, table: &str, columns: &[&str], key_columns: &[&str]) -> String;

    /// Query returning at least one row iff the table bound to `?` exists
    fn table_exists_query(&self) -> &'static str;

    /// DDL for a four-column attribute table
    fn attribute_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             EntityId {uuid} NOT NULL, \
             {key} {short} NOT NULL, \
             Value {text}, \
             Type {short} NOT NULL, \
             PRIMARY KEY (EntityId, {key})\
             ){options}",
            table = table,
            uuid = self.uuid_type(),
            key = self.key_column(),
            short = self.short_text_type(),
            text = self.text_type(),
            options = self.table_options(),
        )
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn update_columns<'a>(columns: &[&'a str], key_columns: &[&str]) -> Vec<&'a str> {
    columns
        .iter()
        .filter(|c| !key_columns.contains(c))
        .copied()
        .collect()
}

/// Embedded SQLite dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn key_column(&self) -> &'static str {
        "Key"
    }

    fn uuid_type(&self) -> &'static str {
        "TEXT"
    }

    fn short_text_type(&self) -> &'static str {
        "TEXT"
    }

    fn text_type(&self) -> &'static str {
        "TEXT"
    }

    fn int_type(&self) -> &'static str {
        "INTEGER"
    }

    fn bigint_type(&self) -> &'static str {
        "INTEGER"
    }

    fn bool_type(&self) -> &'static str {
        "INTEGER"
    }

    fn table_options(&self) -> &'static str {
        ""
    }

    fn upsert(&self, table: &str, columns: &[&str], key_columns: &[&str]) -> String {
        let updates = update_columns(columns, key_columns);
        if updates.is_empty() {
            return format!(
                "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders(columns.len())
            );
        }
        // ON CONFLICT on the primary key: unlike INSERT OR REPLACE, a clash
        // on another UNIQUE column fails instead of deleting that row
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
            table,
            columns.join(", "),
            placeholders(columns.len()),
            key_columns.join(", "),
            updates
                .iter()
                .map(|c| format!("{c} = excluded.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn table_exists_query(&self) -> &'static str {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?"
    }
}

/// Networked MySQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn backend(&self) -> Backend {
        Backend::Mysql
    }

    fn key_column(&self) -> &'static str {
        "KeyName"
    }

    fn uuid_type(&self) -> &'static str {
        "VARCHAR(36)"
    }

    fn short_text_type(&self) -> &'static str {
        "VARCHAR(255)"
    }

    fn text_type(&self) -> &'static str {
        "TEXT"
    }

    fn int_type(&self) -> &'static str {
        "INT"
    }

    fn bigint_type(&self) -> &'static str {
        "BIGINT"
    }

    fn bool_type(&self) -> &'static str {
        "TINYINT(1)"
    }

    fn table_options(&self) -> &'static str {
        " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    }

    fn upsert(&self, table: &str, columns: &[&str], key_columns: &[&str]) -> String {
        let updates = update_columns(columns, key_columns);
        if updates.is_empty() {
            return format!(
                "INSERT IGNORE INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders(columns.len())
            );
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            table,
            columns.join(", "),
            placeholders(columns.len()),
            updates
                .iter()
                .map(|c| format!("{c} = VALUES({c})"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn table_exists_query(&self) -> &'static str {
        "SELECT TABLE_NAME FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
    }
}
