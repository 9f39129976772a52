//! Database connection management
//!
//! [`DatabaseConn`] wraps one live driver connection (SQLite or MySQL) behind
//! a small positional-parameter API, so the rest of the crate writes each
//! statement once. [`ConnectionManager`] owns the single shared connection:
//! it connects lazily, reconnects when the connection is gone, and runs every
//! statement inside one mutex-guarded critical section.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConfigProvider, DatabaseSettings};
use crate::database::core::dialect::{Backend, Dialect};
use crate::error::{StoreError, StoreResult};

/// A positional statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<Uuid> for SqlParam {
    fn from(v: Uuid) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<u32> for SqlParam {
    fn from(v: u32) -> Self {
        SqlParam::Int(v as i64)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Int(v as i64)
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Int(v) => ToSqlOutput::from(*v),
            SqlParam::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}

/// A column value read back from either backend
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Real(v) => Some(v.to_string()),
            SqlValue::Text(v) => Some(v.clone()),
        }
    }

    /// Integer view; MySQL's text protocol returns numbers as strings
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Text(v) => v.trim().parse().ok(),
            SqlValue::Real(_) | SqlValue::Null => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_i64().map(|v| v != 0)
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            SqlValue::Text(v) => Uuid::parse_str(v).ok(),
            _ => None,
        }
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Int(i),
            Value::Real(f) => SqlValue::Real(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

#[cfg(feature = "mysql")]
impl From<&mysql::Value> for SqlValue {
    fn from(v: &mysql::Value) -> Self {
        match v {
            mysql::Value::NULL => SqlValue::Null,
            mysql::Value::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(b).into_owned()),
            mysql::Value::Int(i) => SqlValue::Int(*i),
            mysql::Value::UInt(u) => SqlValue::Int(*u as i64),
            mysql::Value::Float(f) => SqlValue::Real(*f as f64),
            mysql::Value::Double(f) => SqlValue::Real(*f),
            other => SqlValue::Text(other.as_sql(true)),
        }
    }
}

/// One result row
pub type SqlRow = Vec<SqlValue>;

enum Handle {
    Sqlite(Connection),
    #[cfg(feature = "mysql")]
    Mysql(mysql::Conn),
}

/// Core database connection wrapper
///
/// Every statement runs in auto-commit mode; there is no transaction API.
pub struct DatabaseConn {
    handle: Handle,
}

impl DatabaseConn {
    /// Open a connection for the configured backend
    pub fn open(settings: &DatabaseSettings) -> StoreResult<Self> {
        match settings.backend {
            Backend::Sqlite => Self::open_sqlite(&settings.sqlite_path),
            Backend::Mysql => Self::open_mysql(settings),
        }
    }

    /// Open a SQLite database file, creating its directory if needed
    ///
    /// The path `:memory:` opens an in-memory database.
    pub fn open_sqlite(path: &str) -> StoreResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory().map_err(|e| {
                StoreError::ConnectionFailure(format!("failed to create in-memory database: {}", e))
            })?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        warn!(
                            "Could not create data folder for SQLite database {}: {}",
                            parent.display(),
                            e
                        );
                    }
                }
            }
            Connection::open(path).map_err(|e| {
                StoreError::ConnectionFailure(format!(
                    "failed to open database at '{}': {}",
                    path, e
                ))
            })?
        };

        let db = DatabaseConn {
            handle: Handle::Sqlite(conn),
        };
        db.configure()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_sqlite(":memory:")
    }

    #[cfg(feature = "mysql")]
    fn open_mysql(settings: &DatabaseSettings) -> StoreResult<Self> {
        let my = &settings.mysql;
        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(my.host.clone()))
            .tcp_port(my.port)
            .db_name(Some(my.database.clone()))
            .user(Some(my.username.clone()))
            .pass(Some(my.password.clone()));
        let conn = mysql::Conn::new(opts).map_err(|e| {
            StoreError::ConnectionFailure(format!("failed to connect to {}: {}", settings.target(), e))
        })?;
        Ok(DatabaseConn {
            handle: Handle::Mysql(conn),
        })
    }

    #[cfg(not(feature = "mysql"))]
    fn open_mysql(_settings: &DatabaseSettings) -> StoreResult<Self> {
        Err(StoreError::BackendUnavailable(Backend::Mysql.to_string()))
    }

    /// Configure a SQLite connection
    fn configure(&self) -> StoreResult<()> {
        let conn = match &self.handle {
            Handle::Sqlite(conn) => conn,
            #[cfg(feature = "mysql")]
            Handle::Mysql(_) => return Ok(()),
        };

        let _: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::ConnectionFailure(format!("failed to set journal mode: {}", e)))?;

        conn.execute("PRAGMA synchronous=NORMAL", []).map_err(|e| {
            StoreError::ConnectionFailure(format!("failed to set synchronous mode: {}", e))
        })?;

        // separate managers on one file wait on each other instead of failing
        conn.busy_timeout(Duration::from_secs(5)).map_err(|e| {
            StoreError::ConnectionFailure(format!("failed to set busy timeout: {}", e))
        })?;

        Ok(())
    }

    /// Whether the connection still answers
    ///
    /// An open SQLite handle stays valid until dropped; MySQL is probed.
    pub fn is_alive(&mut self) -> bool {
        match &mut self.handle {
            Handle::Sqlite(_) => true,
            #[cfg(feature = "mysql")]
            Handle::Mysql(conn) => {
                use mysql::prelude::Queryable;
                conn.query_drop("SELECT 1").is_ok()
            }
        }
    }

    /// Execute a statement and return the number of affected rows
    pub fn execute(&mut self, sql: &str, params: &[SqlParam]) -> StoreResult<usize> {
        match &mut self.handle {
            Handle::Sqlite(conn) => Ok(conn.execute(sql, params_from_iter(params.iter()))?),
            #[cfg(feature = "mysql")]
            Handle::Mysql(conn) => {
                use mysql::prelude::Queryable;
                conn.exec_drop(sql, mysql_params(params))?;
                Ok(conn.affected_rows() as usize)
            }
        }
    }

    /// Execute caller-supplied SQL verbatim, without parameters
    pub fn execute_batch(&mut self, sql: &str) -> StoreResult<()> {
        match &mut self.handle {
            Handle::Sqlite(conn) => Ok(conn.execute_batch(sql)?),
            #[cfg(feature = "mysql")]
            Handle::Mysql(conn) => {
                use mysql::prelude::Queryable;
                Ok(conn.query_drop(sql)?)
            }
        }
    }

    /// Run a query and collect every row
    pub fn query(&mut self, sql: &str, params: &[SqlParam]) -> StoreResult<Vec<SqlRow>> {
        match &mut self.handle {
            Handle::Sqlite(conn) => {
                let mut stmt = conn.prepare(sql)?;
                let columns = stmt.column_count();
                let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                    (0..columns)
                        .map(|i| row.get::<_, Value>(i).map(SqlValue::from))
                        .collect::<rusqlite::Result<SqlRow>>()
                })?;
                let collected = rows.collect::<rusqlite::Result<Vec<SqlRow>>>()?;
                Ok(collected)
            }
            #[cfg(feature = "mysql")]
            Handle::Mysql(conn) => {
                use mysql::prelude::Queryable;
                let rows: Vec<mysql::Row> = conn.exec(sql, mysql_params(params))?;
                Ok(rows
                    .iter()
                    .map(|row| {
                        (0..row.len())
                            .map(|i| row.as_ref(i).map(SqlValue::from).unwrap_or(SqlValue::Null))
                            .collect()
                    })
                    .collect())
            }
        }
    }

    /// Run a query and return its first row, if any
    pub fn query_first(&mut self, sql: &str, params: &[SqlParam]) -> StoreResult<Option<SqlRow>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Check if a table exists using the backend's catalog
    pub fn table_exists(&mut self, dialect: &dyn Dialect, table_name: &str) -> StoreResult<bool> {
        let rows = self.query(dialect.table_exists_query(), &[SqlParam::from(table_name)])?;
        Ok(!rows.is_empty())
    }
}

#[cfg(feature = "mysql")]
fn mysql_params(params: &[SqlParam]) -> mysql::Params {
    if params.is_empty() {
        return mysql::Params::Empty;
    }
    mysql::Params::Positional(
        params
            .iter()
            .map(|p| match p {
                SqlParam::Int(v) => mysql::Value::Int(*v),
                SqlParam::Text(v) => mysql::Value::Bytes(v.as_bytes().to_vec()),
            })
            .collect(),
    )
}

/// Owner of the single shared connection
///
/// Settings are read once at construction. The connection itself is opened
/// on first use and re-opened whenever it is missing or dead, inside the
/// same lock that guards the statement about to run. Components that share
/// one `Arc<ConnectionManager>` share that lock; components built over
/// separate managers hold separate connections.
pub struct ConnectionManager {
    settings: DatabaseSettings,
    conn: Mutex<Option<DatabaseConn>>,
}

impl ConnectionManager {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            conn: Mutex::new(None),
        }
    }

    /// Build a manager from a configuration provider
    ///
    /// Fails fast with [`StoreError::ConfigurationMissing`] when `provider`
    /// is `None`. No connection is attempted here.
    pub fn from_provider(provider: Option<&dyn ConfigProvider>) -> StoreResult<Self> {
        Ok(Self::new(DatabaseSettings::from_provider(provider)?))
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    pub fn backend(&self) -> Backend {
        self.settings.backend
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.settings.backend.dialect()
    }

    fn lock(&self) -> MutexGuard<'_, Option<DatabaseConn>> {
        // a panic in another caller leaves the slot usable
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure<'a>(&self, slot: &'a mut Option<DatabaseConn>) -> StoreResult<&'a mut DatabaseConn> {
        let alive = slot.as_mut().map(|c| c.is_alive()).unwrap_or(false);
        if !alive {
            if slot.take().is_some() {
                warn!("Database connection lost, reconnecting");
            }
            match DatabaseConn::open(&self.settings) {
                Ok(conn) => {
                    info!("Database connection established ({})", self.settings.backend);
                    *slot = Some(conn);
                }
                Err(e) => {
                    error!("Error while connecting to {}: {}", self.settings.target(), e);
                    return Err(e);
                }
            }
        }
        slot.as_mut()
            .ok_or_else(|| StoreError::ConnectionFailure("connection unavailable".to_string()))
    }

    /// Make sure a live connection exists; `false` if connecting failed
    pub fn ensure_connection(&self) -> bool {
        let mut slot = self.lock();
        self.ensure(&mut slot).is_ok()
    }

    /// Run `op` on a live connection while holding the lock
    pub fn with_connection<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut DatabaseConn) -> StoreResult<T>,
    {
        let mut slot = self.lock();
        let conn = self.ensure(&mut slot)?;
        op(conn)
    }

    /// Whether a connection is currently held (not probed)
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Drop the connection; the next call reconnects
    pub fn close(&self) {
        if self.lock().take().is_some() {
            info!("Database connection closed");
        } else {
            debug!("close() called without an open connection");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_manager(dir: &tempfile::TempDir) -> ConnectionManager {
        let path = dir.path().join("nested").join("store.db");
        ConnectionManager::new(DatabaseSettings::sqlite(path.to_str().unwrap()))
    }

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_execute_and_query() {
        let mut db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .unwrap();
        let inserted = db
            .execute(
                "INSERT INTO test (id, name) VALUES (?, ?)",
                &[SqlParam::Int(1), SqlParam::from("alpha")],
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let row = db
            .query_first("SELECT id, name FROM test WHERE id = ?", &[SqlParam::Int(1)])
            .unwrap()
            .unwrap();
        assert_eq!(row[0].as_i64(), Some(1));
        assert_eq!(row[1].as_text(), Some("alpha".to_string()));

        let missing = db
            .query_first("SELECT id FROM test WHERE id = ?", &[SqlParam::Int(2)])
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_table_exists() {
        let mut db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)", &[])
            .unwrap();

        let dialect = Backend::Sqlite.dialect();
        assert!(db.table_exists(dialect, "test_table").unwrap());
        assert!(!db.table_exists(dialect, "nonexistent_table").unwrap());
    }

    #[test]
    fn test_sql_value_views() {
        assert_eq!(SqlValue::Text("42".to_string()).as_i64(), Some(42));
        assert_eq!(SqlValue::Int(0).as_bool(), Some(false));
        assert_eq!(SqlValue::Null.as_text(), None);
        let id = Uuid::new_v4();
        assert_eq!(SqlValue::Text(id.to_string()).as_uuid(), Some(id));
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn test_mysql_value_mapping() {
        assert_eq!(SqlValue::from(&mysql::Value::NULL), SqlValue::Null);
        assert_eq!(
            SqlValue::from(&mysql::Value::Bytes(b"steve".to_vec())),
            SqlValue::Text("steve".to_string())
        );
        assert_eq!(SqlValue::from(&mysql::Value::Int(-4)), SqlValue::Int(-4));
        assert_eq!(SqlValue::from(&mysql::Value::UInt(9)), SqlValue::Int(9));
        // text protocol: numbers arrive as bytes
        assert_eq!(
            SqlValue::from(&mysql::Value::Bytes(b"1500".to_vec())).as_i64(),
            Some(1500)
        );
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn test_mysql_params() {
        assert!(matches!(mysql_params(&[]), mysql::Params::Empty));

        let id = Uuid::new_v4();
        let params = mysql_params(&[
            SqlParam::from(id),
            SqlParam::from(5i64),
            SqlParam::from(true),
        ]);
        match params {
            mysql::Params::Positional(values) => assert_eq!(
                values,
                vec![
                    mysql::Value::Bytes(id.to_string().into_bytes()),
                    mysql::Value::Int(5),
                    mysql::Value::Int(1),
                ]
            ),
            _ => panic!("expected positional parameters"),
        }
    }

    #[test]
    fn test_lazy_connect_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = sqlite_manager(&dir);
        assert!(!manager.is_connected());

        assert!(manager.ensure_connection());
        assert!(manager.is_connected());
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_reconnect_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let manager = sqlite_manager(&dir);

        manager
            .with_connection(|conn| conn.execute("CREATE TABLE t (v INTEGER)", &[]))
            .unwrap();
        manager
            .with_connection(|conn| conn.execute("INSERT INTO t (v) VALUES (7)", &[]))
            .unwrap();

        manager.close();
        assert!(!manager.is_connected());

        let value = manager
            .with_connection(|conn| conn.query_first("SELECT v FROM t", &[]))
            .unwrap()
            .and_then(|row| row[0].as_i64());
        assert_eq!(value, Some(7));
        assert!(manager.is_connected());
    }

    #[test]
    fn test_connection_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened as a database file
        let manager = ConnectionManager::new(DatabaseSettings::sqlite(dir.path().to_str().unwrap()));
        assert!(!manager.ensure_connection());
        assert!(!manager.is_connected());
        let result = manager.with_connection(|conn| conn.execute("SELECT 1", &[]));
        assert!(matches!(result, Err(StoreError::ConnectionFailure(_))));
    }
}
