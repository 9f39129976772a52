//! Typed per-entity attribute store
//!
//! Each namespace is its own table of `(EntityId, Key, Value, Type)` rows
//! with primary key `(EntityId, Key)`. Writes are upserts, so a key holds at
//! most one value per entity.
//!
//! Reads never fail: a missing row, a type-tag mismatch, a value that no
//! longer decodes or a database error all come back as the caller's default
//! (or `None`), with the cause written to the log. Writes log their outcome
//! and otherwise behave as no-ops on failure.
//!
//! ```rust,ignore
//! let store = TypedAttributeStore::new(manager);
//! store.users().save(player, "kills", 12i32);
//! let kills = store.users().load_int(player, "kills", 0);
//! store.table("currency").save(player, "gold", 250i64);
//! ```

mod value;

pub use value::{AttributeValue, TypeTag};

use std::sync::Arc;

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::database::core::{normalize_table_name, ConnectionManager, SqlParam, WELL_KNOWN_NAMESPACES};
use crate::error::{StoreError, StoreResult};

/// Namespace used when the caller does not name one
pub const DEFAULT_NAMESPACE: &str = "users";

/// Generic key-value store over one shared connection
pub struct TypedAttributeStore {
    manager: Arc<ConnectionManager>,
}

impl TypedAttributeStore {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Operations on the default `users` namespace
    pub fn users(&self) -> AttributeTable<'_> {
        self.table(DEFAULT_NAMESPACE)
    }

    /// Operations on a caller-named namespace (case-insensitive)
    pub fn table(&self, namespace: &str) -> AttributeTable<'_> {
        AttributeTable {
            manager: &self.manager,
            namespace: namespace.to_string(),
        }
    }

    /// Delete every row for `entity` in `users`, `currency` and `info`
    ///
    /// Returns `true` if any row was removed. A table that cannot be
    /// cleared is logged and does not stop the others.
    pub fn wipe(&self, entity: Uuid) -> bool {
        let mut wiped = false;
        for namespace in WELL_KNOWN_NAMESPACES {
            let sql = format!("DELETE FROM {} WHERE EntityId = ?", namespace);
            match self
                .manager
                .with_connection(|conn| conn.execute(&sql, &[SqlParam::from(entity)]))
            {
                Ok(removed) => wiped |= removed > 0,
                Err(e) => error!("Error while wiping {} from '{}': {}", entity, namespace, e),
            }
        }
        wiped
    }

    /// Check if a table exists using the backend's catalog
    pub fn table_exists(&self, name: &str) -> bool {
        let table = match normalize_table_name(name) {
            Ok(t) => t,
            Err(e) => {
                warn!("Table existence check skipped: {}", e);
                return false;
            }
        };
        let dialect = self.manager.dialect();
        self.manager
            .with_connection(|conn| conn.table_exists(dialect, &table))
            .unwrap_or_else(|e| {
                error!("Error while checking for table '{}': {}", table, e);
                false
            })
    }
}

/// Attribute operations scoped to one namespace
pub struct AttributeTable<'a> {
    manager: &'a ConnectionManager,
    namespace: String,
}

impl AttributeTable<'_> {
    /// The normalized table name
    pub fn name(&self) -> StoreResult<String> {
        normalize_table_name(&self.namespace)
    }

    /// Store `value` under `key` for `entity`, replacing any previous value
    pub fn save(&self, entity: Uuid, key: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match self.try_save(entity, key, &value) {
            Ok(()) => debug!(
                "Saved {} '{}' for {} in '{}'",
                value.tag(),
                key,
                entity,
                self.namespace
            ),
            Err(e) => error!(
                "Error while saving '{}' for {} in '{}': {}",
                key, entity, self.namespace, e
            ),
        }
    }

    fn try_save(&self, entity: Uuid, key: &str, value: &AttributeValue) -> StoreResult<()> {
        let table = self.name()?;
        let encoded = value.encode()?;
        let dialect = self.manager.dialect();
        let key_column = dialect.key_column();
        let sql = dialect.upsert(
            &table,
            &["EntityId", key_column, "Value", "Type"],
            &["EntityId", key_column],
        );
        self.manager.with_connection(|conn| {
            conn.execute(
                &sql,
                &[
                    SqlParam::from(entity),
                    SqlParam::from(key),
                    SqlParam::from(encoded),
                    SqlParam::from(value.tag().as_str()),
                ],
            )
        })?;
        Ok(())
    }

    /// Stored `(value, type)` text for a key
    fn fetch(&self, entity: Uuid, key: &str) -> StoreResult<Option<(String, String)>> {
        let table = self.name()?;
        let sql = format!(
            "SELECT Value, Type FROM {} WHERE EntityId = ? AND {} = ?",
            table,
            self.manager.dialect().key_column()
        );
        let row = self.manager.with_connection(|conn| {
            conn.query_first(&sql, &[SqlParam::from(entity), SqlParam::from(key)])
        })?;
        Ok(row.map(|r| {
            let value = r.first().and_then(|v| v.as_text()).unwrap_or_default();
            let tag = r.get(1).and_then(|v| v.as_text()).unwrap_or_default();
            (value, tag)
        }))
    }

    /// Raw stored text, whatever its type tag
    pub fn load(&self, entity: Uuid, key: &str) -> Option<String> {
        match self.fetch(entity, key) {
            Ok(row) => row.map(|(value, _)| value),
            Err(e) => {
                error!(
                    "Error while loading '{}' for {} from '{}': {}",
                    key, entity, self.namespace, e
                );
                None
            }
        }
    }

    pub fn load_string_or(&self, entity: Uuid, key: &str, default: &str) -> String {
        self.load(entity, key).unwrap_or_else(|| default.to_string())
    }

    /// Decode a stored value using its own type tag
    pub fn load_value(&self, entity: Uuid, key: &str) -> Option<AttributeValue> {
        let (text, tag) = self.fetch_logged(entity, key)?;
        let decoded = tag
            .parse::<TypeTag>()
            .and_then(|tag| AttributeValue::decode(tag, &text));
        match decoded {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Could not decode '{}' for {}: {}", key, entity, e);
                None
            }
        }
    }

    fn fetch_logged(&self, entity: Uuid, key: &str) -> Option<(String, String)> {
        match self.fetch(entity, key) {
            Ok(row) => row,
            Err(e) => {
                warn!(
                    "Error while loading '{}' for {} from '{}': {}",
                    key, entity, self.namespace, e
                );
                None
            }
        }
    }

    /// Decode a stored value only if it carries the `expected` tag
    fn load_as(&self, entity: Uuid, key: &str, expected: TypeTag) -> Option<AttributeValue> {
        let (text, tag) = self.fetch_logged(entity, key)?;
        if tag != expected.as_str() {
            let mismatch = StoreError::TypeMismatch {
                expected: expected.to_string(),
                found: tag,
            };
            warn!("Not loading '{}' for {}: {}", key, entity, mismatch);
            return None;
        }
        match AttributeValue::decode(expected, &text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Could not decode {} '{}' for {}: {}", expected, key, entity, e);
                None
            }
        }
    }

    pub fn load_int(&self, entity: Uuid, key: &str, default: i32) -> i32 {
        match self.load_as(entity, key, TypeTag::Int) {
            Some(AttributeValue::Int(v)) => v,
            _ => default,
        }
    }

    pub fn load_double(&self, entity: Uuid, key: &str, default: f64) -> f64 {
        match self.load_as(entity, key, TypeTag::Double) {
            Some(AttributeValue::Double(v)) => v,
            _ => default,
        }
    }

    pub fn load_bool(&self, entity: Uuid, key: &str, default: bool) -> bool {
        match self.load_as(entity, key, TypeTag::Boolean) {
            Some(AttributeValue::Boolean(v)) => v,
            _ => default,
        }
    }

    pub fn load_long(&self, entity: Uuid, key: &str, default: i64) -> i64 {
        match self.load_as(entity, key, TypeTag::Long) {
            Some(AttributeValue::Long(v)) => v,
            _ => default,
        }
    }

    pub fn load_float(&self, entity: Uuid, key: &str, default: f32) -> f32 {
        match self.load_as(entity, key, TypeTag::Float) {
            Some(AttributeValue::Float(v)) => v,
            _ => default,
        }
    }

    pub fn load_string_array(&self, entity: Uuid, key: &str, default: Vec<String>) -> Vec<String> {
        match self.load_as(entity, key, TypeTag::StringArray) {
            Some(AttributeValue::StringArray(v)) => v,
            _ => default,
        }
    }

    pub fn load_string_list(&self, entity: Uuid, key: &str, default: Vec<String>) -> Vec<String> {
        match self.load_as(entity, key, TypeTag::StringList) {
            Some(AttributeValue::StringList(v)) => v,
            _ => default,
        }
    }

    /// Remove a key; `true` iff a row was deleted
    pub fn delete(&self, entity: Uuid, key: &str) -> bool {
        let result = self.name().and_then(|table| {
            let sql = format!(
                "DELETE FROM {} WHERE EntityId = ? AND {} = ?",
                table,
                self.manager.dialect().key_column()
            );
            self.manager.with_connection(|conn| {
                conn.execute(&sql, &[SqlParam::from(entity), SqlParam::from(key)])
            })
        });
        match result {
            Ok(removed) => removed > 0,
            Err(e) => {
                error!(
                    "Error while deleting '{}' for {} from '{}': {}",
                    key, entity, self.namespace, e
                );
                false
            }
        }
    }

    pub fn exists(&self, entity: Uuid, key: &str) -> bool {
        let result = self.name().and_then(|table| {
            let sql = format!(
                "SELECT 1 FROM {} WHERE EntityId = ? AND {} = ? LIMIT 1",
                table,
                self.manager.dialect().key_column()
            );
            self.manager.with_connection(|conn| {
                conn.query_first(&sql, &[SqlParam::from(entity), SqlParam::from(key)])
            })
        });
        match result {
            Ok(row) => row.is_some(),
            Err(e) => {
                error!(
                    "Error while checking '{}' for {} in '{}': {}",
                    key, entity, self.namespace, e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSettings;
    use crate::database::core::SchemaProvisioner;

    fn setup() -> (tempfile::TempDir, Arc<ConnectionManager>, TypedAttributeStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attributes.db");
        let manager = Arc::new(ConnectionManager::new(DatabaseSettings::sqlite(
            path.to_str().unwrap(),
        )));
        assert!(SchemaProvisioner::new(manager.clone()).ensure_well_known_tables());
        let store = TypedAttributeStore::new(manager.clone());
        (dir, manager, store)
    }

    fn row_count(manager: &ConnectionManager, table: &str, entity: Uuid) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE EntityId = ?", table);
        manager
            .with_connection(|conn| conn.query_first(&sql, &[SqlParam::from(entity)]))
            .unwrap()
            .and_then(|row| row[0].as_i64())
            .unwrap()
    }

    #[test]
    fn test_round_trip_every_type() {
        let (_dir, _manager, store) = setup();
        let users = store.users();
        let id = Uuid::new_v4();
        let words = vec!["north".to_string(), "south".to_string()];

        users.save(id, "name", "Steve");
        users.save(id, "kills", 12i32);
        users.save(id, "ratio", 0.75f64);
        users.save(id, "banned", true);
        users.save(id, "playtime", 9_000_000_000i64);
        users.save(id, "speed", 1.25f32);
        users.save(id, "homes", AttributeValue::StringArray(words.clone()));
        users.save(id, "friends", words.clone());

        assert_eq!(users.load(id, "name"), Some("Steve".to_string()));
        assert_eq!(users.load_int(id, "kills", 0), 12);
        assert_eq!(users.load_double(id, "ratio", 0.0), 0.75);
        assert!(users.load_bool(id, "banned", false));
        assert_eq!(users.load_long(id, "playtime", 0), 9_000_000_000);
        assert_eq!(users.load_float(id, "speed", 0.0), 1.25);
        assert_eq!(users.load_string_array(id, "homes", vec![]), words);
        assert_eq!(users.load_string_list(id, "friends", vec![]), words);
        assert_eq!(
            users.load_value(id, "kills"),
            Some(AttributeValue::Int(12))
        );
    }

    #[test]
    fn test_type_tag_guard() {
        let (_dir, _manager, store) = setup();
        let users = store.users();
        let id = Uuid::new_v4();

        users.save(id, "k", 7i32);
        assert_eq!(users.load_double(id, "k", -1.5), -1.5);
        assert_eq!(users.load_long(id, "k", 99), 99);

        users.save(id, "list", vec!["a".to_string()]);
        assert_eq!(
            users.load_string_array(id, "list", vec!["default".to_string()]),
            vec!["default".to_string()]
        );
        // the raw text is still readable
        assert_eq!(users.load(id, "k"), Some("7".to_string()));
    }

    #[test]
    fn test_missing_key_returns_default() {
        let (_dir, _manager, store) = setup();
        let users = store.users();
        let id = Uuid::new_v4();

        assert_eq!(users.load(id, "nothing"), None);
        assert_eq!(users.load_string_or(id, "nothing", "fallback"), "fallback");
        assert_eq!(users.load_int(id, "nothing", 5), 5);
        assert!(users.load_string_list(id, "nothing", vec![]).is_empty());
        assert!(users.load_value(id, "nothing").is_none());
    }

    #[test]
    fn test_upsert_idempotence() {
        let (_dir, manager, store) = setup();
        let users = store.users();
        let id = Uuid::new_v4();

        users.save(id, "title", "first");
        users.save(id, "title", "second");

        assert_eq!(row_count(&manager, "users", id), 1);
        assert_eq!(users.load(id, "title"), Some("second".to_string()));

        // changing the type replaces the tag too
        users.save(id, "title", 3i32);
        assert_eq!(row_count(&manager, "users", id), 1);
        assert_eq!(users.load_int(id, "title", 0), 3);
    }

    #[test]
    fn test_non_finite_numbers_are_not_stored() {
        let (_dir, manager, store) = setup();
        let users = store.users();
        let id = Uuid::new_v4();

        users.save(id, "ratio", 0.5f64);
        users.save(id, "ratio", f64::NAN);
        users.save(id, "speed", f32::INFINITY);

        assert_eq!(users.load_double(id, "ratio", -7.0), 0.5);
        assert!(!users.exists(id, "speed"));
        assert_eq!(users.load_float(id, "speed", -7.0), -7.0);
        assert_eq!(row_count(&manager, "users", id), 1);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let (_dir, manager, store) = setup();
        let id = Uuid::new_v4();
        manager
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO users (EntityId, Key, Value, Type) VALUES (?, ?, ?, ?)",
                    &[
                        SqlParam::from(id),
                        SqlParam::from("broken"),
                        SqlParam::from("not-a-number"),
                        SqlParam::from("int"),
                    ],
                )
            })
            .unwrap();

        assert_eq!(store.users().load_int(id, "broken", 42), 42);
        assert!(store.users().load_value(id, "broken").is_none());
    }

    #[test]
    fn test_namespace_case_folding() {
        let (_dir, _manager, store) = setup();
        let id = Uuid::new_v4();

        store.table("Currency").save(id, "gold", 250i64);
        assert_eq!(store.table("currency").load_long(id, "gold", 0), 250);
        assert!(store.table("CURRENCY").exists(id, "gold"));
    }

    #[test]
    fn test_invalid_namespace_is_rejected() {
        let (_dir, _manager, store) = setup();
        let id = Uuid::new_v4();
        let bad = store.table("users; DROP TABLE users");

        bad.save(id, "k", "v");
        assert_eq!(bad.load(id, "k"), None);
        assert!(!bad.exists(id, "k"));
        assert!(!bad.delete(id, "k"));
        assert!(store.table_exists("users"));
    }

    #[test]
    fn test_missing_table_degrades() {
        let (_dir, _manager, store) = setup();
        let id = Uuid::new_v4();
        let table = store.table("never_created");

        table.save(id, "k", 1i32);
        assert_eq!(table.load_int(id, "k", -1), -1);
        assert!(!table.exists(id, "k"));
        assert!(!store.table_exists("never_created"));
    }

    #[test]
    fn test_delete_and_exists() {
        let (_dir, _manager, store) = setup();
        let users = store.users();
        let id = Uuid::new_v4();

        users.save(id, "k", "v");
        assert!(users.exists(id, "k"));
        assert!(users.delete(id, "k"));
        assert!(!users.exists(id, "k"));
        assert!(!users.delete(id, "k"));
    }

    #[test]
    fn test_wipe() {
        let (_dir, _manager, store) = setup();
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        store.users().save(id, "name", "Alex");
        store.table("currency").save(id, "gold", 10i32);
        store.table("info").save(id, "joined", "today");
        store.users().save(other, "name", "Sam");

        assert!(store.wipe(id));
        assert!(!store.users().exists(id, "name"));
        assert!(!store.table("currency").exists(id, "gold"));
        assert!(!store.table("info").exists(id, "joined"));
        assert!(store.users().exists(other, "name"));

        assert!(!store.wipe(Uuid::new_v4()));
    }
}
