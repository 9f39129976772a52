//! Store handle bundling every component over one shared connection

use std::sync::Arc;

use tracing::info;

use crate::config::{ConfigProvider, DatabaseSettings};
use crate::database::attributes::TypedAttributeStore;
use crate::database::core::{ConnectionManager, SchemaProvisioner};
use crate::database::town::TownRepository;
use crate::error::StoreResult;

/// Attribute store, town repository and schema provisioner sharing one
/// [`ConnectionManager`]
///
/// Opening does not connect; the first operation does.
pub struct Townstore {
    manager: Arc<ConnectionManager>,
    provisioner: SchemaProvisioner,
    attributes: TypedAttributeStore,
    towns: TownRepository,
}

impl Townstore {
    pub fn open(settings: DatabaseSettings) -> Self {
        let manager = Arc::new(ConnectionManager::new(settings));
        Self {
            provisioner: SchemaProvisioner::new(manager.clone()),
            attributes: TypedAttributeStore::new(manager.clone()),
            towns: TownRepository::new(manager.clone()),
            manager,
        }
    }

    /// Build from a configuration provider
    ///
    /// Fails with `ConfigurationMissing` when no provider is given.
    pub fn from_provider(provider: Option<&dyn ConfigProvider>) -> StoreResult<Self> {
        Ok(Self::open(DatabaseSettings::from_provider(provider)?))
    }

    /// Create the well-known attribute tables and the town tables
    pub fn initialize(&self) -> bool {
        info!(
            "Provisioning {} database at {}",
            self.manager.backend(),
            self.manager.settings().target()
        );
        let attributes = self.provisioner.ensure_well_known_tables();
        let domain = self.provisioner.ensure_domain_schema();
        attributes && domain
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn provisioner(&self) -> &SchemaProvisioner {
        &self.provisioner
    }

    pub fn attributes(&self) -> &TypedAttributeStore {
        &self.attributes
    }

    pub fn towns(&self) -> &TownRepository {
        &self.towns
    }

    /// Mutable repository access, for registering a level-up hook
    pub fn towns_mut(&mut self) -> &mut TownRepository {
        &mut self.towns
    }

    pub fn close(&self) {
        self.manager.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::town::Town;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[test]
    fn test_requires_provider() {
        assert!(Townstore::from_provider(None).is_err());
    }

    #[test]
    fn test_components_share_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let mut values = HashMap::new();
        values.insert(
            "database.sqlite.path".to_string(),
            path.to_string_lossy().to_string(),
        );

        let store = Townstore::from_provider(Some(&values)).unwrap();
        assert!(!store.manager().is_connected());
        assert!(store.initialize());
        assert!(store.manager().is_connected());

        let mayor = Uuid::new_v4();
        let town = Town::new("Harbor", mayor, "3:7");
        store.towns().upsert_town(&town);
        store.towns().add_citizen(mayor, town.id, "mayor");
        store.attributes().users().save(mayor, "title", "Mayor of Harbor");

        store.close();
        assert!(!store.manager().is_connected());

        assert_eq!(store.towns().get_town_by_member(mayor).unwrap().id, town.id);
        assert_eq!(
            store.attributes().users().load(mayor, "title"),
            Some("Mayor of Harbor".to_string())
        );
        assert!(store.attributes().wipe(mayor));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_shared_across_threads() {
        assert_send_sync::<Townstore>();
        assert_send_sync::<ConnectionManager>();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.db");
        let store = Arc::new(Townstore::open(DatabaseSettings::sqlite(
            path.to_str().unwrap(),
        )));
        assert!(store.initialize());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let mut written = Vec::new();
                    for i in 0..50i32 {
                        let id = Uuid::new_v4();
                        store.attributes().users().save(id, "counter", i);
                        if i % 10 == 0 {
                            store.close();
                        }
                        written.push((id, i));
                    }
                    written
                })
            })
            .collect();

        let written: Vec<(Uuid, i32)> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(written.len(), 400);
        for (id, i) in written {
            assert_eq!(store.attributes().users().load_int(id, "counter", -1), i);
        }
    }
}
