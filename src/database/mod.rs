//! Database module
//!
//! All persistence for townstore, organized into:
//!
//! - **core**: backend dialects, the shared connection, schema provisioning
//! - **attributes**: typed key/value attributes per entity, one table per namespace
//! - **town**: the town aggregate and its plots, citizens, ranks and invitations
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── dialect     # SQLite / MySQL SQL fragments
//! │   ├── connection  # DatabaseConn and the reconnecting ConnectionManager
//! │   └── schema      # table definitions and SchemaProvisioner
//! │
//! ├── attributes/     # TypedAttributeStore
//! │   └── value       # AttributeValue and its type tags
//! │
//! ├── town/           # TownRepository
//! └── store           # Townstore, bundling the above
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use townstore::config::DatabaseSettings;
//! use townstore::database::Townstore;
//!
//! let store = Townstore::open(DatabaseSettings::sqlite("data/townstore.db"));
//! store.initialize();
//!
//! store.attributes().users().save(player, "nickname", "Steve");
//! let town = store.towns().get_town_by_member(player);
//! ```

pub mod attributes;
pub mod core;
pub mod town;

mod store;

pub use attributes::{AttributeTable, AttributeValue, TypeTag, TypedAttributeStore};
pub use core::{
    Backend, ConnectionManager, DatabaseConn, Dialect, SchemaDefinitions, SchemaProvisioner,
};
pub use store::Townstore;
pub use town::{LevelUpHook, TownRepository};
