#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Townstore - persistence for a town-building game server
//!
//! Townstore keeps two kinds of data in one relational database, either an
//! embedded SQLite file or a MySQL server:
//!
//! - typed per-player attributes, grouped into namespaces (`users`,
//!   `currency`, `info`, or any other identifier), and
//! - towns with their claimed plots, citizens, ranks, invitations and
//!   level progression.
//!
//! It can be used as a library or through the `townstore` command-line tool.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (always) | SQLite backend | `rusqlite` (bundled) |
//! | `mysql` | MySQL backend | `mysql` |
//! | `cli` | `townstore` binary | `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # SQLite only, no binary
//! townstore = { version = "0.3", default-features = false }
//!
//! # Default (both backends and the CLI)
//! townstore = "0.3"
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: connection handling, schema, attribute store, town repository
//! - **[`leveling`]**: pure XP and level arithmetic
//! - **[`town`]**: town, citizen and rank records
//! - **[`config`]**: settings from a TOML file and `TOWNSTORE_*` environment variables
//! - **[`error`]**: the [`StoreError`] type
//!
//! # Failure model
//!
//! Only construction can fail, and only when no configuration provider is
//! given; unusable settings are logged and replaced by defaults. After
//! that, every read falls back to `None`, an empty collection or a
//! documented default, and every write becomes a logged no-op when the database misbehaves. The
//! connection is re-established on the next call.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use townstore::{DatabaseSettings, Town, Townstore};
//!
//! let store = Townstore::open(DatabaseSettings::sqlite("data/townstore.db"));
//! store.initialize();
//!
//! let mut town = Town::new("Riverside", mayor, "12:-4");
//! if !store.towns().is_name_taken(&town.name) {
//!     store.towns().upsert_town(&town);
//!     store.towns().add_citizen(mayor, town.id, "mayor");
//! }
//!
//! let outcome = store.towns().grant_xp(&mut town, 1500);
//! assert!(outcome.leveled_up());
//!
//! store.attributes().table("currency").save(mayor, "coins", 250i64);
//! let coins = store.attributes().table("currency").load_long(mayor, "coins", 0);
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod leveling;
pub mod town;

pub use config::{ConfigProvider, DatabaseSettings, MysqlSettings, StoreConfig};
pub use database::{
    AttributeValue, Backend, ConnectionManager, TownRepository, Townstore, TypeTag,
    TypedAttributeStore,
};
pub use error::{StoreError, StoreResult};
pub use leveling::LevelOutcome;
pub use town::{Citizen, Rank, Town};
