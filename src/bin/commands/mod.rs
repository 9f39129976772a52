pub mod attr;
pub mod config;
pub mod town;

use serde::Serialize;
use townstore::{StoreConfig, Townstore};

/// Open the configured store with every table provisioned
pub(crate) fn open_store(config: &StoreConfig) -> Townstore {
    let store = Townstore::open(config.database.clone());
    if !store.initialize() {
        fail(&format!(
            "could not prepare the database at {}",
            config.database.target()
        ));
    }
    store
}

pub(crate) fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

pub(crate) fn fail(message: &str) -> ! {
    eprintln!("ERROR: {}", message);
    std::process::exit(1);
}
