use serde::Serialize;
use townstore::{DatabaseSettings, StoreConfig, Townstore};

use super::{fail, print_json};

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: &'a str,
    database: &'a DatabaseSettings,
}

#[derive(Debug, Serialize)]
struct InitInfo {
    target: String,
    tables: Vec<String>,
}

pub fn run(config: &StoreConfig, json: bool) {
    if json {
        // the password is never serialized
        print_json(&ConfigInfo {
            config_file: &config.config_file,
            database: &config.database,
        });
    } else {
        println!("Townstore Configuration");
        println!("=======================\n");
        println!("{}", config.summary());
    }
}

pub fn run_init(config: &StoreConfig, json: bool) {
    let store = Townstore::open(config.database.clone());
    if !store.initialize() {
        fail(&format!(
            "failed to provision tables at {}",
            config.database.target()
        ));
    }

    let tables: Vec<String> = townstore::database::core::WELL_KNOWN_NAMESPACES
        .iter()
        .chain(townstore::database::core::DOMAIN_TABLES.iter())
        .filter(|t| store.attributes().table_exists(t))
        .map(|t| t.to_string())
        .collect();

    if json {
        print_json(&InitInfo {
            target: config.database.target(),
            tables,
        });
    } else {
        println!("Database ready at {}", config.database.target());
        for table in tables {
            println!("  {}", table);
        }
    }
}
