use clap::{Args, Subcommand};
use serde::Serialize;
use townstore::database::attributes::DEFAULT_NAMESPACE;
use townstore::{AttributeValue, StoreConfig, TypeTag};
use uuid::Uuid;

use super::{fail, open_store, print_json};

/// Arguments for the Attr command
#[derive(Args)]
pub struct AttrArgs {
    /// Attribute table, e.g. users, currency or info
    #[clap(short, long, default_value = DEFAULT_NAMESPACE, global = true)]
    pub table: String,

    #[clap(subcommand)]
    pub command: AttrCommands,
}

#[derive(Subcommand)]
pub enum AttrCommands {
    /// Print one attribute
    Get { entity: Uuid, key: String },

    /// Store one attribute
    Set {
        entity: Uuid,
        key: String,
        /// Value text; numbers and booleans as literals, arrays as JSON
        value: String,
        /// Value type: string, int, double, boolean, long, float, string_array, string_list
        #[clap(short = 'T', long = "type", default_value = "string")]
        value_type: TypeTag,
    },

    /// Remove one attribute
    Delete { entity: Uuid, key: String },

    /// Check whether an attribute is set
    Exists { entity: Uuid, key: String },

    /// Remove an entity from the users, currency and info tables
    Wipe { entity: Uuid },
}

#[derive(Debug, Serialize)]
struct AttributeInfo {
    table: String,
    entity: Uuid,
    key: String,
    #[serde(rename = "type")]
    value_type: Option<TypeTag>,
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResultInfo {
    entity: Uuid,
    result: bool,
}

pub fn run(config: &StoreConfig, args: AttrArgs, json: bool) {
    let store = open_store(config);
    let attributes = store.attributes();
    let table = attributes.table(&args.table);

    match args.command {
        AttrCommands::Get { entity, key } => {
            let value = table.load_value(entity, &key);
            let encoded = value.as_ref().and_then(|v| v.encode().ok());
            if json {
                print_json(&AttributeInfo {
                    table: args.table,
                    entity,
                    key,
                    value_type: value.as_ref().map(AttributeValue::tag),
                    value: encoded,
                });
            } else {
                match (value, encoded) {
                    (Some(v), Some(text)) => println!("{} = {} ({})", key, text, v.tag()),
                    _ => println!("{} is not set for {}", key, entity),
                }
            }
        }
        AttrCommands::Set {
            entity,
            key,
            value,
            value_type,
        } => {
            let parsed = match AttributeValue::decode(value_type, &value) {
                Ok(v) => v,
                Err(e) => fail(&format!("'{}' is not a valid {}: {}", value, value_type, e)),
            };
            table.save(entity, &key, parsed);
            let stored = table.exists(entity, &key);
            if json {
                print_json(&ResultInfo {
                    entity,
                    result: stored,
                });
            } else if stored {
                println!("Saved {} for {}", key, entity);
            } else {
                fail(&format!("{} was not saved, see the log for details", key));
            }
        }
        AttrCommands::Delete { entity, key } => {
            report(entity, table.delete(entity, &key), json, "Deleted", "Nothing to delete");
        }
        AttrCommands::Exists { entity, key } => {
            report(entity, table.exists(entity, &key), json, "Set", "Not set");
        }
        AttrCommands::Wipe { entity } => {
            report(entity, attributes.wipe(entity), json, "Wiped", "No data for");
        }
    }
}

fn report(entity: Uuid, result: bool, json: bool, yes: &str, no: &str) {
    if json {
        print_json(&ResultInfo { entity, result });
    } else if result {
        println!("{} {}", yes, entity);
    } else {
        println!("{} {}", no, entity);
    }
}
