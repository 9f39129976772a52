use clap::{Args, Subcommand};
use serde::Serialize;
use townstore::{Citizen, LevelOutcome, StoreConfig, Town, TownRepository};
use uuid::Uuid;

use super::{fail, open_store, print_json};

/// Arguments for the Town command
#[derive(Args)]
pub struct TownArgs {
    #[clap(subcommand)]
    pub command: TownCommands,
}

#[derive(Subcommand)]
pub enum TownCommands {
    /// Show a town by name, or the town a player belongs to
    Show {
        /// Town name
        name: Option<String>,

        /// Look up the town of this player instead
        #[clap(long)]
        member: Option<Uuid>,
    },

    /// Create a town owned by a player
    Create {
        name: String,

        /// Owner (and first citizen) of the town
        #[clap(long)]
        owner: Uuid,

        /// Plot the town is centered on
        #[clap(long)]
        center: String,

        /// Make the town public
        #[clap(long)]
        public: bool,
    },

    /// Grant XP to a town
    Xp { name: String, amount: i64 },

    /// Raise a town by one level
    Upgrade { name: String },

    /// Invite a player to a town
    Invite { name: String, player: Uuid },

    /// List the plots claimed by a town
    Plots { name: String },
}

#[derive(Debug, Serialize)]
struct TownDetails {
    town: Town,
    citizens: Vec<Citizen>,
    plots: Vec<String>,
}

#[derive(Debug, Serialize)]
struct XpInfo {
    town: Town,
    outcome: LevelOutcome,
}

pub fn run(config: &StoreConfig, args: TownArgs, json: bool) {
    let store = open_store(config);
    let towns = store.towns();

    match args.command {
        TownCommands::Show { name, member } => {
            let town = match (name, member) {
                (Some(name), _) => towns.get_town_by_name(&name),
                (None, Some(player)) => towns.get_town_by_member(player),
                (None, None) => fail("provide a town name or --member"),
            };
            let Some(town) = town else {
                fail("town not found");
            };
            let details = TownDetails {
                citizens: towns.list_citizens(town.id),
                plots: towns.list_plots(town.id),
                town,
            };
            if json {
                print_json(&details);
            } else {
                print_town(&details);
            }
        }
        TownCommands::Create {
            name,
            owner,
            center,
            public,
        } => {
            if towns.is_name_taken(&name) {
                fail(&format!("a town named '{}' already exists", name));
            }
            if let Some(holder) = towns.town_of_plot(&center) {
                fail(&format!("plot {} already belongs to town {}", center, holder));
            }
            let mut town = Town::new(&name, owner, &center);
            town.is_public = public;
            towns.upsert_town(&town);
            towns.add_citizen(owner, town.id, "mayor");
            towns.assign_plot(&center, town.id);

            let Some(created) = towns.get_town(town.id) else {
                fail(&format!("town '{}' was not saved, see the log for details", name));
            };
            if json {
                print_json(&created);
            } else {
                println!("Created town '{}' ({})", created.name, created.id);
            }
        }
        TownCommands::Xp { name, amount } => {
            let mut town = require(towns, &name);
            let outcome = towns.grant_xp(&mut town, amount);
            if json {
                print_json(&XpInfo { town, outcome });
            } else {
                println!(
                    "{}: level {}, {}/{} xp{}",
                    town.name,
                    town.level,
                    town.xp,
                    town.xp_to_next_level,
                    if outcome.leveled_up() {
                        format!(" (+{} level)", outcome.levels_gained)
                    } else {
                        String::new()
                    }
                );
            }
        }
        TownCommands::Upgrade { name } => {
            let mut town = require(towns, &name);
            towns.upgrade_town(&mut town);
            if json {
                print_json(&town);
            } else {
                println!(
                    "{} is now level {} with up to {} plots",
                    town.name, town.level, town.max_claimed_plots
                );
            }
        }
        TownCommands::Invite { name, player } => {
            let town = require(towns, &name);
            towns.invite(player, town.id);
            let invited = towns.has_invitation(player, town.id);
            if json {
                print_json(&serde_json::json!({
                    "town": town.id,
                    "player": player,
                    "invited": invited,
                }));
            } else if invited {
                println!("Invited {} to {}", player, town.name);
            } else {
                fail("invitation was not stored, see the log for details");
            }
        }
        TownCommands::Plots { name } => {
            let town = require(towns, &name);
            let plots = towns.list_plots(town.id);
            if json {
                print_json(&plots);
            } else {
                println!(
                    "{} ({}/{} plots)",
                    town.name,
                    plots.len(),
                    town.max_claimed_plots
                );
                for plot in plots {
                    println!("  {}", plot);
                }
            }
        }
    }
}

fn require(towns: &TownRepository, name: &str) -> Town {
    match towns.get_town_by_name(name) {
        Some(town) => town,
        None => fail(&format!("no town named '{}'", name)),
    }
}

fn print_town(details: &TownDetails) {
    let town = &details.town;
    println!("{}", town.name);
    println!("{}\n", "=".repeat(town.name.len()));
    println!("  Id:             {}", town.id);
    println!("  Owner:          {}", town.owner_id);
    println!("  Center plot:    {}", town.center_plot_id);
    println!(
        "  Level:          {} ({}/{} xp)",
        town.level, town.xp, town.xp_to_next_level
    );
    println!("  Budget:         {}", town.budget);
    println!("  Tax:            {}", town.tax);
    println!(
        "  Plots:          {}/{}",
        details.plots.len(),
        town.max_claimed_plots
    );
    println!(
        "  Visibility:     {}",
        if town.is_public { "public" } else { "private" }
    );
    println!("\nCitizens:");
    for citizen in &details.citizens {
        println!("  {} ({})", citizen.player_id, citizen.role);
    }
}
