use clap::{Parser, Subcommand};
use townstore::StoreConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::attr::AttrArgs;
use commands::town::TownArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.townstore/townstore.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output as JSON
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective database settings
    Config,

    /// Create the attribute tables and the town tables
    Init,

    /// Read and write typed player attributes
    Attr(AttrArgs),

    /// Inspect and manage towns
    Town(TownArgs),
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match StoreConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Config => commands::config::run(&config, cli.json),
        Commands::Init => commands::config::run_init(&config, cli.json),
        Commands::Attr(args) => commands::attr::run(&config, args, cli.json),
        Commands::Town(args) => commands::town::run(&config, args, cli.json),
    }
}
