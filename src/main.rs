use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use deckshare::commands::{CommunityCommand, LibraryCommand};
use deckshare::{Config, Library, SyncClient};

#[derive(Parser)]
#[command(name = "deckshare")]
#[command(version)]
#[command(about = "Local preset library with community sharing", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the local library
    Library(LibraryCommand),

    /// Share and fetch entries through the community catalog
    Community(CommunityCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Library(cmd)) => {
            let mut library = Library::open(config.library_dir());
            cmd.run(&mut library)?;
        }
        Some(Commands::Community(cmd)) => {
            let Some(server_url) = config.server_url() else {
                eprintln!("Community sharing is not configured.");
                eprintln!();
                eprintln!("Add to your config file:");
                eprintln!();
                eprintln!("  server_url: \"https://api.example.com/v1/library\"");
                eprintln!();
                eprintln!("Or set the DECKSHARE_SERVER_URL environment variable.");
                std::process::exit(1);
            };
            let library = Arc::new(Mutex::new(Library::open(config.library_dir())));
            let client = SyncClient::new(
                server_url,
                config.device_id()?,
                library,
                config.cache_path(),
            );
            cmd.run(&client).await?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
