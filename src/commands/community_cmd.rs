//! Community catalog CLI commands.

use clap::{Args, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::str::FromStr;

use crate::models::{BrowseQuery, EntryKind, RemoteEntry};
use crate::sync::{SyncClient, SyncError};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Share and fetch entries through the community catalog
#[derive(Args)]
pub struct CommunityCommand {
    #[command(subcommand)]
    pub command: CommunitySubcommand,
}

#[derive(Subcommand)]
pub enum CommunitySubcommand {
    /// Browse the community feed
    Browse {
        /// Filter by entry kind (item, zone, layout, theme)
        #[arg(long = "type", value_name = "KIND")]
        kind: Option<String>,

        /// Full-text search
        #[arg(long)]
        search: Option<String>,

        /// Sort order: newest, popular, or name
        #[arg(long)]
        sort: Option<String>,

        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the entries this device published
    MyUploads {
        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the most downloaded community entries
    Featured {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the cached feed without touching the network
    Cached {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Publish a local entry
    Upload {
        /// Local entry ID
        id: String,
    },

    /// Download a community entry into the local library
    Download {
        /// Server entry ID
        id: String,
    },

    /// Delete an own entry from the catalog
    Delete {
        /// Server entry ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Report an entry for moderation
    Flag {
        /// Server entry ID
        id: String,

        /// Reason for the report
        #[arg(long, default_value = "inappropriate")]
        reason: String,
    },
}

impl CommunityCommand {
    pub async fn run(&self, client: &SyncClient) -> Result<(), CommunityCommandError> {
        match &self.command {
            CommunitySubcommand::Browse {
                kind,
                search,
                sort,
                page,
                format,
            } => {
                self.browse(client, kind.as_deref(), search, sort, *page, format)
                    .await
            }
            CommunitySubcommand::MyUploads { page, format } => {
                let result = client.my_uploads(*page).await?;
                print_result(&result.entries, result.total, format)
            }
            CommunitySubcommand::Featured { format } => {
                let result = client.featured().await?;
                print_result(&result.entries, result.total, format)
            }
            CommunitySubcommand::Cached { format } => self.cached(client, format).await,
            CommunitySubcommand::Upload { id } => self.upload(client, id).await,
            CommunitySubcommand::Download { id } => self.download(client, id).await,
            CommunitySubcommand::Delete { id, force } => self.delete(client, id, *force).await,
            CommunitySubcommand::Flag { id, reason } => {
                client.flag(id, reason).await;
                println!("Reported entry {}", id);
                Ok(())
            }
        }
    }

    async fn browse(
        &self,
        client: &SyncClient,
        kind: Option<&str>,
        search: &Option<String>,
        sort: &Option<String>,
        page: u32,
        format: &OutputFormat,
    ) -> Result<(), CommunityCommandError> {
        let kind = match kind.filter(|k| !k.is_empty()) {
            Some(raw) => Some(
                EntryKind::from_str(raw).map_err(CommunityCommandError::InvalidKind)?,
            ),
            None => None,
        };
        let query = BrowseQuery {
            kind,
            search: search.clone(),
            sort: sort.clone(),
            page,
            ..Default::default()
        };

        let result = client.browse(&query).await?;
        print_result(&result.entries, result.total, format)
    }

    async fn cached(
        &self,
        client: &SyncClient,
        format: &OutputFormat,
    ) -> Result<(), CommunityCommandError> {
        let cache = client.cached().await;
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&cache)?);
            }
            OutputFormat::Text => {
                if cache.entries.is_empty() {
                    println!("Cache is empty. Run `community browse` to populate it.");
                    return Ok(());
                }
                print_feed(&cache.entries);
                if let Some(watermark) = cache.newest_created_at {
                    println!();
                    println!("Newest entry: {}", watermark.format("%Y-%m-%d %H:%M:%S"));
                }
            }
        }
        Ok(())
    }

    async fn upload(&self, client: &SyncClient, id: &str) -> Result<(), CommunityCommandError> {
        let outcome = client.upload(id).await?;
        if outcome.already_published {
            println!(
                "Already published as {} (local entry renamed to match)",
                outcome.server_id
            );
        } else {
            println!("Published as {}", outcome.server_id);
        }
        Ok(())
    }

    async fn download(&self, client: &SyncClient, id: &str) -> Result<(), CommunityCommandError> {
        let outcome = client.download(id).await?;
        if outcome.already_present {
            println!("Entry {} is already in the local library", outcome.local_id);
        } else {
            println!("Downloaded entry {}", outcome.local_id);
        }
        Ok(())
    }

    async fn delete(
        &self,
        client: &SyncClient,
        id: &str,
        force: bool,
    ) -> Result<(), CommunityCommandError> {
        if !force {
            print!("Delete server entry {}? [y/N] ", id);
            io::stdout().flush().map_err(CommunityCommandError::Io)?;
            let mut answer = String::new();
            io::stdin()
                .read_line(&mut answer)
                .map_err(CommunityCommandError::Io)?;
            if !answer.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled.");
                return Ok(());
            }
        }

        client.delete(id).await?;
        println!("Deleted server entry {}", id);
        Ok(())
    }
}

fn print_result(
    entries: &[RemoteEntry],
    total: i64,
    format: &OutputFormat,
) -> Result<(), CommunityCommandError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
        OutputFormat::Text => {
            print_feed(entries);
            println!();
            println!("{} of {} entries", entries.len(), total);
        }
    }
    Ok(())
}

fn print_feed(entries: &[RemoteEntry]) {
    if entries.is_empty() {
        println!("No entries found.");
        return;
    }
    for entry in entries {
        let downloads = entry
            .downloads
            .map(|n| format!("  {} downloads", n))
            .unwrap_or_default();
        println!(
            "{}  {:<6}  {}{}",
            entry.id,
            entry.kind.to_string(),
            entry.created_at.format("%Y-%m-%d %H:%M"),
            downloads
        );
    }
}

/// Errors from community commands
#[derive(Debug)]
pub enum CommunityCommandError {
    InvalidKind(String),
    Sync(SyncError),
    Io(io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CommunityCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunityCommandError::InvalidKind(msg) => write!(f, "{}", msg),
            CommunityCommandError::Sync(e) => write!(f, "{}", e),
            CommunityCommandError::Io(e) => write!(f, "{}", e),
            CommunityCommandError::Json(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CommunityCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommunityCommandError::Sync(e) => Some(e),
            CommunityCommandError::Io(e) => Some(e),
            CommunityCommandError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for CommunityCommandError {
    fn from(e: SyncError) -> Self {
        CommunityCommandError::Sync(e)
    }
}

impl From<serde_json::Error> for CommunityCommandError {
    fn from(e: serde_json::Error) -> Self {
        CommunityCommandError::Json(e)
    }
}
