use clap::{Args, Subcommand, ValueEnum};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::library::Library;
use crate::models::{Entry, EntryKind};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct LibraryCommand {
    #[command(subcommand)]
    pub command: LibrarySubcommand,
}

#[derive(Subcommand)]
pub enum LibrarySubcommand {
    /// List library entries
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Filter by entry kind (item, zone, layout, theme)
        #[arg(long = "type", value_name = "KIND")]
        kind: Option<String>,
    },

    /// Show one entry's full document
    Show {
        /// Entry ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Save a new entry from a JSON payload file ("-" reads stdin)
    Save {
        /// Entry kind (item, zone, layout, theme)
        kind: String,

        /// Path to the JSON payload
        file: PathBuf,

        /// Tags (can be repeated)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },

    /// Import a full entry document (e.g. a shared file)
    Import {
        /// Path to the entry document
        file: PathBuf,
    },

    /// Export an entry document exactly as stored
    Export {
        /// Entry ID
        id: String,

        /// Output path (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete an entry and its thumbnails
    Delete {
        /// Entry ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Rebuild the listing index from the entry documents
    RebuildIndex,
}

impl LibraryCommand {
    pub fn run(&self, library: &mut Library) -> Result<(), LibraryCommandError> {
        match &self.command {
            LibrarySubcommand::List { format, kind } => self.list(library, format, kind.as_deref()),
            LibrarySubcommand::Show { id, format } => self.show(library, id, format),
            LibrarySubcommand::Save { kind, file, tags } => {
                self.save(library, kind, file, tags.clone())
            }
            LibrarySubcommand::Import { file } => self.import(library, file),
            LibrarySubcommand::Export { id, output } => {
                self.export(library, id, output.as_deref())
            }
            LibrarySubcommand::Delete { id, force } => self.delete(library, id, *force),
            LibrarySubcommand::RebuildIndex => {
                library.rebuild_index();
                println!("Rebuilt index: {} entries", library.entries().len());
                Ok(())
            }
        }
    }

    fn list(
        &self,
        library: &Library,
        format: &OutputFormat,
        kind: Option<&str>,
    ) -> Result<(), LibraryCommandError> {
        let kind = match kind.filter(|k| !k.is_empty()) {
            Some(raw) => Some(
                EntryKind::from_str(raw).map_err(LibraryCommandError::InvalidKind)?,
            ),
            None => None,
        };

        let records: Vec<_> = match kind {
            Some(kind) => library.entries_by_kind(kind).into_iter().cloned().collect(),
            None => library.entries().to_vec(),
        };

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            OutputFormat::Text => {
                if records.is_empty() {
                    println!("No entries found.");
                    return Ok(());
                }
                for record in &records {
                    let tags = if record.tags.is_empty() {
                        String::new()
                    } else {
                        format!("  [{}]", record.tags.join(", "))
                    };
                    println!(
                        "{}  {:<6}  {}{}",
                        record.id,
                        record.kind.to_string(),
                        record.created_at.format("%Y-%m-%d %H:%M"),
                        tags
                    );
                }
                println!();
                println!("{} entries", records.len());
            }
        }
        Ok(())
    }

    fn show(
        &self,
        library: &Library,
        id: &str,
        format: &OutputFormat,
    ) -> Result<(), LibraryCommandError> {
        let entry = library
            .read(id)
            .ok_or_else(|| LibraryCommandError::NotFound(id.to_string()))?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            }
            OutputFormat::Text => {
                println!("ID:       {}", entry.id);
                println!("Kind:     {}", entry.kind);
                println!("Created:  {}", entry.created_at.format("%Y-%m-%d %H:%M:%S"));
                if !entry.app_version.is_empty() {
                    println!("Version:  {}", entry.app_version);
                }
                if let Some(imported) = entry.imported_at {
                    println!("Imported: {}", imported.format("%Y-%m-%d %H:%M:%S"));
                }
                if !entry.tags.is_empty() {
                    println!("Tags:     {}", entry.tags.join(", "));
                }
                println!();
                println!("{}", serde_json::to_string_pretty(&entry.data)?);
            }
        }
        Ok(())
    }

    fn save(
        &self,
        library: &mut Library,
        kind: &str,
        file: &PathBuf,
        tags: Vec<String>,
    ) -> Result<(), LibraryCommandError> {
        let kind = EntryKind::from_str(kind).map_err(LibraryCommandError::InvalidKind)?;

        let contents = if file.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(file)?
        };
        let data: serde_json::Value = serde_json::from_str(&contents)?;
        if data.is_null() {
            return Err(LibraryCommandError::SaveFailed);
        }

        let entry = Entry::new(kind, data, tags);
        let id = library.save(&entry).ok_or(LibraryCommandError::SaveFailed)?;
        println!("Saved {} entry {}", entry.kind, id);
        Ok(())
    }

    fn import(&self, library: &mut Library, file: &PathBuf) -> Result<(), LibraryCommandError> {
        let bytes = std::fs::read(file)?;
        let id = library
            .import(&bytes)
            .ok_or(LibraryCommandError::ImportFailed)?;
        println!("Imported entry {}", id);
        Ok(())
    }

    fn export(
        &self,
        library: &Library,
        id: &str,
        output: Option<&std::path::Path>,
    ) -> Result<(), LibraryCommandError> {
        let bytes = library
            .export(id)
            .ok_or_else(|| LibraryCommandError::NotFound(id.to_string()))?;

        match output {
            Some(path) => {
                std::fs::write(path, &bytes)?;
                println!("Exported {} to {}", id, path.display());
            }
            None => {
                io::stdout().write_all(&bytes)?;
            }
        }
        Ok(())
    }

    fn delete(
        &self,
        library: &mut Library,
        id: &str,
        force: bool,
    ) -> Result<(), LibraryCommandError> {
        if library.get(id).is_none() {
            return Err(LibraryCommandError::NotFound(id.to_string()));
        }

        if !force {
            print!("Delete entry {}? [y/N] ", id);
            io::stdout().flush()?;
            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            if !answer.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled.");
                return Ok(());
            }
        }

        if library.delete(id) {
            println!("Deleted entry {}", id);
            Ok(())
        } else {
            Err(LibraryCommandError::NotFound(id.to_string()))
        }
    }
}

/// Errors from library commands
#[derive(Debug)]
pub enum LibraryCommandError {
    NotFound(String),
    InvalidKind(String),
    SaveFailed,
    ImportFailed,
    Io(io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for LibraryCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryCommandError::NotFound(id) => write!(f, "Entry not found: {}", id),
            LibraryCommandError::InvalidKind(msg) => write!(f, "{}", msg),
            LibraryCommandError::SaveFailed => write!(f, "Failed to save entry"),
            LibraryCommandError::ImportFailed => {
                write!(f, "Failed to import entry (invalid document?)")
            }
            LibraryCommandError::Io(e) => write!(f, "{}", e),
            LibraryCommandError::Json(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LibraryCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LibraryCommandError::Io(e) => Some(e),
            LibraryCommandError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LibraryCommandError {
    fn from(e: io::Error) -> Self {
        LibraryCommandError::Io(e)
    }
}

impl From<serde_json::Error> for LibraryCommandError {
    fn from(e: serde_json::Error) -> Self {
        LibraryCommandError::Json(e)
    }
}
