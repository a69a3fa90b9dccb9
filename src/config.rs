use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the library, thumbnails, and community cache
    pub data_dir: PathBuf,
    /// Base URL of the community catalog; unset disables sharing
    pub server_url: Option<String>,
    /// Fixed device id; generated and persisted when unset
    pub device_id: Option<String>,
    /// Address the local bridge listens on
    pub bridge_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deckshare");
        Self {
            data_dir,
            server_url: None,
            device_id: None,
            bridge_addr: "127.0.0.1:7621".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults.
    /// A missing config file falls back to defaults; an unreadable or
    /// malformed one is an error.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str(&contents).map_err(|source| {
                ConfigError::Parse {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        // Apply environment variable overrides
        if let Ok(data_dir) = std::env::var("DECKSHARE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(server_url) = std::env::var("DECKSHARE_SERVER_URL") {
            config.server_url = Some(server_url);
        }
        if let Ok(device_id) = std::env::var("DECKSHARE_DEVICE_ID") {
            config.device_id = Some(device_id);
        }
        if let Ok(bridge_addr) = std::env::var("DECKSHARE_BRIDGE_ADDR") {
            config.bridge_addr = bridge_addr;
        }

        Ok(config)
    }

    /// Catalog base URL, when community sharing is configured.
    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Default config file path: ~/.config/deckshare/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deckshare")
            .join("config.yaml")
    }

    /// Library directory under the data directory.
    pub fn library_dir(&self) -> PathBuf {
        self.data_dir.join("library")
    }

    /// Community cache document path.
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("community_cache.json")
    }

    /// Stable anonymous device id: the configured one when set, otherwise
    /// generated on first use and persisted at `<data_dir>/device_id`.
    pub fn device_id(&self) -> Result<String, ConfigError> {
        if let Some(configured) = self.device_id.as_deref().filter(|d| !d.is_empty()) {
            return Ok(configured.to_string());
        }

        let path = self.data_dir.join("device_id");
        if let Ok(existing) = std::fs::read_to_string(&path) {
            let trimmed = existing.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        let id = Uuid::new_v4().to_string();
        std::fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::DeviceId {
            path: self.data_dir.clone(),
            source,
        })?;
        std::fs::write(&path, &id).map_err(|source| ConfigError::DeviceId { path, source })?;
        Ok(id)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to persist device id at '{path}': {source}")]
    DeviceId {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
