use lc_persistence::StorageConfig;
use lc_sheets::SheetsConfig;
use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

pub mod client;
pub mod pages;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;

#[derive(Debug)]
pub enum ConfigError {
    NotFound,
    ReadError(std::io::Error),
    ParseError(String),
    UnsupportedFormat,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::NotFound => write!(f, "Configuration file not found"),
            ConfigError::ReadError(e) => write!(f, "Error reading configuration file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Error parsing configuration file: {}", e),
            ConfigError::UnsupportedFormat => write!(f, "Unsupported configuration file format"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::ReadError(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerDetails {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerDetails {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            port: 8080,
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmbedConfig {
    /// Seconds third-party pages may cache the public form definition.
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: u64,
}

fn default_cache_max_age() -> u64 {
    300
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            cache_max_age: default_cache_max_age(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ServerConfig {
    /// log4rs configuration file. Without it logging goes through env_logger.
    #[serde(default)]
    pub log4rs_config: Option<String>,
    #[serde(default)]
    pub servers: Vec<ServerDetails>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sheets: Option<SheetsConfig>,
    #[serde(default)]
    pub embed: EmbedConfig,
}

impl ServerConfig {
    /// Configured listeners, or a single default one on port 8080.
    pub fn listeners(&self) -> Vec<ServerDetails> {
        if self.servers.is_empty() {
            vec![ServerDetails::default()]
        } else {
            self.servers.clone()
        }
    }
}

pub fn load_config_from_path(path: &Path) -> Result<ServerConfig, ConfigError> {
    debug!("Loading config from: {:?}", path);

    if !path.exists() {
        error!("Configuration file not found at {:?}", path);
        return Err(ConfigError::NotFound);
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::ReadError)?;
    trace!("Config file content:\n{}", contents);

    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        Some("json") => {
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string())),
        Some("xml") => {
            serde_xml_rs::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        _ => {
            error!("Unsupported server config file format: {:?}", path.extension());
            Err(ConfigError::UnsupportedFormat)
        }
    }
}
