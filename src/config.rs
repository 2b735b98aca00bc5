//! Configuration loading and management.

use crate::board::SessionLimits;
use crate::types::DEFAULT_COLUMN_COLOR;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "KANBAN_CONFIG_PATH";

/// Project-level config file, relative to the working directory.
pub const PROJECT_CONFIG_FILE: &str = "kanban.yaml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub board: BoardConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Client-side board settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Most columns a board may hold.
    #[serde(default = "default_max_columns")]
    pub max_columns: usize,

    /// Color for new columns when none is picked.
    #[serde(default = "default_color")]
    pub default_color: String,

    /// Base URL of the board API used by the client commands.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            max_columns: default_max_columns(),
            default_color: default_color(),
            api_url: default_api_url(),
        }
    }
}

impl BoardConfig {
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_columns: self.max_columns,
            default_color: self.default_color.clone(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kanban/board.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_columns() -> usize {
    6
}

fn default_color() -> String {
    DEFAULT_COLUMN_COLOR.to_string()
}

fn default_api_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Candidate config files, highest priority first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from(PROJECT_CONFIG_FILE));
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("kanban-board").join("config.yaml"));
        }
        paths
    }

    /// Load from `explicit` if given (it must exist), else the first
    /// existing search path, else defaults. Environment overrides apply last.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::search_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    debug!(path = %path.display(), "Loading config");
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `KANBAN_DB_PATH`, `PORT`, and `KANBAN_API_URL` overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("KANBAN_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(url) = std::env::var("KANBAN_API_URL") {
            self.board.api_url = url;
        }
    }
}
