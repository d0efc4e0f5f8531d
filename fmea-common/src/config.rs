//! Configuration loading and root folder resolution

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::score::GuardPolicy;
use crate::{Error, Result};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "FMEA_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "fmea.db";

/// Contents of `config.toml`; every section is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub persistence: PersistenceConfig,
    pub guard: GuardPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5730".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Ceiling on one save's commit transaction
    pub commit_timeout_ms: u64,
    /// SQLite busy timeout per statement
    pub busy_timeout_ms: u64,
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            commit_timeout_ms: 10_000,
            busy_timeout_ms: 5_000,
            max_connections: 8,
        }
    }
}

impl PersistenceConfig {
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from an explicit path, else the platform search path, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match config_file_path() {
            Some(path) => Self::load(&path),
            None => {
                warn!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// First existing config file for the platform
///
/// Linux: `~/.config/fmea/config.toml`, then `/etc/fmea/config.toml`.
/// Elsewhere: the platform config directory.
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("fmea").join("config.toml"));

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/fmea/config.toml");
        user_config
            .filter(|p| p.exists())
            .or_else(|| system_config.exists().then_some(system_config))
    } else {
        user_config.filter(|p| p.exists())
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("fmea"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/fmea"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("fmea"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/fmea"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("fmea"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\fmea"))
    } else {
        PathBuf::from("./fmea_data")
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    env_var: String,
}

impl Default for RootFolderResolver {
    fn default() -> Self {
        Self::new(ROOT_FOLDER_ENV)
    }
}

impl RootFolderResolver {
    pub fn new(env_var: &str) -> Self {
        Self {
            env_var: env_var.to_string(),
        }
    }

    pub fn resolve(&self, cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &config.root_folder {
            return path.clone();
        }

        default_root_folder()
    }
}

/// Database file inside a root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}
