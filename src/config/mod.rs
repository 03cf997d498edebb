mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

impl Config {
    /// Load configuration from file, environment, and defaults, then validate.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(ref p) if p.exists() => {
                info!("Loading config from {}", p.display());
                load_config_file(p)?
            }
            Some(ref p) => {
                anyhow::bail!("Config file '{}' does not exist", p.display());
            }
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        validate_config_object(&config)?;
        Ok(config)
    }

    /// Write default configuration to a file, in the format its extension names.
    pub fn write_default(path: &str) -> Result<()> {
        write_config_file(std::path::Path::new(path), &Config::default())
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_BACKEND_URL) {
            self.backend.base_url = url;
        }

        if let Ok(bind) = std::env::var(ENV_BIND) {
            self.server.bind = bind;
        }

        if let Ok(port) = std::env::var(ENV_PORT) {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid {}={}", ENV_PORT, port),
            }
        }
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("opamp-dashboard.json"),
        PathBuf::from("opamp-dashboard.yaml"),
        PathBuf::from("opamp-dashboard.yml"),
        PathBuf::from("opamp-dashboard.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".opamp-dashboard").join("config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}
