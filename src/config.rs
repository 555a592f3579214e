use crate::error::ConfigError;
use crate::error_helpers::config_error_with_fix;
use crate::search::SearchOptions;
use crate::types::Provider;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub search: SearchOptions,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Root of the `<provider>/instances_<os>.json` layout
    pub dir: PathBuf,
    #[serde(default = "default_providers")]
    pub providers: Vec<Provider>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where `offers --save` writes when no path is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_file: Option<PathBuf>,
}

fn default_providers() -> Vec<Provider> {
    Provider::ALL.to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                dir: PathBuf::from("catalog"),
                providers: default_providers(),
            },
            search: SearchOptions::default(),
            output: OutputConfig {
                results_file: Some(PathBuf::from("results/offers.json")),
            },
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // .fleetctl.toml in the current dir, then ~/.config/fleetctl/config.toml
            let local = PathBuf::from(".fleetctl.toml");
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("fleetctl").join("config.toml"))
                    .unwrap_or_else(|| PathBuf::from(".fleetctl.toml"))
            }
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
            let config: Config = toml::from_str(&content).with_context(|| {
                let mut err = format!("Failed to parse config: {}", config_path.display());
                err.push_str("\n  Common issues:");
                err.push_str("\n    - Invalid TOML syntax");
                err.push_str("\n    - Missing [catalog] section or dir");
                err.push_str("\n    - Unknown provider name (use \"AWS\" or \"Azure\")");
                err.push_str("\n  Tip: Run 'fleetctl init' to create a new config file");
                err
            })?;
            config.validate()?;
            debug!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            if path.is_some() {
                warn!(
                    "Config file not found: {}. Using defaults; run 'fleetctl init' to create one.",
                    config_path.display()
                );
            }
            Ok(Config::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.catalog.dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("catalog.dir".to_string()));
        }
        if self.catalog.providers.is_empty() {
            return Err(config_error_with_fix(
                "catalog.providers",
                "at least one provider must be enabled",
                "providers = [\"AWS\", \"Azure\"]",
            ));
        }
        if self.search.max_instances_per_offer == Some(0) {
            return Err(config_error_with_fix(
                "search.max_instances_per_offer",
                "cap must be at least 1",
                "remove the key to disable the cap",
            ));
        }
        Ok(())
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
