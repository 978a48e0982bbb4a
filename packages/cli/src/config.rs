use dcstruct_evaluator::ComposerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "dcstruct.config.json";

/// dcstruct configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory searched for descriptor files when no input is given
    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Component names the headless host resolves
    #[serde(default)]
    pub components: Vec<String>,

    #[serde(default)]
    pub composer: ComposerConfig,
}

fn default_src_dir() -> String {
    "descriptors".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(|err| {
                anyhow::anyhow!("Invalid {}: {}", config_path.display(), err)
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_src_dir(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.src_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            log_level: default_log_level(),
            components: vec![],
            composer: ComposerConfig::default(),
        }
    }
}
