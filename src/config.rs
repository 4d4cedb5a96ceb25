use crate::error::{Result, ScaffoldError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // Program launched on the scaffold buffer
    pub editor: String,
    // Program used to page history and templates
    pub pager: String,
    // Number of runs shown by `history` without -n
    pub history_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: "nano".to_string(),
            pager: "less".to_string(),
            history_lines: 5,
        }
    }
}

impl Config {
    /// Loads the config at `config_path`, writing the defaults there first if
    /// the file is missing. `SCAFFOLD_EDITOR` and `SCAFFOLD_PAGER` override the
    /// file but are never written back.
    pub fn load(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            toml::from_str(&content).map_err(|e| ScaffoldError::Config {
                path: config_path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            log::info!("config file not found, creating at {}", config_path.display());
            let config = Config::default();
            config.save(config_path)?;
            config
        };

        if let Some(editor) = non_empty_env("SCAFFOLD_EDITOR") {
            config.editor = editor;
        }
        if let Some(pager) = non_empty_env("SCAFFOLD_PAGER") {
            config.pager = pager;
        }
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ScaffoldError::Config {
            path: config_path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(config_path, content)?;
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
