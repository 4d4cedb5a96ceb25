use crate::config::Config;
use crate::error::{Result, ScaffoldError};
use crate::history_store::HistoryStore;
use crate::template_store::{TemplateStore, DEFAULT_SCAFFOLD_TEXT, DEFAULT_TEMPLATE};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "scaffold";

/// Every on-disk location the tool uses, plus the loaded config. Resolved
/// once per invocation.
#[derive(Debug, Clone)]
pub struct Environment {
    pub share: PathBuf,
    pub templates: PathBuf,
    pub config_path: PathBuf,
    pub history: PathBuf,
    pub state: PathBuf,
    pub config: Config,
}

impl Environment {
    /// `~/.local/share/scaffold` and `~/.local/state/scaffold` on Linux.
    pub fn resolve() -> Result<Self> {
        let share = dirs::data_dir().ok_or(ScaffoldError::NoDataDir)?.join(APP_DIR);
        let state = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
            .ok_or(ScaffoldError::NoDataDir)?
            .join(APP_DIR);
        Self::resolve_in(share, state)
    }

    /// Creates whatever is missing under `share` and `state`. Existing files
    /// are only verified, so this is safe to run on every invocation.
    pub fn resolve_in(share: impl Into<PathBuf>, state: impl Into<PathBuf>) -> Result<Self> {
        let share = share.into();
        let state = state.into();
        let templates = share.join("templates");
        let config_path = share.join("config.toml");
        let history = share.join("history.jsonl");

        ensure_dir(&share, "share directory")?;

        ensure_dir(&templates, "templates directory")?;
        let default_template = templates.join(format!("{}.txt", DEFAULT_TEMPLATE));
        if !default_template.is_file() {
            log::info!("default template not found, creating at {}", default_template.display());
            fs::write(&default_template, DEFAULT_SCAFFOLD_TEXT).map_err(|source| ScaffoldError::Environment {
                path: default_template.clone(),
                source,
            })?;
        }

        let config = Config::load(&config_path).map_err(|e| escalate(e, &config_path))?;

        HistoryStore::new(&history)
            .verify_or_reset()
            .map_err(|e| escalate(e, &history))?;

        ensure_dir(&state, "state directory")?;

        Ok(Self {
            share,
            templates,
            config_path,
            history,
            state,
            config,
        })
    }

    pub fn template_store(&self) -> TemplateStore {
        TemplateStore::new(&self.templates)
    }

    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::new(&self.history)
    }
}

fn ensure_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    log::info!("{} not found, creating at {}", what, path.display());
    fs::create_dir_all(path).map_err(|source| ScaffoldError::Environment {
        path: path.to_path_buf(),
        source,
    })
}

// Plain I/O failures during bootstrap are reported against the path.
fn escalate(err: ScaffoldError, path: &Path) -> ScaffoldError {
    match err {
        ScaffoldError::Io(source) => ScaffoldError::Environment {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}
