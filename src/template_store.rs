use crate::error::{Result, ScaffoldError};
use std::fs;
use std::path::PathBuf;

const TEMPLATE_EXT: &str = "txt";

pub const DEFAULT_TEMPLATE: &str = "default";

pub const DEFAULT_SCAFFOLD_TEXT: &str = "\
# Edit this file to fit your needs, then save and quit.
#
# To save this command as a template, make this first line
# in this file, keeping the hash in front as well as the quotes around the
# template name:
#
# template_name=\"<template-name-here>\"
#
# The template name can only contain letters, numbers, underscores, or hyphens.
#
# Below, write out the shell command you wish to save as a scaffold, without
# hash characters in front. If it spans multiple lines, add a backslash '\\' at the end.

";

/// Template names are limited to `[A-Za-z0-9_-]+`.
pub fn is_valid_template_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Named command drafts, one `<name>.txt` file each.
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, TEMPLATE_EXT))
    }

    pub fn get(&self, name: &str) -> Result<String> {
        let path = self.path_of(name);
        if !is_valid_template_name(name) || !path.is_file() {
            return Err(ScaffoldError::TemplateNotFound {
                name: name.to_string(),
                path,
            });
        }
        Ok(fs::read_to_string(&path)?)
    }

    /// Writes `body` under `name`. Returns `false` without touching the disk
    /// when the name is not a valid template name.
    pub fn save(&self, name: &str, body: &str) -> Result<bool> {
        if !is_valid_template_name(name) {
            log::warn!("invalid template name \"{}\", not saved", name);
            return Ok(false);
        }

        let path = self.path_of(name);
        if path.exists() {
            log::info!("Overriding template {}", path.display());
        } else {
            log::info!("Saving template to {}", path.display());
        }
        fs::write(&path, body)?;
        Ok(true)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(TEMPLATE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name);
        if !is_valid_template_name(name) {
            return Err(ScaffoldError::TemplateNotFound {
                name: name.to_string(),
                path,
            });
        }
        fs::remove_file(&path)?;
        log::info!("Removed template {}.", name);
        Ok(())
    }
}
