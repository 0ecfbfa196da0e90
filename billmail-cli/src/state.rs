use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn billmail_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".billmail"))
}

pub fn ensure_billmail_home() -> Result<PathBuf> {
    let dir = billmail_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Expand a leading `~/` against `$HOME`; other paths are returned as given.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").context("HOME is not set")?;
            Ok(Path::new(&home).join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
