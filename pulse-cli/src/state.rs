use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$PULSE_HOME`, else `~/.pulse`.
pub fn pulse_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PULSE_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".pulse"))
}

pub fn ensure_pulse_home() -> Result<PathBuf> {
    let dir = pulse_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn db_path() -> Result<PathBuf> {
    Ok(ensure_pulse_home()?.join("pulse.db"))
}
