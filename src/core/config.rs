//! Data-root resolution for the `molt` binary.
//!
//! Precedence: explicit `--root` flag, then the `MOLT_HOME` environment
//! variable, then `data_root` from `$HOME/.molt/config.toml`, then the
//! default `$HOME/.molt/data`. Library callers never go through this;
//! they construct a [`Store`](crate::core::store::Store) directly.

use crate::core::error::MoltError;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub data_root: Option<PathBuf>,
}

fn home_dir() -> Result<PathBuf, MoltError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| MoltError::PathError("HOME is not set".to_string()))
}

fn load_config_file() -> Result<Config, MoltError> {
    let config_path = home_dir()?.join(".molt").join("config.toml");
    if !config_path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(&config_path).map_err(MoltError::IoError)?;
    toml::from_str(&content).map_err(|e| {
        MoltError::ValidationError(format!(
            "Invalid config at {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Resolve the store root for a CLI invocation.
pub fn resolve_data_root(explicit: Option<PathBuf>) -> Result<PathBuf, MoltError> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    if let Some(env_root) = std::env::var_os("MOLT_HOME") {
        return Ok(PathBuf::from(env_root));
    }
    let config = load_config_file()?;
    if let Some(root) = config.data_root {
        return Ok(root);
    }
    Ok(home_dir()?.join(".molt").join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_root_wins() {
        let root = resolve_data_root(Some(PathBuf::from("/tmp/elsewhere"))).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/elsewhere"));
    }

    #[test]
    fn test_config_parses_data_root() {
        let config: Config = toml::from_str("data_root = \"/srv/molt\"").unwrap();
        assert_eq!(config.data_root, Some(PathBuf::from("/srv/molt")));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.data_root.is_none());
    }
}
