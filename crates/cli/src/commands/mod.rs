pub mod check;
pub mod doctor;
pub mod init;
pub mod status;

use std::path::Path;
use tof_config::{ConfigError, TofConfig};

/// Load the config from an explicit path, or from ~/.tof/config.toml.
pub fn load_config(path: Option<&Path>) -> Result<TofConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = TofConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => TofConfig::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tof.toml");
        std::fs::write(&path, "[index]\nbackend = \"none\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.index.backend, "none");
    }

    #[test]
    fn invalid_explicit_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tof.toml");
        std::fs::write(&path, "[recovery]\nscore_threshold = 4.0\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }
}
