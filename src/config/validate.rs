// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HotrouteError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = HotrouteError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.server))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.root.as_os_str().is_empty() {
        return Err(HotrouteError::ConfigError(
            "[server].root must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_is_rejected() {
        let raw: RawConfigFile = toml::from_str("[server]\nroot = \"\"\n").unwrap();
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, HotrouteError::ConfigError(_)));
    }

    #[test]
    fn defaults_apply_to_missing_keys() {
        let raw: RawConfigFile = toml::from_str("[server]\nexpose_load_errors = true\n").unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.root(), std::path::Path::new("projects"));
        let flags = cfg.flags();
        assert!(flags.hot_reload);
        assert!(flags.expose_load_errors);
        assert!(flags.unload_on_delete);
    }

    #[test]
    fn unknown_keys_are_errors() {
        assert!(toml::from_str::<RawConfigFile>("[server]\nhot_relaod = true\n").is_err());
    }
}
