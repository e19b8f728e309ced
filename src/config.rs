use std::path::PathBuf;

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{DrizzleError, Result};

pub const CONFIG_FILE: &str = "drizzle.toml";

/// Durable local identity and session metadata. Everything here survives a
/// restart; transport handles never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub username: String,
    pub shared_dir: PathBuf,
    /// Last-known peer/server address, kept so a restart can reconnect.
    pub server_addr: String,
    /// Minted on the first successful handshake and reused verbatim across
    /// reconnects; cleared only by an explicit identity reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip)]
    pub(crate) config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: "drizzle".to_string(),
            shared_dir: PathBuf::new(),
            server_addr: String::new(),
            session_id: None,
            config_file: None,
        }
    }
}

impl Config {
    /// Load from the platform config dir, creating the file on first run.
    pub fn new() -> Result<Self> {
        let dirs = directories::BaseDirs::new().ok_or(DrizzleError::NoHomeDir)?;
        let config_file = dirs.config_dir().join(CONFIG_FILE);

        let defaults = Self {
            shared_dir: dirs.home_dir().join("drizzle-share"),
            ..Default::default()
        };

        let mut config = if !config_file.exists() {
            log::info!("creating config file at {config_file:?}");
            if let Some(parent) = config_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_file, toml::to_string(&defaults)?)?;
            defaults
        } else {
            log::info!("reading config from {config_file:?}");
            Figment::from(Serialized::defaults(defaults))
                .merge(Toml::file(&config_file))
                .extract()
                .map_err(Box::new)? // boxed because the error size from figment is large
        };
        config.config_file = Some(config_file);

        log::info!("using config: {config:?}");

        Ok(config)
    }

    /// Write the current values back to disk. Callers treat failures as
    /// best-effort and log them.
    pub fn store(&self) -> Result<()> {
        let Some(path) = &self.config_file else {
            return Ok(()); // not backed by a file
        };
        std::fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_omitted_from_the_file_until_minted() {
        let config = Config {
            username: "alice".to_string(),
            shared_dir: PathBuf::from("/srv/share"),
            server_addr: "10.0.0.2:8080".to_string(),
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("session_id"));

        let minted = Config {
            session_id: Some("abc-123".to_string()),
            ..config
        };
        let text = toml::to_string(&minted).unwrap();
        assert!(text.contains("session_id = \"abc-123\""));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.session_id.as_deref(), Some("abc-123"));
        assert_eq!(parsed.server_addr, "10.0.0.2:8080");
    }

    #[test]
    fn store_without_backing_file_is_a_no_op() {
        let config = Config::default();
        config.store().unwrap();
    }
}
