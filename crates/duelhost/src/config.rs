//! Server configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration:
//!
//! ```toml
//! bind_addr = "0.0.0.0:7911"
//! max_frame_len = 4096
//! redis_url = "redis://127.0.0.1/"
//! log_level = "info"
//!
//! [engine]
//! program = "/usr/local/bin/duel-engine"
//! args = ["--quiet"]
//! max_frame_len = 65535
//! ```

use std::path::{Path, PathBuf};

use duelhost_protocol::{DEFAULT_MAX_FRAME_LEN, MAX_WIRE_FRAME_LEN};
use duelhost_room::ProcessLauncher;
use serde::Deserialize;

use crate::DuelhostError;

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: String,
    /// Largest client frame payload accepted before the connection is
    /// dropped.
    pub max_frame_len: usize,
    pub engine: EngineConfig,
    /// Redis for match history and the leaderboard. Without it, records
    /// are kept in memory and lost on restart.
    pub redis_url: Option<String>,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7911".to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            engine: EngineConfig::default(),
            redis_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, DuelhostError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DuelhostError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }
}

/// How to run the duel engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Largest frame payload accepted from the engine's stdout.
    pub max_frame_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("duel-engine"),
            args: Vec::new(),
            max_frame_len: MAX_WIRE_FRAME_LEN,
        }
    }
}

impl EngineConfig {
    /// A launcher that runs this engine.
    pub fn launcher(&self) -> ProcessLauncher {
        ProcessLauncher::new(&self.program)
            .args(self.args.iter().cloned())
            .max_frame_len(self.max_frame_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr, "0.0.0.0:7911");
        assert_eq!(config.max_frame_len, 4096);
        assert_eq!(config.engine.max_frame_len, 65535);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind_addr = "127.0.0.1:9000"
            redis_url = "redis://cache/"

            [engine]
            program = "/opt/engine/run"
            args = ["--seeded"]
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache/"));
        assert_eq!(config.engine.program, PathBuf::from("/opt/engine/run"));
        assert_eq!(config.engine.args, vec!["--seeded".to_string()]);
        assert_eq!(config.engine.max_frame_len, 65535);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_bad_type_is_config_error() {
        let err = ServerConfig::from_toml_str("max_frame_len = \"big\"").unwrap_err();
        assert!(matches!(err, DuelhostError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ServerConfig::load("/nonexistent/duelhost.toml").unwrap_err();
        assert!(matches!(err, DuelhostError::Io(_)));
    }
}
