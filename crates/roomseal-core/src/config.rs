use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RoomsealError, RoomsealResult};

/// Minimum accepted PBKDF2 iteration count. Rooms created with fewer
/// iterations are not interoperable with other clients.
pub const MIN_PBKDF2_ITERATIONS: u32 = 200_000;

/// Upper bound for the stream chunk size (64 MiB)
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Top-level client configuration (loaded from roomseal.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsealConfig {
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

/// Room crypto configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations (default: 200000, never lower)
    pub pbkdf2_iterations: u32,
    /// Plaintext bytes per encrypted stream chunk (default: 2 MiB)
    pub chunk_size: usize,
    /// Chunks buffered between reader and writer in streaming operations (default: 4)
    pub pipeline_depth: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
            chunk_size: 2 * 1024 * 1024,
            pipeline_depth: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl RoomsealConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> RoomsealResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RoomsealConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> RoomsealResult<()> {
        if self.crypto.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(RoomsealError::Config(format!(
                "crypto.pbkdf2_iterations = {} is below the minimum of {}",
                self.crypto.pbkdf2_iterations, MIN_PBKDF2_ITERATIONS
            )));
        }
        if self.crypto.chunk_size == 0 || self.crypto.chunk_size > MAX_CHUNK_SIZE {
            return Err(RoomsealError::Config(format!(
                "crypto.chunk_size = {} must be between 1 and {}",
                self.crypto.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.crypto.pipeline_depth == 0 {
            return Err(RoomsealError::Config(
                "crypto.pipeline_depth must be at least 1".into(),
            ));
        }
        match self.logging.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(RoomsealError::Config(format!(
                "logging.format = {other:?} (expected \"json\" or \"text\")"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[crypto]
pbkdf2_iterations = 600000
chunk_size = 1048576
pipeline_depth = 8

[logging]
level = "debug"
format = "json"
"#;
        let config: RoomsealConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.crypto.pbkdf2_iterations, 600_000);
        assert_eq!(config.crypto.chunk_size, 1_048_576);
        assert_eq!(config.crypto.pipeline_depth, 8);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_defaults() {
        let config: RoomsealConfig = toml::from_str("").unwrap();

        assert_eq!(config.crypto.pbkdf2_iterations, 200_000);
        assert_eq!(config.crypto.chunk_size, 2 * 1024 * 1024);
        assert_eq!(config.crypto.pipeline_depth, 4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[crypto]
pipeline_depth = 2
"#;
        let config: RoomsealConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.crypto.pipeline_depth, 2);
        // Defaults
        assert_eq!(config.crypto.pbkdf2_iterations, 200_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_lowered_iterations_rejected() {
        let config: RoomsealConfig = toml::from_str("[crypto]\npbkdf2_iterations = 1000\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pbkdf2_iterations"));
    }

    #[test]
    fn test_bad_chunk_size_and_depth_rejected() {
        let mut config = RoomsealConfig::default();
        config.crypto.chunk_size = 0;
        assert!(config.validate().is_err());

        config.crypto.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = RoomsealConfig::default();
        config.crypto.pipeline_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_format_rejected() {
        let mut config = RoomsealConfig::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = RoomsealConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: RoomsealConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.crypto.pbkdf2_iterations, parsed.crypto.pbkdf2_iterations);
        assert_eq!(config.crypto.chunk_size, parsed.crypto.chunk_size);
        assert_eq!(config.logging.format, parsed.logging.format);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();

        let config = RoomsealConfig::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[crypto\nbroken").unwrap();

        assert!(matches!(
            RoomsealConfig::load(file.path()),
            Err(RoomsealError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RoomsealConfig::load(&dir.path().join("absent.toml")),
            Err(RoomsealError::Io(_))
        ));
    }
}
