//! CLI configuration

use crate::cli::GlobalArgs;
use chunkstream_core::BatchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings loaded from file, then overridden by flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine settings
    #[serde(default)]
    pub engine: BatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and CLI overrides
    ///
    /// A missing file is an error only when it was named explicitly.
    pub fn load(args: &GlobalArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(chunk_size) = args.chunk_size {
            config.engine.stream.chunk_size = chunk_size;
        }

        if let Some(delay_ms) = args.delay_ms {
            config.engine.stream.chunk_delay_ms = delay_ms;
        }

        config.engine.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

fn default_filter() -> String {
    "chunkstream_cli=info,chunkstream_core=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(&GlobalArgs::default()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.engine.max_concurrent_streams, 5);
    }

    #[test]
    fn test_file_then_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "engine:\n  max_concurrent_streams: 2\n  stream:\n    chunk_size: 7\n    chunk_delay_ms: 0\nlogging:\n  filter: debug"
        )
        .unwrap();

        let args = GlobalArgs {
            config: Some(file.path().to_path_buf()),
            chunk_size: Some(3),
            ..Default::default()
        };
        let config = AppConfig::load(&args).unwrap();

        assert_eq!(config.engine.max_concurrent_streams, 2);
        assert_eq!(config.engine.stream.chunk_size, 3);
        assert_eq!(config.engine.stream.chunk_delay_ms, 0);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = GlobalArgs {
            chunk_size: Some(0),
            ..Default::default()
        };
        assert!(AppConfig::load(&args).is_err());
    }

    #[test]
    fn test_missing_named_file_is_error() {
        let args = GlobalArgs {
            config: Some("/nonexistent/chunkstream.yaml".into()),
            ..Default::default()
        };
        assert!(AppConfig::load(&args).is_err());
    }
}
