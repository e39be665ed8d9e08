//! Logging setup for telshell.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// The configured level, or INFO when the string is not a level name.
fn resolve_level(level: &str) -> Level {
    level.parse().unwrap_or(Level::INFO)
}

/// Initialize logging per the configuration.
///
/// Records go to the configured log file without ANSI colors; when no file
/// is configured, they go to stderr instead. A `RUST_LOG` environment
/// variable overrides the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(resolve_level(&config.level).to_string()));

    if config.file.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    if let Some(dir) = Path::new(&config.file).parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let sink = Arc::new(File::create(&config.file)?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(sink)
        .with_ansi(false)
        .init();

    Ok(())
}

/// Plain stderr logging at the given level, for development use.
pub fn init_stderr(level: &str) {
    tracing_subscriber::fmt()
        .with_max_level(resolve_level(level))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level_names() {
        assert_eq!(resolve_level("trace"), Level::TRACE);
        assert_eq!(resolve_level("DEBUG"), Level::DEBUG);
        assert_eq!(resolve_level("Warn"), Level::WARN);
        assert_eq!(resolve_level("error"), Level::ERROR);
    }

    #[test]
    fn test_resolve_level_fallback() {
        assert_eq!(resolve_level("loud"), Level::INFO);
        assert_eq!(resolve_level(""), Level::INFO);
    }
}
