//! Configuration module for telshell.

use serde::Deserialize;
use std::path::Path;

use crate::term::TermInfo;
use crate::{Result, TelshellError};

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8023
}

fn default_max_connections() -> usize {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

/// Shell presentation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Prompt shown before each command line.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Banner written after a successful login.
    #[serde(default = "default_welcome")]
    pub welcome: String,
    /// Terminal type assumed until the client reports its own.
    #[serde(default = "default_term")]
    pub default_term: String,
}

fn default_prompt() -> String {
    "Telnet Server> ".to_string()
}

fn default_welcome() -> String {
    "You have connected to the telnet server.".to_string()
}

fn default_term() -> String {
    "ansi".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            welcome: default_welcome(),
            default_term: default_term(),
        }
    }
}

/// Authentication configuration.
///
/// When `required` is set, the session consults the application's
/// `authenticate` hook before the shell starts. The two `need_*` flags
/// control which credentials are prompted for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Whether the authentication gate runs at all.
    #[serde(default)]
    pub required: bool,
    /// Prompt for a username.
    #[serde(default)]
    pub need_username: bool,
    /// Prompt for a password (read with echo off).
    #[serde(default)]
    pub need_password: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file; empty means logging to stderr only.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/telshell.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Shell presentation configuration.
    #[serde(default)]
    pub shell: ShellConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(TelshellError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| TelshellError::Config(format!("config parse error: {e}")))
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `max_connections` is zero
    /// - the default terminal type has no capability table entry
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(TelshellError::Config(
                "server.max_connections must be greater than zero".to_string(),
            ));
        }
        if TermInfo::lookup(&self.shell.default_term).is_none() {
            return Err(TelshellError::UnknownTerminal(
                self.shell.default_term.clone(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8023);
        assert_eq!(config.server.max_connections, 20);

        assert_eq!(config.shell.prompt, "Telnet Server> ");
        assert_eq!(config.shell.welcome, "You have connected to the telnet server.");
        assert_eq!(config.shell.default_term, "ansi");

        assert!(!config.auth.required);
        assert!(!config.auth.need_username);
        assert!(!config.auth.need_password);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/telshell.log");
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(
            r#"
            [server]
            port = 2323

            [shell]
            prompt = "demo> "

            [auth]
            required = true
            need_username = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 2323);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.shell.prompt, "demo> ");
        assert_eq!(config.shell.default_term, "ansi");
        assert!(config.auth.required);
        assert!(config.auth.need_username);
        assert!(!config.auth.need_password);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = Config::parse("this is not toml = [");
        assert!(matches!(result, Err(TelshellError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9999").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/no/such/config.toml");
        assert!(matches!(result, Err(TelshellError::Io(_))));
    }

    #[test]
    fn test_validate_default_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_connections() {
        let mut config = Config::default();
        config.server.max_connections = 0;
        assert!(matches!(config.validate(), Err(TelshellError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_term() {
        let mut config = Config::default();
        config.shell.default_term = "tvi920".to_string();
        assert!(matches!(
            config.validate(),
            Err(TelshellError::UnknownTerminal(term)) if term == "tvi920"
        ));
    }
}
