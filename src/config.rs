//! Configuration module for the socketcmd server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the socketcmd server
#[derive(Parser, Debug)]
#[command(name = "socketcmd")]
#[command(author = "socketcmd authors")]
#[command(version = "0.1.0")]
#[command(about = "A line-oriented command server on a Unix socket", long_about = None)]
pub struct CliArgs {
    /// Socket to use
    pub socket: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Socket permissions, in octal (e.g. 660)
    #[arg(long)]
    pub chmod: Option<String>,

    /// Daemon uid
    #[arg(long)]
    pub uid: Option<u32>,

    /// Daemon gid
    #[arg(long)]
    pub gid: Option<u32>,

    /// Socket uid
    #[arg(long)]
    pub suid: Option<u32>,

    /// Socket gid
    #[arg(long)]
    pub sgid: Option<u32>,

    /// Number of worker threads (default: a single-threaded runtime)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub privileges: PrivilegesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct ServerConfig {
    /// Socket path
    pub socket: Option<PathBuf>,
    /// Socket permissions, in octal
    pub chmod: Option<String>,
    /// Number of worker threads
    pub workers: Option<usize>,
}

/// Process and socket ownership
#[derive(Debug, Deserialize, Default)]
pub struct PrivilegesConfig {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub socket_uid: Option<u32>,
    pub socket_gid: Option<u32>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub socket: PathBuf,
    /// Permission bits to apply to the socket file
    pub mode: Option<u32>,
    /// Identity the process switches to after setup
    pub uid: u32,
    pub gid: u32,
    /// Owner of the socket file
    pub socket_uid: u32,
    pub socket_gid: u32,
    pub workers: Option<usize>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::resolve(cli, toml_config, current_ids())
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    ///
    /// `current` is the process's own (uid, gid), used when no identity is
    /// configured.
    fn resolve(
        cli: CliArgs,
        toml_config: TomlConfig,
        current: (u32, u32),
    ) -> Result<Self, ConfigError> {
        let socket = cli
            .socket
            .or(toml_config.server.socket)
            .ok_or(ConfigError::MissingSocket)?;

        let mode = match cli.chmod.or(toml_config.server.chmod) {
            Some(chmod) => Some(parse_mode(&chmod)?),
            None => None,
        };

        let privileges = toml_config.privileges;
        let uid = cli.uid.or(privileges.uid).unwrap_or(current.0);
        let gid = cli.gid.or(privileges.gid).unwrap_or(current.1);

        Ok(Config {
            socket,
            mode,
            uid,
            gid,
            socket_uid: cli.suid.or(privileges.socket_uid).unwrap_or(uid),
            socket_gid: cli.sgid.or(privileges.socket_gid).unwrap_or(gid),
            workers: cli.workers.or(toml_config.server.workers),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Parse an octal permission string such as `660` or `0o755`.
fn parse_mode(chmod: &str) -> Result<u32, ConfigError> {
    let digits = chmod.trim_start_matches("0o");
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        _ => Err(ConfigError::InvalidMode(chmod.to_string())),
    }
}

fn current_ids() -> (u32, u32) {
    // SAFETY: getuid/getgid cannot fail and touch no memory.
    unsafe { (libc::getuid(), libc::getgid()) }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    MissingSocket,
    InvalidMode(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::MissingSocket => {
                write!(f, "No socket path given on the command line or in the config file")
            }
            ConfigError::InvalidMode(mode) => {
                write!(f, "Invalid socket permissions '{}': expected octal digits", mode)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["socketcmd"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert!(config.server.socket.is_none());
        assert!(config.server.chmod.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            socket = "/run/socketcmd.sock"
            chmod = "660"
            workers = 4

            [privileges]
            uid = 1000
            gid = 100
            socket_gid = 33

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.server.socket,
            Some(PathBuf::from("/run/socketcmd.sock"))
        );
        assert_eq!(config.server.chmod.as_deref(), Some("660"));
        assert_eq!(config.server.workers, Some(4));
        assert_eq!(config.privileges.uid, Some(1000));
        assert_eq!(config.privileges.socket_uid, None);
        assert_eq!(config.privileges.socket_gid, Some(33));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_socket_ids_default_to_process_ids() {
        let config = Config::resolve(
            cli(&["sc.sock", "--uid", "1000", "--gid", "100"]),
            TomlConfig::default(),
            (0, 0),
        )
        .unwrap();
        assert_eq!(config.socket, PathBuf::from("sc.sock"));
        assert_eq!((config.uid, config.gid), (1000, 100));
        assert_eq!((config.socket_uid, config.socket_gid), (1000, 100));
        assert_eq!(config.mode, None);
    }

    #[test]
    fn test_ids_default_to_current() {
        let config =
            Config::resolve(cli(&["sc.sock", "--sgid", "33"]), TomlConfig::default(), (501, 20))
                .unwrap();
        assert_eq!((config.uid, config.gid), (501, 20));
        assert_eq!((config.socket_uid, config.socket_gid), (501, 33));
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            socket = "/run/from-file.sock"
            chmod = "600"

            [logging]
            level = "warn"
        "#,
        )
        .unwrap();

        let config =
            Config::resolve(cli(&["cli.sock", "--chmod", "666"]), toml_config, (0, 0)).unwrap();
        assert_eq!(config.socket, PathBuf::from("cli.sock"));
        assert_eq!(config.mode, Some(0o666));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_missing_socket() {
        let result = Config::resolve(cli(&[]), TomlConfig::default(), (0, 0));
        assert!(matches!(result, Err(ConfigError::MissingSocket)));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("660").unwrap(), 0o660);
        assert_eq!(parse_mode("0755").unwrap(), 0o755);
        assert_eq!(parse_mode("0o600").unwrap(), 0o600);
        assert!(matches!(parse_mode("abc"), Err(ConfigError::InvalidMode(_))));
        assert!(matches!(parse_mode("999"), Err(ConfigError::InvalidMode(_))));
    }
}
