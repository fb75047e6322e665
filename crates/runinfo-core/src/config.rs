//! Client configuration.
//!
//! Precedence: defaults < config file < environment. An explicit config
//! path must be readable; the default search locations are optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::logging::{LogFormat, LogLevel};

pub const ENV_URL: &str = "RUNINFO_URL";
pub const ENV_DOWNLOAD_DIR: &str = "RUNINFO_DOWNLOAD_DIR";
pub const ENV_LOG_LEVEL: &str = "RUNINFO_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "RUNINFO_LOG_FORMAT";

/// Address the data handler listens on by default.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080/";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub download: DownloadConfig,
    pub connection: ConnectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL of the data handler. Run pages live at `<url>/<run_number>`.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "console".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let dir = match std::env::var("HOME") {
            Ok(home) if !home.trim().is_empty() => PathBuf::from(home).join("Downloads"),
            _ => PathBuf::from("."),
        };
        Self {
            server: ServerConfig {
                url: DEFAULT_SERVER_URL.into(),
            },
            download: DownloadConfig { dir },
            connection: ConnectionConfig {
                connect_timeout: Duration::from_secs(10),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::Invalid("server.url is required".into()));
        }
        if self.download.dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("download.dir is required".into()));
        }
        if self.connection.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connection.connect_timeout_ms must be greater than 0".into(),
            ));
        }
        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(
                "logging.level must be one of trace, debug, info, warn, error".into(),
            ));
        }
        if LogFormat::parse(&self.logging.format).is_none() {
            return Err(ConfigError::Invalid(
                "logging.format must be one of console, json".into(),
            ));
        }
        Ok(())
    }

    /// Apply `RUNINFO_*` overrides from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_URL) {
            self.server.url = url.trim().to_string();
        }
        if let Some(dir) = get(ENV_DOWNLOAD_DIR) {
            self.download.dir = expand_tilde(dir.trim())?;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.logging.level = level.trim().to_string();
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            self.logging.format = format.trim().to_string();
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    server: PartialServerConfig,
    #[serde(default)]
    download: PartialDownloadConfig,
    #[serde(default)]
    connection: PartialConnectionConfig,
    #[serde(default)]
    logging: PartialLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
struct PartialServerConfig {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialDownloadConfig {
    #[serde(default)]
    dir: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConnectionConfig {
    #[serde(default)]
    connect_timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialLoggingConfig {
    #[serde(default)]
    level: String,
    #[serde(default)]
    format: String,
}

/// Load config from `config_file` or the first readable default location,
/// then apply the process environment. Returns the file that was used, if any.
pub fn load_config(config_file: Option<&str>) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let candidates = default_config_paths(|key| std::env::var(key).ok());
    let (mut cfg, used) = load_file(config_file, &candidates)?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    Ok((cfg, used))
}

fn load_file(
    config_file: Option<&str>,
    candidates: &[PathBuf],
) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let mut cfg = Config::default();

    let explicit = config_file
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);
    let (path, text) = match explicit {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(text) => (path, text),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        },
        None => {
            let found = candidates
                .iter()
                .find_map(|path| std::fs::read_to_string(path).ok().map(|t| (path.clone(), t)));
            match found {
                Some(found) => found,
                None => return Ok((cfg, None)),
            }
        }
    };

    // An empty file parses as YAML null.
    let parsed: PartialConfig = if text.trim().is_empty() {
        PartialConfig::default()
    } else {
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?
    };
    apply_partial(&mut cfg, parsed)?;
    Ok((cfg, Some(path)))
}

/// `$XDG_CONFIG_HOME/runinfo/config.yaml`, then `~/.config/runinfo/config.yaml`.
fn default_config_paths<F>(lookup: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut paths = Vec::new();
    if let Some(xdg) = var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("runinfo").join("config.yaml"));
    }
    if let Some(home) = var("HOME") {
        paths.push(
            PathBuf::from(home)
                .join(".config")
                .join("runinfo")
                .join("config.yaml"),
        );
    }
    paths
}

fn apply_partial(cfg: &mut Config, partial: PartialConfig) -> Result<(), ConfigError> {
    if !partial.server.url.trim().is_empty() {
        cfg.server.url = partial.server.url.trim().to_string();
    }
    if !partial.download.dir.trim().is_empty() {
        cfg.download.dir = expand_tilde(partial.download.dir.trim())?;
    }
    if partial.connection.connect_timeout_ms > 0 {
        cfg.connection.connect_timeout =
            Duration::from_millis(partial.connection.connect_timeout_ms);
    }
    if !partial.logging.level.trim().is_empty() {
        cfg.logging.level = partial.logging.level.trim().to_string();
    }
    if !partial.logging.format.trim().is_empty() {
        cfg.logging.format = partial.logging.format.trim().to_string();
    }
    Ok(())
}

pub fn expand_tilde(input: &str) -> Result<PathBuf, ConfigError> {
    let home = || {
        std::env::var("HOME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ConfigError::Home(input.to_string()))
    };
    if input == "~" {
        return Ok(PathBuf::from(home()?));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return Ok(PathBuf::from(home()?).join(rest));
    }
    Ok(Path::new(input).to_path_buf())
}
