use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::image::policy::VersionSelection;
use crate::image::reference::DEFAULT_REGISTRY;

/// Timeout for registry requests in milliseconds (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_USER_AGENT: &str = "tagpin";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable holding a tracing filter directive
pub const LOG_ENV: &str = "TAGPIN_LOG";

/// Prefix of registry credential environment variables
///
/// `TAGPIN_REGISTRY_HOSTNAME`, `TAGPIN_REGISTRY_USERNAME` and
/// `TAGPIN_REGISTRY_PASSWORD` form one credential; further credentials use
/// numbered suffixes, e.g. `TAGPIN_REGISTRY_HOSTNAME_0`.
pub const CREDENTIAL_ENV_PREFIX: &str = "TAGPIN_REGISTRY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub registry: RegistryConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Append credentials found in environment variables
    pub fn with_env_credentials(
        mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.registry.credentials.extend(credentials_from_env(vars));
        self
    }
}

/// Registry client configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Use plain HTTP for every registry
    pub insecure: bool,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
    pub credentials: Vec<Credential>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            credentials: Vec::new(),
        }
    }
}

/// Credentials for one registry host
#[derive(Clone, Deserialize, PartialEq)]
pub struct Credential {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl Credential {
    /// Whether this credential applies to `registry`
    ///
    /// Docker Hub may be named `docker.io`, `index.docker.io` or
    /// `registry-1.docker.io`.
    pub fn matches(&self, registry: &str) -> bool {
        normalize_hostname(&self.hostname) == normalize_hostname(registry)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn normalize_hostname(hostname: &str) -> &str {
    let hostname = hostname
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let hostname = hostname.split('/').next().unwrap_or(hostname);

    match hostname {
        "docker.io" | "registry-1.docker.io" => DEFAULT_REGISTRY,
        other => other,
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// Filter directive used when `TAGPIN_LOG` is not set
    pub level: String,
    pub format: LogFormat,
    /// Write logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// One image to resolve, as listed in a batch file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSelection {
    pub image: String,
    pub version_selection: VersionSelection,
}

/// A batch of images to resolve
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ImagesFile {
    pub images: Vec<ImageSelection>,
}

impl ImagesFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Collect complete credential sets from environment variables.
/// Sets missing a hostname, username or password are skipped.
pub fn credentials_from_env(vars: impl IntoIterator<Item = (String, String)>) -> Vec<Credential> {
    let vars: BTreeMap<String, String> = vars
        .into_iter()
        .filter(|(key, _)| key.starts_with(CREDENTIAL_ENV_PREFIX))
        .collect();

    let hostname_key = format!("{}_HOSTNAME", CREDENTIAL_ENV_PREFIX);
    let mut suffixes: Vec<(Option<u32>, &str)> = vars
        .keys()
        .filter_map(|key| key.strip_prefix(hostname_key.as_str()))
        .filter_map(|suffix| match suffix {
            "" => Some((None, suffix)),
            _ => suffix
                .strip_prefix('_')
                .and_then(|n| n.parse().ok())
                .map(|n| (Some(n), suffix)),
        })
        .collect();
    suffixes.sort();

    suffixes
        .into_iter()
        .filter_map(|(_, suffix)| {
            let get = |name: &str| {
                vars.get(&format!("{}_{}{}", CREDENTIAL_ENV_PREFIX, name, suffix))
                    .cloned()
            };
            Some(Credential {
                hostname: get("HOSTNAME")?,
                username: get("USERNAME")?,
                password: get("PASSWORD")?,
            })
        })
        .collect()
}

/// Returns the path to the config directory for tagpin.
/// Uses $XDG_CONFIG_HOME/tagpin if XDG_CONFIG_HOME is set,
/// otherwise falls back to ~/.config/tagpin,
/// or ./tagpin if neither is available.
pub fn config_dir() -> PathBuf {
    config_dir_with_env(std::env::var("XDG_CONFIG_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the default config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

fn config_dir_with_env(xdg_config_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let config_dir = xdg_config_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    config_dir.join("tagpin")
}
