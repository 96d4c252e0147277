//! Configuration for a sync run.
//!
//! Layers, lowest precedence first: built-in defaults, the optional TOML file
//! (`~/.config/blursync/config.toml`), environment variables (a `.env` file in
//! the working directory is loaded into the environment by the binary), then
//! command-line flags applied by `main`.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sync::DEFAULT_CONCURRENCY;

pub const ENV_SESSION: &str = "NEWSBLUR_SESSIONID";
pub const ENV_FOLDER: &str = "NEWSBLUR_FOLDER";
pub const ENV_HOST: &str = "NEWSBLUR_HOST";

pub const DEFAULT_HOST: &str = "https://newsblur.com";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No session token: set NEWSBLUR_SESSIONID or session_token in the config file")]
    MissingSessionToken,
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Settings for one run. Every key is optional in the file.
///
/// SEC-015: Custom Debug impl masks `session_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the NewsBlur instance.
    pub service_host: String,

    /// Folder new subscriptions are filed under. Unset lets the service choose.
    pub target_folder: Option<String>,

    /// Maximum add-feed requests in flight.
    pub concurrency_limit: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Where the raw `/reader/feeds` response is cached.
    pub cache_path: PathBuf,

    /// Cached snapshots older than this are refetched (unless offline).
    pub cache_max_age_minutes: i64,

    /// The desired feed list (OPML, JSON array, or one URL per line).
    pub desired_path: PathBuf,

    /// Value of the `newsblur_sessionid` cookie. The env var takes precedence.
    pub session_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_host: DEFAULT_HOST.to_string(),
            target_folder: None,
            concurrency_limit: DEFAULT_CONCURRENCY,
            request_timeout_secs: 30,
            cache_path: PathBuf::from("data/feeds.json"),
            cache_max_age_minutes: 60,
            desired_path: PathBuf::from("data/desired.txt"),
            session_token: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("service_host", &self.service_host)
            .field("target_folder", &self.target_folder)
            .field("concurrency_limit", &self.concurrency_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_path", &self.cache_path)
            .field("cache_max_age_minutes", &self.cache_max_age_minutes)
            .field("desired_path", &self.desired_path)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "service_host",
        "target_folder",
        "concurrency_limit",
        "request_timeout_secs",
        "cache_path",
        "cache_max_age_minutes",
        "desired_path",
        "session_token",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), host = %config.service_host, "Loaded configuration");
        Ok(config)
    }

    /// Overrides file values with `NEWSBLUR_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    /// Empty values count as unset.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(ENV_SESSION) {
            self.session_token = Some(token);
        }
        if let Some(folder) = get(ENV_FOLDER) {
            self.target_folder = Some(folder);
        }
        if let Some(host) = get(ENV_HOST) {
            self.service_host = host;
        }
    }

    /// The session cookie value, or an error when none is configured.
    pub fn session_token(&self) -> Result<SecretString, ConfigError> {
        self.session_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
            .ok_or(ConfigError::MissingSessionToken)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_host, "https://newsblur.com");
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.cache_path, PathBuf::from("data/feeds.json"));
        assert!(config.target_folder.is_none());
        assert!(config.session_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/blursync_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.service_host, DEFAULT_HOST);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let dir = std::env::temp_dir().join("blursync_config_test_whitespace");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n  ").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.concurrency_limit, 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("blursync_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
service_host = "https://blur.example.com"
target_folder = "Imported"
concurrency_limit = 8
request_timeout_secs = 10
cache_path = "/var/cache/blursync/feeds.json"
cache_max_age_minutes = 5
desired_path = "feeds.opml"
session_token = "abc"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.service_host, "https://blur.example.com");
        assert_eq!(config.target_folder.as_deref(), Some("Imported"));
        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.cache_max_age_minutes, 5);
        assert_eq!(config.desired_path, PathBuf::from("feeds.opml"));
        assert_eq!(config.session_token().unwrap().expose_secret(), "abc");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("blursync_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("blursync_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "concurrency_limit = \"many\"\n").unwrap();

        assert!(Config::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("blursync_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "target_folder = \"News\"\nretries = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.target_folder.as_deref(), Some("News"));

        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("blursync_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            session_token: Some("from-file".into()),
            target_folder: Some("FileFolder".into()),
            ..Config::default()
        };
        config.apply_env_from(env(&[
            (ENV_SESSION, "from-env"),
            (ENV_FOLDER, "EnvFolder"),
            (ENV_HOST, "https://blur.example.com"),
        ]));

        assert_eq!(config.session_token().unwrap().expose_secret(), "from-env");
        assert_eq!(config.target_folder.as_deref(), Some("EnvFolder"));
        assert_eq!(config.service_host, "https://blur.example.com");
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = Config {
            session_token: Some("from-file".into()),
            ..Config::default()
        };
        config.apply_env_from(env(&[(ENV_SESSION, "  "), (ENV_HOST, "")]));

        assert_eq!(config.session_token().unwrap().expose_secret(), "from-file");
        assert_eq!(config.service_host, DEFAULT_HOST);
    }

    #[test]
    fn test_missing_session_token() {
        let config = Config::default();
        assert!(matches!(
            config.session_token(),
            Err(ConfigError::MissingSessionToken)
        ));

        let blank = Config {
            session_token: Some("   ".into()),
            ..Config::default()
        };
        assert!(blank.session_token().is_err());
    }

    // SEC-015: Debug output masks the session token
    #[test]
    fn test_debug_masks_session_token() {
        let config = Config {
            session_token: Some("super-secret-session-12345".into()),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-session-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
