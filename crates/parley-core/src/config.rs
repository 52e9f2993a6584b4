//! Client configuration.
//!
//! Resolution order per field: environment variable, then the optional
//! `config.toml` under the platform config dir, then the built-in default.
//! URLs are scheme-normalized so bare hosts work out of the box.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Default backend gateway base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
/// Default room service URL.
pub const DEFAULT_ROOM_URL: &str = "ws://localhost:7880";

const BACKEND_URL_ENV: &str = "PARLEY_BACKEND_URL";
const ROOM_URL_ENV: &str = "PARLEY_ROOM_URL";

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend chat gateway (`http(s)://`).
    pub backend_url: String,
    /// URL of the real-time room service (`ws(s)://`).
    pub room_url: String,
}

/// On-disk shape of `config.toml`. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    backend_url: Option<String>,
    #[serde(default)]
    room_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            room_url: DEFAULT_ROOM_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the environment, the optional config file,
    /// and defaults, in that order of precedence.
    pub fn load() -> Self {
        let file = config_file_path()
            .and_then(|path| read_file_config(&path))
            .unwrap_or_default();
        Self::resolve(
            std::env::var(BACKEND_URL_ENV).ok(),
            std::env::var(ROOM_URL_ENV).ok(),
            file,
        )
    }

    fn resolve(env_backend: Option<String>, env_room: Option<String>, file: FileConfig) -> Self {
        let backend_url = env_backend
            .or(file.backend_url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let room_url = env_room
            .or(file.room_url)
            .unwrap_or_else(|| DEFAULT_ROOM_URL.to_string());
        Self {
            backend_url: normalize_http_url(&backend_url),
            room_url: normalize_ws_url(&room_url),
        }
    }
}

/// Returns the path to `config.toml` under the platform config dir.
pub fn config_file_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("parley").join("config.toml"))
}

fn read_file_config(path: &PathBuf) -> Option<FileConfig> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring malformed config file");
            None
        }
    }
}

/// Ensures an `http(s)://` scheme, prefixing `http://` when missing.
pub fn normalize_http_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Ensures a `ws(s)://` scheme: `http(s)` URLs are rewritten to their
/// websocket counterpart, anything schemeless gets `ws://` prefixed.
pub fn normalize_ws_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_normalization_prefixes_missing_scheme() {
        assert_eq!(normalize_http_url("localhost:8000"), "http://localhost:8000");
        assert_eq!(normalize_http_url("https://api.example.com/"), "https://api.example.com");
        assert_eq!(normalize_http_url("http://x"), "http://x");
    }

    #[test]
    fn ws_normalization_rewrites_http_schemes() {
        assert_eq!(normalize_ws_url("localhost:7880"), "ws://localhost:7880");
        assert_eq!(normalize_ws_url("http://host"), "ws://host");
        assert_eq!(normalize_ws_url("https://host"), "wss://host");
        assert_eq!(normalize_ws_url("wss://host/"), "wss://host");
    }

    #[test]
    fn resolution_prefers_env_over_file_over_default() {
        let file = FileConfig {
            backend_url: Some("file-host:1".into()),
            room_url: None,
        };
        let config = ClientConfig::resolve(Some("env-host:2".into()), None, file);
        assert_eq!(config.backend_url, "http://env-host:2");
        assert_eq!(config.room_url, DEFAULT_ROOM_URL);
    }

    #[test]
    fn file_values_apply_when_env_is_absent() {
        let file = FileConfig {
            backend_url: Some("file-host:1".into()),
            room_url: Some("file-host:2".into()),
        };
        let config = ClientConfig::resolve(None, None, file);
        assert_eq!(config.backend_url, "http://file-host:1");
        assert_eq!(config.room_url, "ws://file-host:2");
    }
}
