//! Process-wide configuration: the access passkey, the model API key, and
//! service settings.
//!
//! Loaded once at startup. A `.env` file is read first, then the secrets TOML
//! file, then environment variables (later sources win). Both secrets are
//! required; startup fails if either is missing.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default location of the secrets file.
pub const DEFAULT_SECRETS_PATH: &str = ".streamlit/secrets.toml";

/// Environment variable overriding `[security] access_key`.
pub const ACCESS_KEY_ENV: &str = "DECK_ACCESS_KEY";

/// Environment variable overriding `OPENAI_API_KEY`.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding `[openai] base_url`.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Fully resolved configuration.
#[derive(Clone)]
pub struct Config {
    /// Passkey a request must present to use the tool.
    pub access_key: String,
    /// Bearer token for the chat-completions endpoint.
    pub api_key: String,
    pub openai: OpenAiSettings,
}

// Secrets stay out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("access_key", &"<redacted>")
            .field("api_key", &"<redacted>")
            .field("openai", &self.openai)
            .finish()
    }
}

/// Non-secret settings for the language-model client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    /// API root, without the trailing `/chat/completions`.
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// On-disk shape of the secrets file.
#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(rename = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,
    #[serde(default)]
    security: SecuritySection,
    #[serde(default)]
    openai: OpenAiSection,
}

#[derive(Debug, Default, Deserialize)]
struct SecuritySection {
    access_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiSection {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from `.env`, the secrets file, and the environment.
    ///
    /// A missing secrets file is fine as long as the environment supplies
    /// both secrets.
    pub fn load(secrets_path: &Path) -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }

        let file = if secrets_path.exists() {
            log::debug!("Reading secrets from {}", secrets_path.display());
            let content = std::fs::read_to_string(secrets_path).map_err(|e| {
                Error::ConfigError(format!("Failed to read {}: {}", secrets_path.display(), e))
            })?;
            Some(content)
        } else {
            log::debug!("No secrets file at {}", secrets_path.display());
            None
        };

        Self::resolve(file.as_deref(), |name| std::env::var(name).ok())
    }

    /// Merge secrets-file content with environment lookups.
    ///
    /// Separated from [`Config::load`] so the precedence rules can be tested
    /// without touching the process environment.
    pub fn resolve<F>(secrets_toml: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: SecretsFile = match secrets_toml {
            Some(content) => toml::from_str(content)
                .map_err(|e| Error::ConfigError(format!("Invalid secrets file: {}", e)))?,
            None => SecretsFile::default(),
        };

        let pick = |env_name: &str, from_file: Option<String>| {
            env(env_name)
                .or(from_file)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let access_key = pick(ACCESS_KEY_ENV, file.security.access_key)
            .ok_or_else(|| Error::MissingSecret("security.access_key".to_string()))?;
        let api_key = pick(API_KEY_ENV, file.openai_api_key)
            .ok_or_else(|| Error::MissingSecret(API_KEY_ENV.to_string()))?;

        let defaults = OpenAiSettings::default();
        let base_url = pick(BASE_URL_ENV, file.openai.base_url)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let timeout_secs = file.openai.timeout_secs.unwrap_or(defaults.timeout_secs);

        Ok(Self {
            access_key,
            api_key,
            openai: OpenAiSettings {
                base_url,
                timeout_secs,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    const SECRETS: &str = r#"
OPENAI_API_KEY = "sk-file"

[security]
access_key = "open-sesame"
"#;

    #[test]
    fn test_reads_secrets_file() {
        let config = Config::resolve(Some(SECRETS), no_env).unwrap();
        assert_eq!(config.access_key, "open-sesame");
        assert_eq!(config.api_key, "sk-file");
        assert_eq!(config.openai, OpenAiSettings::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            (API_KEY_ENV, "sk-env"),
            (BASE_URL_ENV, "http://localhost:8080/v1/"),
        ]
        .into_iter()
        .collect();
        let config =
            Config::resolve(Some(SECRETS), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_key, "sk-env");
        assert_eq!(config.access_key, "open-sesame");
        assert_eq!(config.openai.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_missing_access_key_fails() {
        let err = Config::resolve(Some(r#"OPENAI_API_KEY = "sk""#), no_env).unwrap_err();
        assert!(matches!(err, Error::MissingSecret(ref s) if s == "security.access_key"));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let toml = "OPENAI_API_KEY = \"  \"\n[security]\naccess_key = \"k\"\n";
        let err = Config::resolve(Some(toml), no_env).unwrap_err();
        assert!(matches!(err, Error::MissingSecret(ref s) if s == API_KEY_ENV));
    }

    #[test]
    fn test_no_sources_fails() {
        assert!(Config::resolve(None, no_env).is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::resolve(Some("[security"), no_env).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_openai_section() {
        let toml = format!("{SECRETS}\n[openai]\ntimeout_secs = 30\n");
        let config = Config::resolve(Some(&toml), no_env).unwrap();
        assert_eq!(config.openai.timeout_secs, 30);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::resolve(Some(SECRETS), no_env).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("open-sesame"));
        assert!(!debug.contains("sk-file"));
    }

    #[test]
    fn test_load_missing_file_uses_environment_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded = Config::load(&path);
        let from_env = Config::resolve(None, |name| std::env::var(name).ok());

        assert_eq!(format!("{loaded:?}"), format!("{from_env:?}"));
        assert!(!matches!(loaded, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_load_rejects_unreadable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "[security\naccess_key = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
