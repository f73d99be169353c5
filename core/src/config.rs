use crate::client::{CompletionSettings, DEFAULT_COMPLETION_ENDPOINT};
use crate::errors::{ConfigError, ConfigResult};
use crate::types::DEFAULT_MODEL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const APP_NAME: &str = "linegpt";
pub const DEFAULT_WEBHOOK_PATH: &str = "/ChatGPT";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Environment variables recognised as overrides.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_SYSTEM_PROMPT: &str = "ROLE_PROMPT";
pub const ENV_HISTORY_LIMIT: &str = "RECENT_CHATS_LIMIT";
pub const ENV_CHANNEL_SECRET: &str = "CHANNEL_SECRET";
pub const ENV_CHANNEL_TOKEN: &str = "CHANNEL_TOKEN";

/// Raw history limit as written in the config file or environment.
///
/// Kept loose so that a bad value never prevents the file from loading.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum HistoryLimitSetting {
    Number(i64),
    Text(String),
}

/// How many prior records to pull into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryLimit {
    #[default]
    Unbounded,
    Recent(usize),
}

impl HistoryLimit {
    /// Absent, unparseable, zero or negative values all mean unbounded.
    pub fn from_setting(setting: Option<&HistoryLimitSetting>) -> Self {
        let value = match setting {
            None => return Self::Unbounded,
            Some(HistoryLimitSetting::Number(n)) => *n,
            Some(HistoryLimitSetting::Text(raw)) => match raw.trim().parse::<i64>() {
                Ok(n) => n,
                Err(e) => {
                    warn!(value = %raw, error = %e, "Invalid history limit, using unbounded history");
                    return Self::Unbounded;
                }
            },
        };

        match usize::try_from(value) {
            Ok(0) | Err(_) => Self::Unbounded,
            Ok(n) => Self::Recent(n),
        }
    }

    pub fn max_records(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Recent(n) => Some(*n),
        }
    }
}

/// Configuration file / environment layer for the relay
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub history_limit: Option<HistoryLimitSetting>,
    pub model_name: Option<String>,
    pub completion_endpoint: Option<String>,
    pub channel_secret: Option<String>,
    pub channel_access_token: Option<String>,
    pub database_path: Option<PathBuf>,
    pub webhook_path: Option<String>,
}

/// Validated, immutable configuration used for the life of the process.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_key: String,
    pub system_prompt: String,
    pub history_limit: HistoryLimit,
    pub completion: CompletionSettings,
    pub channel_secret: String,
    pub channel_access_token: String,
    pub database_path: Option<PathBuf>,
    pub webhook_path: String,
}

impl RelayConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads the default config file, if any, then applies process environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_from_file(&get_default_config_file()?)?,
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = get(ENV_SYSTEM_PROMPT) {
            self.system_prompt = Some(v);
        }
        if let Some(v) = get(ENV_HISTORY_LIMIT) {
            self.history_limit = Some(HistoryLimitSetting::Text(v));
        }
        if let Some(v) = get(ENV_CHANNEL_SECRET) {
            self.channel_secret = Some(v);
        }
        if let Some(v) = get(ENV_CHANNEL_TOKEN) {
            self.channel_access_token = Some(v);
        }
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            history_limit: other
                .history_limit
                .clone()
                .or_else(|| self.history_limit.clone()),
            model_name: other.model_name.clone().or_else(|| self.model_name.clone()),
            completion_endpoint: other
                .completion_endpoint
                .clone()
                .or_else(|| self.completion_endpoint.clone()),
            channel_secret: other
                .channel_secret
                .clone()
                .or_else(|| self.channel_secret.clone()),
            channel_access_token: other
                .channel_access_token
                .clone()
                .or_else(|| self.channel_access_token.clone()),
            database_path: other
                .database_path
                .clone()
                .or_else(|| self.database_path.clone()),
            webhook_path: other
                .webhook_path
                .clone()
                .or_else(|| self.webhook_path.clone()),
        }
    }

    /// Checks required secrets and the webhook path, and fills in defaults.
    ///
    /// A bad history limit is never an error here.
    pub fn validate(self) -> ConfigResult<ResolvedConfig> {
        let api_key = require(self.api_key, "api_key")?;
        let channel_secret = require(self.channel_secret, "channel_secret")?;
        let channel_access_token = require(self.channel_access_token, "channel_access_token")?;
        let webhook_path = self
            .webhook_path
            .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string());
        if !webhook_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "webhook_path",
                reason: format!("{:?} must start with '/'", webhook_path),
            });
        }

        Ok(ResolvedConfig {
            api_key,
            system_prompt: self
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            history_limit: HistoryLimit::from_setting(self.history_limit.as_ref()),
            completion: CompletionSettings {
                endpoint: self
                    .completion_endpoint
                    .unwrap_or_else(|| DEFAULT_COMPLETION_ENDPOINT.to_string()),
                model: self.model_name.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
            channel_secret,
            channel_access_token,
            database_path: self.database_path,
            webhook_path,
        })
    }
}

fn require(value: Option<String>, name: &'static str) -> ConfigResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Helper function to get default config directory
pub fn get_default_config_dir() -> ConfigResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_dir.join(".config").join(APP_NAME))
}

/// Helper function to get default config file path
pub fn get_default_config_file() -> ConfigResult<PathBuf> {
    Ok(get_default_config_dir()?.join("config.toml"))
}

/// Default location of the history database
pub fn get_default_database_path() -> ConfigResult<PathBuf> {
    Ok(get_default_config_dir()?.join("history.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete_config() -> RelayConfig {
        RelayConfig {
            api_key: Some("sk-test".to_string()),
            channel_secret: Some("secret".to_string()),
            channel_access_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_history_limit_parsing() {
        let text = |s: &str| HistoryLimitSetting::Text(s.to_string());

        assert_eq!(HistoryLimit::from_setting(None), HistoryLimit::Unbounded);
        assert_eq!(
            HistoryLimit::from_setting(Some(&HistoryLimitSetting::Number(2))),
            HistoryLimit::Recent(2)
        );
        assert_eq!(HistoryLimit::from_setting(Some(&text(" 10 "))), HistoryLimit::Recent(10));
        assert_eq!(HistoryLimit::from_setting(Some(&text("abc"))), HistoryLimit::Unbounded);
        assert_eq!(HistoryLimit::from_setting(Some(&text("0"))), HistoryLimit::Unbounded);
        assert_eq!(
            HistoryLimit::from_setting(Some(&HistoryLimitSetting::Number(-3))),
            HistoryLimit::Unbounded
        );
    }

    #[test]
    fn test_load_from_file_accepts_number_and_string_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "api_key = \"sk\"\nhistory_limit = 5\n").unwrap();
        let config = RelayConfig::load_from_file(&path).unwrap();
        assert_eq!(config.history_limit, Some(HistoryLimitSetting::Number(5)));

        fs::write(&path, "history_limit = \"abc\"\n").unwrap();
        let config = RelayConfig::load_from_file(&path).unwrap();
        assert_eq!(
            HistoryLimit::from_setting(config.history_limit.as_ref()),
            HistoryLimit::Unbounded
        );
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = [").unwrap();
        assert!(matches!(
            RelayConfig::load_from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, "sk-env"),
            (ENV_SYSTEM_PROMPT, "Be brief."),
            (ENV_HISTORY_LIMIT, "abc"),
            (ENV_CHANNEL_SECRET, ""),
        ]);
        let mut config = complete_config();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
        // Empty values do not clobber file settings.
        assert_eq!(config.channel_secret.as_deref(), Some("secret"));

        let resolved = config.validate().unwrap();
        assert_eq!(resolved.history_limit, HistoryLimit::Unbounded);
    }

    #[test]
    fn test_validate_requires_secrets() {
        let mut config = complete_config();
        config.api_key = None;
        assert!(matches!(config.validate(), Err(ConfigError::Missing("api_key"))));

        let mut config = complete_config();
        config.channel_access_token = Some("  ".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("channel_access_token"))
        ));
    }

    #[test]
    fn test_validate_rejects_relative_webhook_path() {
        let mut config = complete_config();
        config.webhook_path = Some("ChatGPT".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "webhook_path", .. })
        ));

        let mut config = complete_config();
        config.webhook_path = Some("/hooks/line".to_string());
        assert_eq!(config.validate().unwrap().webhook_path, "/hooks/line");
    }

    #[test]
    fn test_validate_fills_defaults() {
        let resolved = complete_config().validate().unwrap();
        assert_eq!(resolved.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(resolved.completion.model, DEFAULT_MODEL);
        assert_eq!(resolved.completion.endpoint, DEFAULT_COMPLETION_ENDPOINT);
        assert_eq!(resolved.webhook_path, DEFAULT_WEBHOOK_PATH);
        assert_eq!(resolved.history_limit, HistoryLimit::Unbounded);
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = complete_config();
        let other = RelayConfig {
            api_key: Some("sk-other".to_string()),
            history_limit: Some(HistoryLimitSetting::Number(3)),
            ..Default::default()
        };
        let merged = base.merge(&other);
        assert_eq!(merged.api_key.as_deref(), Some("sk-other"));
        assert_eq!(merged.channel_secret.as_deref(), Some("secret"));
        assert_eq!(merged.history_limit, Some(HistoryLimitSetting::Number(3)));
    }
}
