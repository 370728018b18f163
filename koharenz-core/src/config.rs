//! Platform configuration.
//!
//! Built-in defaults are overlaid by an optional TOML file (`koharenz.toml`
//! in the working directory, or an explicit path) and then by `KOHARENZ_*`
//! environment variables.

use crate::locale::Language;
use crate::platform::SessionSettings;
use crate::sandbox::{DEFAULT_ACT, DEFAULT_TOPIC, DEFAULT_TURNS};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "koharenz.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub retrieval_top_k: usize,
    pub history_limit: usize,
    pub max_tool_rounds: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let settings = SessionSettings::default();
        Self {
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            retrieval_top_k: settings.retrieval_top_k,
            history_limit: settings.history_limit,
            max_tool_rounds: settings.max_tool_rounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub act: u8,
    pub turns: u32,
    pub topic: String,
    pub transcript_dir: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            act: DEFAULT_ACT,
            turns: DEFAULT_TURNS,
            topic: DEFAULT_TOPIC.to_string(),
            transcript_dir: PathBuf::from("demo_sessions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub language: Language,
    /// Model name; the client default when unset.
    pub model: Option<String>,
    pub log_level: String,
    /// Directory with `system_cards.json`, `knowledge.json` and `locales/`.
    /// Bundled data is used for anything missing.
    pub data_dir: Option<PathBuf>,
    pub chat: ChatConfig,
    pub sandbox: SandboxConfig,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            model: None,
            log_level: "info".to_string(),
            data_dir: None,
            chat: ChatConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

/// Values taken from `KOHARENZ_*` variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub model: Option<String>,
    pub language: Option<String>,
    pub log_level: Option<String>,
    pub data_dir: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            model: var("KOHARENZ_MODEL"),
            language: var("KOHARENZ_LANG"),
            log_level: var("KOHARENZ_LOG_LEVEL"),
            data_dir: var("KOHARENZ_DATA_DIR"),
        }
    }
}

impl PlatformConfig {
    /// Load from `path`, or `koharenz.toml` when present, then apply the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let path = path.or_else(|| default_path.exists().then_some(default_path));
        Self::load_with(path, &EnvOverrides::from_env())
    }

    /// Load with explicit overrides instead of reading the environment.
    pub fn load_with(path: Option<&Path>, overrides: &EnvOverrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file over the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn apply(&mut self, overrides: &EnvOverrides) -> Result<(), ConfigError> {
        if let Some(model) = &overrides.model {
            self.model = Some(model.clone());
        }
        if let Some(language) = &overrides.language {
            self.language = language
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("KOHARENZ_LANG: {e}")))?;
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
        if let Some(dir) = &overrides.data_dir {
            self.data_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=5).contains(&self.sandbox.act) {
            return Err(ConfigError::Invalid(format!(
                "sandbox.act must be 1-5, got {}",
                self.sandbox.act
            )));
        }
        if self.chat.max_tokens == 0 {
            return Err(ConfigError::Invalid("chat.max_tokens must be positive".into()));
        }
        if let Some(t) = self.chat.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::Invalid(format!(
                    "chat.temperature must be 0.0-1.0, got {t}"
                )));
            }
        }
        crate::logging::parse_level(&self.log_level)
            .map_err(|e| ConfigError::Invalid(format!("log_level: {e}")))?;
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.model.clone(),
            max_tokens: self.chat.max_tokens,
            temperature: self.chat.temperature,
            retrieval_top_k: self.chat.retrieval_top_k,
            history_limit: self.chat.history_limit,
            max_tool_rounds: self.chat.max_tool_rounds,
            locale_dir: self.locale_dir(),
        }
    }

    pub fn locale_dir(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("locales"))
    }

    /// `system_cards.json` in the data directory, if it exists.
    pub fn cards_path(&self) -> Option<PathBuf> {
        self.existing_data_file("system_cards.json")
    }

    /// `knowledge.json` in the data directory, if it exists.
    pub fn knowledge_path(&self) -> Option<PathBuf> {
        self.existing_data_file("knowledge.json")
    }

    fn existing_data_file(&self, name: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .filter(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::load_with(None, &EnvOverrides::default()).unwrap();
        assert_eq!(config, PlatformConfig::default());
        assert_eq!(config.language, Language::En);
        assert_eq!(config.sandbox.act, 3);
        assert_eq!(config.sandbox.topic, "What is the nature of truth?");
        assert_eq!(config.chat.max_tool_rounds, 4);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = PlatformConfig::from_toml_str(
            r#"
            language = "de"

            [chat]
            retrieval_top_k = 5

            [sandbox]
            turns = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.language, Language::De);
        assert_eq!(config.chat.retrieval_top_k, 5);
        assert_eq!(config.chat.max_tokens, ChatConfig::default().max_tokens);
        assert_eq!(config.sandbox.turns, 8);
        assert_eq!(config.sandbox.act, 3);
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("koharenz.toml");
        std::fs::write(&path, "model = \"from-file\"\nlog_level = \"warn\"\n").unwrap();

        let overrides = EnvOverrides {
            model: Some("from-env".into()),
            language: Some("DE".into()),
            data_dir: Some("/srv/koharenz".into()),
            ..Default::default()
        };
        let config = PlatformConfig::load_with(Some(&path), &overrides).unwrap();
        assert_eq!(config.model.as_deref(), Some("from-env"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.language, Language::De);
        assert_eq!(config.locale_dir(), Some(PathBuf::from("/srv/koharenz/locales")));
    }

    #[test]
    fn test_errors() {
        let missing = PlatformConfig::load_with(
            Some(Path::new("/nonexistent/koharenz.toml")),
            &EnvOverrides::default(),
        );
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "language = [").unwrap();
        assert!(matches!(
            PlatformConfig::load_with(Some(&path), &EnvOverrides::default()),
            Err(ConfigError::Parse { .. })
        ));

        let bad_lang = EnvOverrides {
            language: Some("fr".into()),
            ..Default::default()
        };
        assert!(matches!(
            PlatformConfig::load_with(None, &bad_lang),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = PlatformConfig::default();
        config.sandbox.act = 7;
        assert!(config.validate().is_err());

        let mut config = PlatformConfig::default();
        config.log_level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = PlatformConfig::default();
        config.chat.temperature = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_settings() {
        let config = PlatformConfig {
            model: Some("claude-test".into()),
            data_dir: Some(PathBuf::from("data")),
            ..Default::default()
        };
        let settings = config.session_settings();
        assert_eq!(settings.model.as_deref(), Some("claude-test"));
        assert_eq!(settings.locale_dir, Some(PathBuf::from("data/locales")));
        assert_eq!(settings.max_tool_rounds, 4);
    }
}
