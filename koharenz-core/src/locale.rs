//! JSON key→string translations for English and German.
//!
//! Lookups fall back from the current language to English and finally to a
//! `[key]` placeholder, so a missing translation never fails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const BUNDLED_EN: &str = include_str!("../data/locales/en.json");
const BUNDLED_DE: &str = include_str!("../data/locales/de.json");

#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("Unknown language '{0}' (expected en or de)")]
    UnknownLanguage(String),

    #[error("Failed to read locale file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid locale file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::De];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::De => "Deutsch",
        }
    }

    fn bundled(&self) -> &'static str {
        match self {
            Language::En => BUNDLED_EN,
            Language::De => BUNDLED_DE,
        }
    }
}

impl FromStr for Language {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "de" | "deutsch" | "german" => Ok(Language::De),
            _ => Err(LocaleError::UnknownLanguage(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

type Strings = HashMap<String, String>;

/// Translations for one language plus the English fallback.
#[derive(Debug, Clone)]
pub struct Locale {
    language: Language,
    strings: Strings,
    fallback: Strings,
}

impl Locale {
    /// Load `{dir}/{code}.json`. A missing file falls back to the default
    /// language's file, then to the bundled translations.
    pub fn load(dir: Option<&Path>, language: Language) -> Result<Self, LocaleError> {
        let fallback = load_strings(dir, Language::default())?;
        let strings = if language == Language::default() {
            fallback.clone()
        } else {
            match dir {
                Some(dir) => read_file(&dir.join(format!("{}.json", language.code())))?
                    .unwrap_or_else(|| {
                        tracing::warn!(lang = %language, dir = %dir.display(), "locale file missing, using default language");
                        fallback.clone()
                    }),
                None => parse(language.bundled(), Path::new("<bundled>"))?,
            }
        };

        Ok(Self {
            language,
            strings,
            fallback,
        })
    }

    /// Bundled translations only.
    pub fn bundled(language: Language) -> Result<Self, LocaleError> {
        Self::load(None, language)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Translate `key`.
    pub fn t(&self, key: &str) -> String {
        self.strings
            .get(key)
            .or_else(|| self.fallback.get(key))
            .cloned()
            .unwrap_or_else(|| format!("[{key}]"))
    }

    /// Translate `key`, replacing `{name}` placeholders from `args`.
    ///
    /// Substitution is a single pass, so braces inside a value are kept
    /// as they are. Unknown placeholders stay in the text.
    pub fn t_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        let template = self.t(key);
        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let Some(close) = tail.find('}') else {
                break;
            };
            let name = &tail[1..close];
            match args.iter().find(|(n, _)| *n == name) {
                Some((_, value)) => out.push_str(value),
                None => out.push_str(&tail[..=close]),
            }
            rest = &tail[close + 1..];
        }
        // `rest` begins at an unmatched `{` if the loop broke early
        out.push_str(rest);
        out
    }
}

/// Default-language strings from `dir`, or the bundled ones.
fn load_strings(dir: Option<&Path>, language: Language) -> Result<Strings, LocaleError> {
    if let Some(dir) = dir {
        if let Some(strings) = read_file(&dir.join(format!("{}.json", language.code())))? {
            return Ok(strings);
        }
    }
    parse(language.bundled(), Path::new("<bundled>"))
}

/// `None` when the file does not exist.
fn read_file(path: &Path) -> Result<Option<Strings>, LocaleError> {
    match std::fs::read_to_string(path) {
        Ok(json) => parse(&json, path).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LocaleError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse(json: &str, path: &Path) -> Result<Strings, LocaleError> {
    serde_json::from_str(json).map_err(|source| LocaleError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
