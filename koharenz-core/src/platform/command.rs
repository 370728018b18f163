//! Slash-command parsing for the chat REPL.

use crate::locale::{Language, LocaleError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command '/{0}'")]
    Unknown(String),

    #[error("Usage: {usage}")]
    MissingArgument {
        command: &'static str,
        usage: &'static str,
    },

    #[error(transparent)]
    Language(#[from] LocaleError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Lang(Language),
    Learn(String),
    Research(String),
    Analyze(String),
    Clear,
    /// `None` exports to the default file name.
    Export(Option<PathBuf>),
    Help,
    Quit,
    /// Free text.
    Prompt(String),
}

impl Command {
    /// Parse one input line. Lines not starting with `/` are prompts.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Prompt(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let required = |command: &'static str, usage: &'static str| {
            if arg.is_empty() {
                Err(CommandError::MissingArgument { command, usage })
            } else {
                Ok(arg.to_string())
            }
        };

        match name.to_lowercase().as_str() {
            "lang" => {
                let code = required("lang", "/lang <en|de>")?;
                Ok(Command::Lang(code.parse()?))
            }
            "learn" => required("learn", "/learn <topic>").map(Command::Learn),
            "research" => required("research", "/research <query>").map(Command::Research),
            "analyze" | "analyse" => required("analyze", "/analyze <text>").map(Command::Analyze),
            "clear" => Ok(Command::Clear),
            "export" => Ok(Command::Export(
                (!arg.is_empty()).then(|| PathBuf::from(arg)),
            )),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_command() {
        assert_eq!(Command::parse("/lang de").unwrap(), Command::Lang(Language::De));
        assert_eq!(Command::parse("/LANG EN").unwrap(), Command::Lang(Language::En));
        assert_eq!(
            Command::parse("/learn coherence theory").unwrap(),
            Command::Learn("coherence theory".into())
        );
        assert_eq!(
            Command::parse("/research  Gödel ").unwrap(),
            Command::Research("Gödel".into())
        );
        assert_eq!(
            Command::parse("/analyze I am many.").unwrap(),
            Command::Analyze("I am many.".into())
        );
        assert_eq!(Command::parse("/clear").unwrap(), Command::Clear);
        assert_eq!(Command::parse("/export").unwrap(), Command::Export(None));
        assert_eq!(
            Command::parse("/export out/session.json").unwrap(),
            Command::Export(Some(PathBuf::from("out/session.json")))
        );
        assert_eq!(Command::parse("/help").unwrap(), Command::Help);
        assert_eq!(Command::parse("/quit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_free_text_is_prompt() {
        assert_eq!(
            Command::parse("  What is truth?  ").unwrap(),
            Command::Prompt("What is truth?".into())
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        let err = Command::parse("/dance now").unwrap_err();
        assert!(matches!(&err, CommandError::Unknown(name) if name == "dance"));
        assert_eq!(err.to_string(), "Unknown command '/dance'");
    }

    #[test]
    fn test_missing_argument() {
        for line in ["/learn", "/research   ", "/analyze", "/lang"] {
            assert!(
                matches!(Command::parse(line), Err(CommandError::MissingArgument { .. })),
                "{line} should need an argument"
            );
        }
        assert_eq!(
            Command::parse("/learn").unwrap_err().to_string(),
            "Usage: /learn <topic>"
        );
    }

    #[test]
    fn test_bad_language() {
        assert!(matches!(
            Command::parse("/lang fr"),
            Err(CommandError::Language(LocaleError::UnknownLanguage(_)))
        ));
    }

    #[test]
    fn test_help_lists_every_command() {
        for language in Language::ALL {
            let help = crate::locale::Locale::bundled(language).unwrap().t("cmd.help");
            for name in ["/lang", "/learn", "/research", "/analyze", "/clear", "/export", "/help", "/quit"] {
                assert!(help.contains(name), "{language} help is missing {name}");
            }
        }
    }
}
