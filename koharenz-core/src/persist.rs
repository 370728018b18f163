//! Session persistence for save/load and export.
//!
//! Sessions are stored as pretty-printed JSON with a version header so that
//! old files are rejected instead of half-loaded.

use crate::locale::Language;
use crate::platform::Persona;
use crate::schema::OntologyReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    /// The persona that answered; `None` for user turns.
    pub persona: Option<Persona>,
    pub language: Language,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>, language: Language) -> Self {
        Self {
            role: TurnRole::User,
            persona: None,
            language,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(persona: Persona, content: impl Into<String>, language: Language) -> Self {
        Self {
            role: TurnRole::Assistant,
            persona: Some(persona),
            language,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One persona's reading of an analysed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub persona: Persona,
    pub content: String,
}

/// A completed multi-perspective analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub input: String,
    pub report: OntologyReport,
    pub perspectives: Vec<Perspective>,
    pub synthesis: String,
    pub language: Language,
    pub timestamp: DateTime<Utc>,
}

/// Metadata about the save file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub language: Language,
    pub started_at: DateTime<Utc>,
    pub turns: usize,
    pub analyses: usize,
    #[serde(default)]
    pub model: Option<String>,
}

/// A saved platform session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
    pub conversation: Vec<ConversationTurn>,
    pub analyses: Vec<AnalysisRecord>,
}

impl SavedSession {
    pub fn new(
        metadata: SessionMetadata,
        conversation: Vec<ConversationTurn>,
        analyses: Vec<AnalysisRecord>,
    ) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: Utc::now(),
            metadata,
            conversation,
            analyses,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save to a JSON file, creating parent directories.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, self.to_json()?).await?;
        tracing::info!(path = %path.display(), turns = self.conversation.len(), "session saved");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Read only the metadata of a save file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SessionMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SessionMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }
        Ok(partial.metadata)
    }

    /// Render the session as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# Kohärenz session {}\n\n- Language: {}\n- Started: {}\n- Saved: {}\n",
            self.metadata.session_id,
            self.metadata.language.name(),
            self.metadata.started_at.to_rfc3339(),
            self.saved_at.to_rfc3339(),
        );

        if !self.conversation.is_empty() {
            out.push_str("\n## Conversation\n");
            for turn in &self.conversation {
                let speaker = match turn.persona {
                    Some(persona) => persona.display_name(turn.language),
                    None => "You",
                };
                out.push_str(&format!("\n### {speaker}\n\n{}\n", turn.content.trim()));
            }
        }

        for (i, analysis) in self.analyses.iter().enumerate() {
            let report = &analysis.report;
            out.push_str(&format!(
                "\n## Analysis {}\n\n> {}\n\n\
                 | Metric | Value |\n|---|---|\n\
                 | Contradiction density | {:.2} |\n\
                 | Alter balance | {:.2} |\n\
                 | Integration trajectory | {:.2} |\n\
                 | Φ estimate | {:.2} |\n",
                i + 1,
                analysis.input.trim().replace('\n', "\n> "),
                report.contradiction_density,
                report.alter_balance_score,
                report.integration_trajectory,
                report.phi_estimate,
            ));
            for perspective in &analysis.perspectives {
                out.push_str(&format!(
                    "\n### {}\n\n{}\n",
                    perspective.persona.display_name(analysis.language),
                    perspective.content.trim()
                ));
            }
            out.push_str(&format!("\n### Synthesis\n\n{}\n", analysis.synthesis.trim()));
        }

        out
    }
}
