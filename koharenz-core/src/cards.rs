//! System cards: the canonical definitions of the narrative agents.
//!
//! A copy ships inside the crate; deployments can point at their own file.

use crate::schema::{AgentDef, ProtocolConfig, SchemaError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

pub const AEGIS_ID: &str = "aegis_agent_v1";
pub const KAEL_ID: &str = "kael_agent_v1";
pub const JUNA_ID: &str = "juna_v_stub";

const BUNDLED_CARDS: &str = include_str!("../data/system_cards.json");

/// Errors from loading system cards.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid system card: {0}")]
    Invalid(#[from] SchemaError),

    #[error("{0} system card not found")]
    MissingAgent(String),

    #[error("Bundled system cards are invalid: {0}")]
    Bundled(String),
}

/// A parsed system card document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCards {
    #[serde(default = "default_version")]
    pub version: String,
    pub agents: Vec<AgentDef>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

static BUNDLED: LazyLock<Result<SystemCards, String>> =
    LazyLock::new(|| SystemCards::parse(BUNDLED_CARDS).map_err(|e| e.to_string()));

impl SystemCards {
    /// Parse and validate a system card document.
    pub fn parse(json: &str) -> Result<Self, CardError> {
        let cards: SystemCards = serde_json::from_str(json)?;
        cards.to_protocol_config().validate()?;
        Ok(cards)
    }

    /// The cards compiled into this crate.
    pub fn bundled() -> Result<Self, CardError> {
        BUNDLED
            .as_ref()
            .map(Clone::clone)
            .map_err(|e| CardError::Bundled(e.clone()))
    }

    /// Load cards from `path`, or the bundled copy when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, CardError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| CardError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "loading system cards");
                Self::parse(&content)
            }
            None => Self::bundled(),
        }
    }

    /// Find an agent by id.
    pub fn agent(&self, id: &str) -> Result<&AgentDef, CardError> {
        self.agents
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| CardError::MissingAgent(id.to_string()))
    }

    /// Wrap the cards in a default protocol configuration.
    pub fn to_protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig::new(self.version.clone(), self.agents.clone())
    }
}
