//! Kohärenz Protocol engine.
//!
//! This crate provides:
//! - The protocol schema and bundled system cards for AEGIS, Kael and Juna/V
//! - Deterministic narrative agents, a scene generator and a multi-agent sandbox
//! - Ontology analysis (contradiction density, alter balance, Φ)
//! - A philosophical identity analysis platform: persona routing, retrieval
//!   over a bilingual knowledge store, tool use and multi-perspective synthesis
//! - Session persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use koharenz_core::{Language, PlatformSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = claude::Claude::from_env()?;
//!     let mut session = PlatformSession::new(model, Language::En)?;
//!
//!     let reply = session
//!         .prompt("Is truth coherence or correspondence?", |t| print!("{t}"))
//!         .await?;
//!     println!("\n({})", reply.persona);
//!
//!     let analysis = session.analyze("I am one. We are many.").await?;
//!     println!("{}", analysis.synthesis);
//!
//!     session.export("session.md").await?;
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod analyzer;
pub mod cards;
pub mod config;
pub mod generator;
pub mod knowledge;
pub mod locale;
pub mod logging;
pub mod persist;
pub mod platform;
pub mod sandbox;
pub mod schema;
pub mod testing;

// Primary public API
pub use analyzer::KoharenzAnalyzer;
pub use cards::{CardError, SystemCards};
pub use config::{ConfigError, PlatformConfig};
pub use generator::{GenerationError, SceneGenerator};
pub use knowledge::{KnowledgeDocument, KnowledgeError, KnowledgeStore, MetadataFilter};
pub use locale::{Language, Locale, LocaleError};
pub use persist::{PersistError, SavedSession};
pub use platform::{
    ChatReply, Command, CommandError, LanguageModel, Persona, PlatformError, PlatformSession,
    SessionSettings,
};
pub use sandbox::{SandboxError, SandboxMetrics, SandboxSession};
pub use schema::{
    GenerationRequest, GenerationResponse, Kernwelt, OntologyReport, RissEvent, RissType,
    SceneFragment, SceneSpec,
};
pub use testing::{MockModel, MockReply, TestHarness};
