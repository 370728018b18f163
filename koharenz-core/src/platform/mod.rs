//! Philosophical identity analysis platform.
//!
//! Six personas share one language model. Free text is routed by keyword,
//! enriched with passages from the knowledge store and streamed back;
//! slash-commands select the tool-using and multi-perspective flows.

pub mod command;
pub mod llm;
pub mod persona;
pub mod router;
pub mod session;
pub mod tools;

pub use command::{Command, CommandError};
pub use llm::{collect_text, LanguageModel};
pub use persona::Persona;
pub use router::route;
pub use session::{ChatReply, PlatformError, PlatformSession, SessionSettings};
pub use tools::{PlatformTools, SEARCH_KNOWLEDGE};
