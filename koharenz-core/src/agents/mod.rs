//! The three narrative agents of the protocol.
//!
//! Each agent is deterministic apart from the random source handed to it, so
//! a seeded `StdRng` reproduces a run exactly.

pub mod aegis;
pub mod juna;
pub mod kael;

pub use aegis::{AegisAgent, AegisState};
pub use juna::{GenesisTarget, JunaAgent, JunaState, KoanContext};
pub use kael::{AlterProfile, IntegrationReport, KaelAgent, KaelState, VoiceMode, ALTERS};
