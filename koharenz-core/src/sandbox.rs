//! Multi-agent sandbox: Kael, AEGIS and Juna/V in conversation.

use crate::agents::{AegisAgent, JunaAgent, KaelAgent};
use crate::cards::{CardError, SystemCards, AEGIS_ID, JUNA_ID, KAEL_ID};
use crate::schema::{KernelState, MetaphysicalConstants};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_ACT: u8 = 3;
pub const DEFAULT_TURNS: u32 = 5;
pub const DEFAULT_TOPIC: &str = "What is the nature of truth?";

const RULE_WIDTH: usize = 70;
const SUMMARY_FALLBACK_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("System cards: {0}")]
    Cards(#[from] CardError),

    #[error("Act must be between 1 and 5, got {0}")]
    InvalidAct(u8),

    #[error("Failed to write transcript {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub turn: u32,
    pub speaker: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// What happened in a single turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn: u32,
    pub kael: String,
    pub aegis: String,
    pub juna: Option<String>,
    /// Context handed to the next turn.
    pub next_context: String,
}

/// Snapshot of the session's agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxMetrics {
    pub act: u8,
    pub turns: u32,
    pub kael_integration: f64,
    pub aegis_coherence: f64,
    pub aegis_threat_level: f64,
    pub paradoxon_active: bool,
    pub juna_appearances: u32,
    pub kernel_state: KernelState,
    pub bruchpunkt_reached: bool,
}

pub struct SandboxSession {
    act: u8,
    kael: KaelAgent,
    aegis: AegisAgent,
    juna: JunaAgent,
    constants: MetaphysicalConstants,
    rng: StdRng,
    turns: u32,
    transcript: Vec<TranscriptEntry>,
}

impl SandboxSession {
    /// Start a session for `act`. A seed makes Kael's fragments and Juna/V's
    /// interjections reproducible.
    pub fn new(act: u8, seed: Option<u64>, cards: &SystemCards) -> Result<Self, SandboxError> {
        if !(1..=5).contains(&act) {
            return Err(SandboxError::InvalidAct(act));
        }
        let constants = cards.to_protocol_config().metaphysical_constants;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            act,
            kael: KaelAgent::from_card(cards.agent(KAEL_ID)?, act)
                .with_integration_threshold(constants.phi_integration_threshold),
            aegis: AegisAgent::from_card(cards.agent(AEGIS_ID)?),
            juna: JunaAgent::from_card(cards.agent(JUNA_ID)?),
            constants,
            rng,
            turns: 0,
            transcript: Vec::new(),
        })
    }

    /// Override Kael's starting Φ.
    pub fn with_integration_level(mut self, phi: f64) -> Self {
        self.kael = KaelAgent::new(self.act, Some(phi.clamp(0.0, 1.0)))
            .with_system_prompt(self.kael.system_prompt().to_string())
            .with_integration_threshold(self.constants.phi_integration_threshold);
        self
    }

    pub fn with_constants(mut self, constants: MetaphysicalConstants) -> Self {
        self.constants = constants;
        self
    }

    pub fn act(&self) -> u8 {
        self.act
    }

    pub fn kael(&self) -> &KaelAgent {
        &self.kael
    }

    pub fn aegis(&self) -> &AegisAgent {
        &self.aegis
    }

    pub fn juna(&self) -> &JunaAgent {
        &self.juna
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Run one turn on `context`.
    pub fn run_turn(&mut self, context: &str) -> TurnOutcome {
        self.turns += 1;
        let turn = self.turns;

        let kael = self.kael.respond(context, &mut self.rng);
        self.log(turn, "Kael", &kael);

        let aegis = self.aegis.respond(&kael);
        self.log(turn, "AEGIS", &aegis);

        let juna = self.juna.respond(context, Some(context), &mut self.rng);
        if let Some(koan) = &juna {
            self.log(turn, "Juna/V", koan);
        }

        tracing::debug!(
            turn,
            threat = self.aegis.state().threat_level,
            juna = juna.is_some(),
            "sandbox turn"
        );

        TurnOutcome {
            turn,
            next_context: summarize_turn(&kael, &aegis),
            kael,
            aegis,
            juna,
        }
    }

    /// Run `turns` turns starting from `topic`.
    pub fn run_dialogue(&mut self, topic: &str, turns: u32) -> Vec<TurnOutcome> {
        tracing::info!(act = self.act, turns, topic, "sandbox dialogue");
        let mut context = topic.to_string();
        let mut outcomes = Vec::with_capacity(turns as usize);
        for _ in 0..turns {
            let outcome = self.run_turn(&context);
            context = outcome.next_context.clone();
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn kernel_state(&self) -> KernelState {
        let aegis = self.aegis.state();
        let k0_entropy = (aegis.threat_level / 10.0).clamp(0.0, 1.0);
        KernelState {
            k1_coherence: aegis.coherence_level,
            k0_entropy,
            overhead_cost: aegis.suppression_attempts as f64 * 0.1,
            corrective_wavelets_active: aegis.suppression_attempts,
            system_stability: (aegis.coherence_level * (1.0 - k0_entropy)).clamp(0.0, 1.0),
        }
    }

    pub fn metrics(&self) -> SandboxMetrics {
        let kael_integration = self.kael.integration_level();
        SandboxMetrics {
            act: self.act,
            turns: self.turns,
            kael_integration,
            aegis_coherence: self.aegis.state().coherence_level,
            aegis_threat_level: self.aegis.state().threat_level,
            paradoxon_active: self.aegis.state().paradoxon_cascade_active,
            juna_appearances: self.juna.appearances(),
            kernel_state: self.kernel_state(),
            bruchpunkt_reached: kael_integration >= self.constants.bruchpunkt_threshold,
        }
    }

    /// Render the plain-text transcript.
    pub fn render_transcript(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = format!(
            "KOHÄRENZ PROTOCOL SANDBOX TRANSCRIPT\nAct: {}\nGenerated: {}\n{rule}\n\n",
            self.act,
            Utc::now().to_rfc3339()
        );
        for entry in &self.transcript {
            out.push_str(&format!(
                "--- Turn {} - {} ---\n{}\n\n",
                entry.turn, entry.speaker, entry.content
            ));
        }
        out.push_str(&format!("{rule}\nEND TRANSCRIPT\n"));
        out
    }

    pub async fn save_transcript(&self, path: impl AsRef<Path>) -> Result<(), SandboxError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SandboxError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, self.render_transcript())
            .await
            .map_err(|source| SandboxError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), entries = self.transcript.len(), "transcript saved");
        Ok(())
    }

    fn log(&mut self, turn: u32, speaker: &str, content: &str) {
        self.transcript.push(TranscriptEntry {
            turn,
            speaker: speaker.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Condense a turn into the context for the next one.
pub fn summarize_turn(kael: &str, aegis: &str) -> String {
    let kael_last = if kael.contains('.') {
        let parts: Vec<&str> = kael.split('.').collect();
        parts[parts.len() - 2].to_string()
    } else {
        kael.chars().take(SUMMARY_FALLBACK_CHARS).collect()
    };
    let aegis_last = match aegis.rsplit_once('\n') {
        Some((_, last)) => last.to_string(),
        None => aegis.chars().take(SUMMARY_FALLBACK_CHARS).collect(),
    };
    format!("Kael expressed: {kael_last}. AEGIS responded with: {aegis_last}")
}
