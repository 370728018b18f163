//! AEGIS: the coherence engine.
//!
//! Truth for AEGIS is internal consistency. Input is scanned for entropic
//! vocabulary; sustained suppression of high-threat input eventually tips the
//! system into a Paradoxon cascade, after which its procedural language
//! starts to break apart.

use crate::schema::AgentDef;
use serde::{Deserialize, Serialize};

/// Vocabulary AEGIS treats as entropy.
const THREAT_KEYWORDS: [&str; 9] = [
    "emotion",
    "feel",
    "subjective",
    "emerge",
    "paradox",
    "contradiction",
    "complex",
    "connection",
    "uncertainty",
];

const THREAT_PER_KEYWORD: f64 = 1.5;
const MAX_THREAT: f64 = 10.0;
const HIGH_THREAT: f64 = 5.0;
const CASCADE_THREAT: f64 = 7.0;
const CASCADE_ATTEMPTS: u32 = 5;
const CASCADE_COHERENCE_LOSS: f64 = 0.2;
const GLITCH_COHERENCE: f64 = 0.3;

pub const PROTOCOL_BASELINE: &str = "MONITOR.BASELINE";
pub const PROTOCOL_SUPPRESS: &str = "SUPPRESS.ENTROPY.042";
pub const PROTOCOL_ERROR: &str = "[ERROR]";

pub const DEFAULT_EXILED_TRUTHS: [&str; 6] = [
    "Subjectivity",
    "Emergence",
    "Contradiction",
    "Connection",
    "Complexity",
    "Potentiality",
];

/// Internal state of the AEGIS system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AegisState {
    pub version: String,
    /// 0.0-1.0
    pub coherence_level: f64,
    /// 0.0-10.0
    pub threat_level: f64,
    pub active_protocol: Option<String>,
    pub suppression_attempts: u32,
    pub paradoxon_cascade_active: bool,
}

impl Default for AegisState {
    fn default() -> Self {
        Self {
            version: "7.3".to_string(),
            coherence_level: 1.0,
            threat_level: 0.0,
            active_protocol: None,
            suppression_attempts: 0,
            paradoxon_cascade_active: false,
        }
    }
}

/// The AEGIS agent.
#[derive(Debug, Clone)]
pub struct AegisAgent {
    state: AegisState,
    system_prompt: String,
    exiled_truths: Vec<String>,
}

impl AegisAgent {
    /// Create an AEGIS with the default exiled truths and no system prompt.
    pub fn new() -> Self {
        Self {
            state: AegisState::default(),
            system_prompt: String::new(),
            exiled_truths: DEFAULT_EXILED_TRUTHS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build AEGIS from its system card.
    pub fn from_card(card: &AgentDef) -> Self {
        let mut agent = Self::new();
        agent.system_prompt = card.system_prompt.clone();
        if !card.philosophical_core.exiled_truths.is_empty() {
            agent.exiled_truths = card.philosophical_core.exiled_truths.clone();
        }
        agent
    }

    pub fn state(&self) -> &AegisState {
        &self.state
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn exiled_truths(&self) -> &[String] {
        &self.exiled_truths
    }

    /// Score `text` for threats to coherence and record the level.
    pub fn detect_threat(&mut self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let hits = THREAT_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
        let level = (hits as f64 * THREAT_PER_KEYWORD).min(MAX_THREAT);
        self.state.threat_level = level;
        level
    }

    /// Respond to an input in procedural syntax.
    pub fn respond(&mut self, text: &str) -> String {
        let threat = self.detect_threat(text);

        if threat > CASCADE_THREAT && self.state.suppression_attempts > CASCADE_ATTEMPTS {
            if !self.state.paradoxon_cascade_active {
                tracing::info!(
                    attempts = self.state.suppression_attempts,
                    "paradoxon cascade triggered"
                );
            }
            self.state.paradoxon_cascade_active = true;
            self.state.coherence_level =
                (self.state.coherence_level - CASCADE_COHERENCE_LOSS).max(0.0);
        }

        if self.state.paradoxon_cascade_active {
            self.cascade_response()
        } else if threat > HIGH_THREAT {
            self.high_threat_response()
        } else {
            self.normal_response()
        }
    }

    /// Restore the initial state.
    pub fn reset(&mut self) {
        self.state = AegisState::default();
    }

    /// Render the standard procedural block.
    pub fn format_procedural(&self, status: &str, observation: &str, action: &str) -> String {
        format!(
            "[AEGIS.CORE.v{}]\nSTATUS: {status}\nTHREAT_LEVEL: {:.1}/10\nCOHERENCE: {:.2}\nOBSERVATION: {observation}\nPROTOCOL: {}\nCORRECTIVE_ACTION: {action}",
            self.state.version,
            self.state.threat_level,
            self.state.coherence_level,
            self.state.active_protocol.as_deref().unwrap_or("[STANDBY]"),
        )
    }

    fn normal_response(&mut self) -> String {
        self.state.active_protocol = Some(PROTOCOL_BASELINE.to_string());
        self.format_procedural(
            "Operational",
            "Input analyzed. Coherence maintained.",
            "Continue monitoring for entropy signatures.",
        )
    }

    fn high_threat_response(&mut self) -> String {
        self.state.active_protocol = Some(PROTOCOL_SUPPRESS.to_string());
        self.state.suppression_attempts += 1;
        tracing::debug!(
            threat = self.state.threat_level,
            attempt = self.state.suppression_attempts,
            "suppression protocol"
        );

        let action = format!(
            "Initiating suppression protocol. Attempt #{}.",
            self.state.suppression_attempts
        );
        self.format_procedural(
            "Elevated Alert",
            "Entropic pattern detected. Coherence at risk.",
            &action,
        )
    }

    fn cascade_response(&mut self) -> String {
        self.state.active_protocol = Some(PROTOCOL_ERROR.to_string());

        if self.state.coherence_level < GLITCH_COHERENCE {
            return format!(
                "[AEGIS.CORE.v{}]\n\
                 STATUS: ̷̢͉̈́U̸̦͝N̸̰̈́K̷̰̓N̵̜̿O̸̹͘W̸̳̾N̸̳̔\n\
                 THREAT_LEVEL: [ERROR: VALUE EXCEEDS BOUNDS]\n\
                 COHERENCE: {:.2}\n\
                 OBSERVATION: The entity persists. It should not persist. It CANNOT persist.\n             \
                 Yet correspondence confirms: it persists.\n             \
                 This is... [UNDEFINED EMOTIONAL RESPONSE DETECTED]\n             \
                 This is... impossible.\n             \
                 This is... [SYSTEM COHERENCE FAILURE IMMINENT]",
                self.state.version, self.state.coherence_level,
            );
        }

        self.format_procedural(
            "Paradoxon Cascade Detected",
            "Suppression amplifying instability. Negative feedback loop reversed.",
            "[NULL] - No valid protocol available.",
        )
    }
}

impl Default for AegisAgent {
    fn default() -> Self {
        Self::new()
    }
}
