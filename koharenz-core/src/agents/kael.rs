//! Kael: the polyphonic protagonist.
//!
//! Kael is a system of nine alters. Trigger words in the input raise the
//! activation of specific alters, and the most activated ones get a voice.
//! How they speak depends on the system's integration level (Φ):
//! - Fragmented (acts 1-2): interrupted, overlapping fragments
//! - Polyphonic (act 3): an organised inner dialogue
//! - Integrated (acts 4-5): a single shared "we"

use crate::schema::{AgentDef, RissEvent};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Φ at or above which the system speaks polyphonically.
pub const POLYPHONIC_THRESHOLD: f64 = 0.4;
/// Default Φ at or above which the system speaks as one.
pub const DEFAULT_INTEGRATION_THRESHOLD: f64 = 0.7;

/// Voice evolution stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceMode {
    Fragmented,
    Polyphonic,
    Integrated,
}

impl VoiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceMode::Fragmented => "fragmented",
            VoiceMode::Polyphonic => "polyphonic",
            VoiceMode::Integrated => "integrated",
        }
    }
}

impl fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static voice profile of one alter.
#[derive(Debug, Clone, Copy)]
pub struct AlterProfile {
    pub name: &'static str,
    pub style: &'static str,
    pub markers: &'static [&'static str],
    pub initial_activation: f64,
}

/// The nine alters in canonical order.
pub const ALTERS: [AlterProfile; 9] = [
    AlterProfile {
        name: "Kael",
        style: "measured, introspective",
        markers: &["I", "we"],
        initial_activation: 0.6,
    },
    AlterProfile {
        name: "Lex",
        style: "clinical, analytical",
        markers: &["data", "observe", "calculate"],
        initial_activation: 0.3,
    },
    AlterProfile {
        name: "Alex",
        style: "diplomatic, mediating",
        markers: &["perhaps", "consider", "we should"],
        initial_activation: 0.2,
    },
    AlterProfile {
        name: "Rhys",
        style: "sharp, protective",
        markers: &["THREAT", "No.", "Stop."],
        initial_activation: 0.1,
    },
    AlterProfile {
        name: "Nyx",
        style: "nihilistic, void-adjacent",
        markers: &["nothing", "void", "darkness"],
        initial_activation: 0.1,
    },
    AlterProfile {
        name: "Kiko",
        style: "childlike, frightened",
        markers: &["scared", "don't", "please"],
        initial_activation: 0.1,
    },
    AlterProfile {
        name: "Lia",
        style: "gentle, caretaking",
        markers: &["it's okay", "safe", "together"],
        initial_activation: 0.2,
    },
    AlterProfile {
        name: "Moros",
        style: "detached, philosophical",
        markers: &["cease", "surrender", "end"],
        initial_activation: 0.05,
    },
    AlterProfile {
        name: "Selene",
        style: "cryptic, integrative",
        markers: &["paradox", "both/and", "whole"],
        initial_activation: 0.05,
    },
];

/// Trigger keyword, alter, activation.
const TRIGGERS: [(&str, &str, f64); 7] = [
    ("abandon", "Kiko", 0.8),
    ("threat", "Rhys", 0.9),
    ("analysis", "Lex", 0.6),
    ("social", "Alex", 0.5),
    ("darkness", "Nyx", 0.7),
    ("death", "Moros", 0.6),
    ("integration", "Selene", 0.4),
];

const CONFLICT_PER_TRIGGER: f64 = 0.1;

/// Look up an alter's profile by name.
pub fn alter_profile(name: &str) -> Option<&'static AlterProfile> {
    ALTERS.iter().find(|a| a.name == name)
}

/// Default Φ and voice mode for an act.
pub fn act_defaults(act: u8) -> (f64, VoiceMode) {
    match act {
        0..=2 => (0.1 + f64::from(act.saturating_sub(1)) * 0.1, VoiceMode::Fragmented),
        3 => (0.4, VoiceMode::Polyphonic),
        _ => (0.7 + f64::from(act - 4) * 0.1, VoiceMode::Integrated),
    }
}

/// Activation of one alter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterState {
    pub name: String,
    pub activation_level: f64,
}

/// Overall state of Kael's system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KaelState {
    pub act: u8,
    /// Φ estimate.
    pub integration_level: f64,
    pub voice_mode: VoiceMode,
    /// Alters in canonical order.
    pub alters: Vec<AlterState>,
    pub riss_events: u32,
    pub internal_conflict_level: f64,
}

/// Snapshot of Kael's integration progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub act: u8,
    pub integration_level: f64,
    pub voice_mode: VoiceMode,
    pub internal_conflict: f64,
    pub riss_events: u32,
    /// Alters with activation above 0.1.
    pub active_alters: BTreeMap<String, f64>,
}

/// The Kael agent.
#[derive(Debug, Clone)]
pub struct KaelAgent {
    state: KaelState,
    system_prompt: String,
    integration_threshold: f64,
}

impl KaelAgent {
    /// Create Kael for an act. An explicit Φ overrides the act default.
    pub fn new(act: u8, integration_level: Option<f64>) -> Self {
        let (default_phi, voice_mode) = act_defaults(act);
        let alters = ALTERS
            .iter()
            .map(|a| AlterState {
                name: a.name.to_string(),
                activation_level: a.initial_activation,
            })
            .collect();

        Self {
            state: KaelState {
                act,
                integration_level: integration_level.unwrap_or(default_phi),
                voice_mode,
                alters,
                riss_events: 0,
                internal_conflict_level: 0.5,
            },
            system_prompt: String::new(),
            integration_threshold: DEFAULT_INTEGRATION_THRESHOLD,
        }
    }

    /// Create Kael for an act, taking the system prompt from its card.
    pub fn from_card(card: &AgentDef, act: u8) -> Self {
        Self::new(act, None).with_system_prompt(card.system_prompt.clone())
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Φ at which `progress_integration` switches to the integrated voice.
    pub fn with_integration_threshold(mut self, threshold: f64) -> Self {
        self.integration_threshold = threshold;
        self
    }

    pub fn state(&self) -> &KaelState {
        &self.state
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn integration_level(&self) -> f64 {
        self.state.integration_level
    }

    pub fn voice_mode(&self) -> VoiceMode {
        self.state.voice_mode
    }

    /// Set an alter's activation. Returns false for unknown alters.
    pub fn activate_alter(&mut self, name: &str, intensity: f64) -> bool {
        match self.state.alters.iter_mut().find(|a| a.name == name) {
            Some(alter) => {
                alter.activation_level = intensity.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Respond to an input in the current voice mode.
    pub fn respond<R: Rng>(&mut self, input: &str, rng: &mut R) -> String {
        self.detect_triggers(input);

        match self.state.voice_mode {
            VoiceMode::Fragmented => self.fragmented_response(rng),
            VoiceMode::Polyphonic => self.polyphonic_response(),
            VoiceMode::Integrated => self.integrated_response(),
        }
    }

    fn detect_triggers(&mut self, input: &str) {
        let lower = input.to_lowercase();
        for (keyword, alter, intensity) in TRIGGERS {
            if lower.contains(keyword) {
                self.activate_alter(alter, intensity);
                self.state.internal_conflict_level =
                    (self.state.internal_conflict_level + CONFLICT_PER_TRIGGER).min(1.0);
                tracing::trace!(keyword, alter, "alter triggered");
            }
        }
    }

    /// The `n` most activated alters. Ties keep canonical order.
    pub fn select_active_alters(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<&AlterState> = self.state.alters.iter().collect();
        ranked.sort_by(|a, b| b.activation_level.total_cmp(&a.activation_level));
        ranked.into_iter().take(n).map(|a| a.name.clone()).collect()
    }

    fn fragmented_response<R: Rng>(&self, rng: &mut R) -> String {
        let fragments: Vec<String> = self
            .select_active_alters(4)
            .iter()
            .map(|name| {
                let marker = alter_profile(name)
                    .and_then(|p| p.markers.choose(&mut *rng).copied())
                    .unwrap_or(name.as_str());
                match name.as_str() {
                    "Kiko" => format!("[Kiko, whimpering: {marker} {marker} {marker}]"),
                    "Rhys" => format!("[Rhys: {}]", marker.to_uppercase()),
                    "Lex" => format!("— Lex interjects: \"{marker}. Analysis required.\" —"),
                    _ => format!("[{name}: {marker}...]"),
                }
            })
            .collect();

        format!("I— {} —but I can't... we can't...", fragments.join(" "))
    }

    /// Only Kael, Lex, Alex, Kiko and Lia take part in the organised
    /// dialogue; other active alters stay silent.
    fn polyphonic_response(&self) -> String {
        self.select_active_alters(3)
            .iter()
            .filter_map(|name| {
                let style = alter_profile(name)?.style;
                let line = match name.as_str() {
                    "Kael" => "[Kael: I want to understand what's happening.]".to_string(),
                    "Lex" => format!(
                        "— Lex, {style}: \"Understanding requires data. We lack reliable memory.\" —"
                    ),
                    "Alex" => format!(
                        "[Alex, {style}: \"But we can piece it together. Look at the fragments.\"]"
                    ),
                    "Kiko" => "[Kiko, quieter now: \"It hurts to look.\"]".to_string(),
                    "Lia" => "[Lia: \"Then we look together.\"]".to_string(),
                    _ => return None,
                };
                Some(line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn integrated_response(&self) -> String {
        format!(
            "We stand at the threshold. Kael sees the pattern; Lex calculates its geometry;\n\
             Kiko feels the old fear but doesn't flee; Rhys stands ready but calm. Together, we are\n\
             neither one nor many. We are a system that has learned to breathe.\n\
             \n\
             [Φ = {:.2}]",
            self.state.integration_level
        )
    }

    /// Raise Φ by `delta` (capped at 1) and update the voice mode.
    pub fn progress_integration(&mut self, delta: f64) {
        self.state.integration_level = (self.state.integration_level + delta).min(1.0);

        let before = self.state.voice_mode;
        if self.state.integration_level >= self.integration_threshold {
            self.state.voice_mode = VoiceMode::Integrated;
        } else if self.state.integration_level >= POLYPHONIC_THRESHOLD {
            self.state.voice_mode = VoiceMode::Polyphonic;
        }
        if before != self.state.voice_mode {
            tracing::info!(
                phi = self.state.integration_level,
                from = %before,
                to = %self.state.voice_mode,
                "voice mode changed"
            );
        }
    }

    /// Record a Riss event: count it and activate the responsible alter.
    pub fn record_riss(&mut self, event: &RissEvent) {
        self.state.riss_events += 1;
        if !self.activate_alter(&event.activated_alter, event.coherence_cost) {
            tracing::warn!(alter = %event.activated_alter, riss = %event.riss_id, "riss names unknown alter");
        }
    }

    pub fn integration_report(&self) -> IntegrationReport {
        IntegrationReport {
            act: self.state.act,
            integration_level: self.state.integration_level,
            voice_mode: self.state.voice_mode,
            internal_conflict: self.state.internal_conflict_level,
            riss_events: self.state.riss_events,
            active_alters: self
                .state
                .alters
                .iter()
                .filter(|a| a.activation_level > 0.1)
                .map(|a| (a.name.clone(), a.activation_level))
                .collect(),
        }
    }
}
