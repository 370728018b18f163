//! Core data structures of the Kohärenz Protocol.
//!
//! Agents, scenes, Riss events, generated fragments and the ontology reports
//! produced by the analyzer. Every type round-trips through JSON; numeric
//! ranges are enforced by the `validate()` methods rather than at
//! deserialisation time so that callers get a field-specific error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Errors from schema validation.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Agent IDs must be unique (duplicate: {0})")]
    DuplicateAgentId(String),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), SchemaError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SchemaError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), SchemaError> {
    check_range(field, value, 0.0, 1.0)
}

// ============================================================================
// Enumerations
// ============================================================================

/// Theory of truth an agent operates under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruthTheory {
    /// Truth is internal consistency (AEGIS).
    Coherence,
    /// Truth is alignment with an external world (Juna/V).
    Correspondence,
    /// Contradictions may coexist (KW2).
    Paraconsistent,
}

/// Kernwelt ("core world") level, the logical ruleset a scene runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Kernwelt {
    /// Pre-collapse, undefined.
    KW0,
    /// Classical logic; non-contradiction enforced.
    KW1,
    /// Paraconsistent logic; contradictions permitted.
    #[default]
    KW2,
    /// Emergent integration (high-Φ states).
    KW3,
    /// Post-Bruchpunkt.
    KW4,
}

impl Kernwelt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kernwelt::KW0 => "KW0",
            Kernwelt::KW1 => "KW1",
            Kernwelt::KW2 => "KW2",
            Kernwelt::KW3 => "KW3",
            Kernwelt::KW4 => "KW4",
        }
    }

    /// Parse `KW0`..`KW4`, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KW0" => Some(Kernwelt::KW0),
            "KW1" => Some(Kernwelt::KW1),
            "KW2" => Some(Kernwelt::KW2),
            "KW3" => Some(Kernwelt::KW3),
            "KW4" => Some(Kernwelt::KW4),
            _ => None,
        }
    }
}

impl fmt::Display for Kernwelt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of reality fracture, keyed to the trauma response that causes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RissType {
    /// Fight response: objects flung, space warps.
    Kinetic,
    /// Freeze response: time loops and stutters.
    Temporal,
    /// Collapse response: sensory deprivation.
    SensoryVoid,
    /// Flight response: distance distortion.
    Spatial,
    /// System-level coherence failure.
    Ontological,
}

// ============================================================================
// Agents
// ============================================================================

/// A dissociative part within a multiplicity system such as Kael.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterDef {
    pub name: String,
    /// Functional role (host, protector, child part...).
    pub role: String,
    /// Primary action system (fight/flight/freeze/collapse/social).
    pub action_system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riss_type: Option<RissType>,
    pub voice_characteristics: String,
    /// 0 = dissociated, 10 = fully integrated.
    #[serde(default)]
    pub integration_stage: u8,
}

impl AlterDef {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::Empty("alter.name"));
        }
        check_range(
            "alter.integration_stage",
            f64::from(self.integration_stage),
            0.0,
            10.0,
        )
    }
}

/// Philosophical payload of a system card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhilosophicalCore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub central_thesis: Option<String>,
    /// Truths the agent refuses to acknowledge.
    #[serde(default)]
    pub exiled_truths: Vec<String>,
}

/// A narrative agent and its ontological properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDef {
    pub id: String,
    pub name: String,
    pub role: String,
    pub ontology_type: String,
    pub truth_theory: TruthTheory,
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alters: Option<Vec<AlterDef>>,
    /// Behavioural constraints keyed like `never` / `always`.
    #[serde(default)]
    pub constraints: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub response_preferences: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub philosophical_core: PhilosophicalCore,
}

impl AgentDef {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.id.trim().is_empty() {
            return Err(SchemaError::Empty("agent.id"));
        }
        for alter in self.alters.iter().flatten() {
            alter.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// Scenes
// ============================================================================

/// A reality fracture with causal linkage to an alter's activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RissEvent {
    pub riss_id: String,
    pub riss_type: RissType,
    pub trigger: String,
    /// Alter whose activation caused the fracture.
    pub activated_alter: String,
    pub internal_conflict: String,
    pub manifestation: String,
    /// K₁ degradation, 0 = none, 1 = total collapse.
    pub coherence_cost: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl RissEvent {
    pub fn new(
        riss_id: impl Into<String>,
        riss_type: RissType,
        activated_alter: impl Into<String>,
        coherence_cost: f64,
    ) -> Self {
        Self {
            riss_id: riss_id.into(),
            riss_type,
            trigger: String::new(),
            activated_alter: activated_alter.into(),
            internal_conflict: String::new(),
            manifestation: String::new(),
            coherence_cost,
            timestamp: Utc::now(),
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    pub fn with_internal_conflict(mut self, conflict: impl Into<String>) -> Self {
        self.internal_conflict = conflict.into();
        self
    }

    pub fn with_manifestation(mut self, manifestation: impl Into<String>) -> Self {
        self.manifestation = manifestation.into();
        self
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit("riss_event.coherence_cost", self.coherence_cost)
    }
}

/// Specification of a scene to generate or analyse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpec {
    pub scene_id: String,
    pub title: String,
    pub kernwelt: Kernwelt,
    /// Act number, 1..=5.
    pub act: u8,
    pub participating_agents: Vec<String>,
    /// Target tone, e.g. "luminous despair".
    pub emotional_register: String,
    pub narrative_beats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_contradiction_density: Option<f64>,
    #[serde(default)]
    pub riss_events: Vec<RissEvent>,
}

impl SceneSpec {
    pub fn new(
        scene_id: impl Into<String>,
        title: impl Into<String>,
        kernwelt: Kernwelt,
        act: u8,
    ) -> Self {
        Self {
            scene_id: scene_id.into(),
            title: title.into(),
            kernwelt,
            act,
            participating_agents: Vec::new(),
            emotional_register: String::new(),
            narrative_beats: Vec::new(),
            target_contradiction_density: None,
            riss_events: Vec::new(),
        }
    }

    pub fn with_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participating_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_emotional_register(mut self, register: impl Into<String>) -> Self {
        self.emotional_register = register.into();
        self
    }

    pub fn with_beats<I, S>(mut self, beats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.narrative_beats = beats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target_contradiction_density(mut self, density: f64) -> Self {
        self.target_contradiction_density = Some(density);
        self
    }

    pub fn with_riss_event(mut self, event: RissEvent) -> Self {
        self.riss_events.push(event);
        self
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.scene_id.trim().is_empty() {
            return Err(SchemaError::Empty("scene.scene_id"));
        }
        check_range("scene.act", f64::from(self.act), 1.0, 5.0)?;
        if let Some(density) = self.target_contradiction_density {
            check_unit("scene.target_contradiction_density", density)?;
        }
        for event in &self.riss_events {
            event.validate()?;
        }
        Ok(())
    }
}

/// A generated narrative fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFragment {
    pub fragment_id: String,
    pub scene_id: String,
    /// Primary speaker (an alter or an agent).
    pub speaker: String,
    #[serde(default)]
    pub secondary_speakers: Vec<String>,
    pub content: String,
    /// Marker kinds present in the content (brackets, em-dash...).
    #[serde(default)]
    pub voice_markers: Vec<String>,
    pub coherence_score: f64,
    pub integration_score: f64,
}

impl SceneFragment {
    /// A bare fragment with neutral scores, used for analysing free text.
    pub fn new(
        fragment_id: impl Into<String>,
        scene_id: impl Into<String>,
        speaker: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            fragment_id: fragment_id.into(),
            scene_id: scene_id.into(),
            speaker: speaker.into(),
            secondary_speakers: Vec::new(),
            content: content.into(),
            voice_markers: Vec::new(),
            coherence_score: 0.5,
            integration_score: 0.5,
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit("fragment.coherence_score", self.coherence_score)?;
        check_unit("fragment.integration_score", self.integration_score)
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Ontological consistency report for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyReport {
    pub report_id: String,
    pub scene_id: String,
    pub timestamp: DateTime<Utc>,
    pub contradiction_density: f64,
    /// Entropy of voice distribution, 0 = monopoly, 1 = balanced.
    pub alter_balance_score: f64,
    pub riss_progression_index: f64,
    pub integration_trajectory: f64,
    pub phi_estimate: f64,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub godel_vulnerabilities: Vec<String>,
}

impl OntologyReport {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit("report.contradiction_density", self.contradiction_density)?;
        check_unit("report.alter_balance_score", self.alter_balance_score)?;
        check_unit("report.riss_progression_index", self.riss_progression_index)?;
        check_unit("report.integration_trajectory", self.integration_trajectory)?;
        check_unit("report.phi_estimate", self.phi_estimate)
    }
}

/// The dual kernel (K₁ coherence / K₀ collapse) at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelState {
    pub k1_coherence: f64,
    pub k0_entropy: f64,
    /// Energy spent holding coherence against K₀.
    pub overhead_cost: f64,
    #[serde(default)]
    pub corrective_wavelets_active: u32,
    pub system_stability: f64,
}

impl KernelState {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit("kernel.k1_coherence", self.k1_coherence)?;
        check_unit("kernel.k0_entropy", self.k0_entropy)?;
        check_range("kernel.overhead_cost", self.overhead_cost, 0.0, f64::MAX)?;
        check_unit("kernel.system_stability", self.system_stability)
    }
}

// ============================================================================
// Configuration and generation
// ============================================================================

/// Tunable constants of the protocol's "physics".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaphysicalConstants {
    pub k1_base_strength: f64,
    pub k0_base_pressure: f64,
    pub phi_integration_threshold: f64,
    pub bruchpunkt_threshold: f64,
}

impl Default for MetaphysicalConstants {
    fn default() -> Self {
        Self {
            k1_base_strength: 0.6,
            k0_base_pressure: 0.4,
            phi_integration_threshold: 0.7,
            bruchpunkt_threshold: 0.85,
        }
    }
}

/// Complete configuration of a protocol deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub version: String,
    pub agents: Vec<AgentDef>,
    #[serde(default)]
    pub default_kernwelt: Kernwelt,
    #[serde(default = "default_true")]
    pub enable_riss_generation: bool,
    #[serde(default = "default_true")]
    pub enable_godel_checks: bool,
    #[serde(default)]
    pub metaphysical_constants: MetaphysicalConstants,
}

fn default_true() -> bool {
    true
}

impl ProtocolConfig {
    pub fn new(version: impl Into<String>, agents: Vec<AgentDef>) -> Self {
        Self {
            version: version.into(),
            agents,
            default_kernwelt: Kernwelt::default(),
            enable_riss_generation: true,
            enable_godel_checks: true,
            metaphysical_constants: MetaphysicalConstants::default(),
        }
    }

    pub fn with_godel_checks(mut self, enabled: bool) -> Self {
        self.enable_godel_checks = enabled;
        self
    }

    pub fn with_constants(mut self, constants: MetaphysicalConstants) -> Self {
        self.metaphysical_constants = constants;
        self
    }

    /// Look up an agent by id.
    pub fn agent(&self, id: &str) -> Option<&AgentDef> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for agent in &self.agents {
            agent.validate()?;
            if !seen.insert(agent.id.as_str()) {
                return Err(SchemaError::DuplicateAgentId(agent.id.clone()));
            }
        }
        let c = &self.metaphysical_constants;
        check_unit("constants.k1_base_strength", c.k1_base_strength)?;
        check_unit("constants.k0_base_pressure", c.k0_base_pressure)?;
        check_unit(
            "constants.phi_integration_threshold",
            c.phi_integration_threshold,
        )?;
        check_unit("constants.bruchpunkt_threshold", c.bruchpunkt_threshold)
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::new("1.0.0", Vec::new())
    }
}

/// Request to generate fragments for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub scene_spec: SceneSpec,
    #[serde(default = "default_num_fragments")]
    pub num_fragments: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_num_fragments() -> u32 {
    3
}

fn default_temperature() -> f64 {
    0.8
}

impl GenerationRequest {
    pub fn new(scene_spec: SceneSpec) -> Self {
        Self {
            scene_spec,
            num_fragments: default_num_fragments(),
            temperature: default_temperature(),
            seed: None,
        }
    }

    pub fn with_num_fragments(mut self, n: u32) -> Self {
        self.num_fragments = n;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        self.scene_spec.validate()?;
        check_range(
            "request.num_fragments",
            f64::from(self.num_fragments),
            1.0,
            20.0,
        )?;
        check_range("request.temperature", self.temperature, 0.0, 2.0)
    }
}

/// How a response was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub temperature: f64,
    pub seed: Option<u64>,
}

/// Generated fragments plus an optional automatic analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub request_id: String,
    pub scene_id: String,
    pub fragments: Vec<SceneFragment>,
    pub metadata: GenerationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_report: Option<OntologyReport>,
}
