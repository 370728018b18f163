//! Template-driven scene generation.
//!
//! Fragments are produced by the deterministic agents rather than an LLM, so
//! a seeded request always yields the same scene.

use crate::agents::{AegisAgent, JunaAgent, KaelAgent};
use crate::analyzer::{self, KoharenzAnalyzer};
use crate::cards::{CardError, SystemCards, AEGIS_ID, JUNA_ID, KAEL_ID};
use crate::schema::{
    GenerationMetadata, GenerationRequest, GenerationResponse, Kernwelt, ProtocolConfig,
    SceneFragment, SceneSpec, SchemaError,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

pub const TEMPLATE_MODEL: &str = "deterministic_template";

const JUNA_SILENCE: &str = "[Juna/V remains silent. Her absence is palpable.]";
const INTEGRATION_SCORE_MARKERS: [&str; 5] = ["together", "we", "system", "harmonious", "whole"];

/// Errors from scene generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    Invalid(#[from] SchemaError),

    #[error("System cards: {0}")]
    Cards(#[from] CardError),

    #[error("Scene {0} has no participating agents")]
    NoAgents(String),
}

/// Generator for protocol-compliant narrative fragments.
///
/// AEGIS and Juna/V persist across scenes; Kael is rebuilt for each scene's
/// act.
pub struct SceneGenerator {
    aegis: AegisAgent,
    juna: JunaAgent,
    kael_prompt: String,
    config: ProtocolConfig,
    analyzer: KoharenzAnalyzer,
}

impl SceneGenerator {
    /// Create a generator whose agents come from `cards`.
    pub fn new(cards: &SystemCards) -> Result<Self, GenerationError> {
        let config = cards.to_protocol_config();
        Ok(Self {
            aegis: AegisAgent::from_card(cards.agent(AEGIS_ID)?),
            juna: JunaAgent::from_card(cards.agent(JUNA_ID)?),
            kael_prompt: cards.agent(KAEL_ID)?.system_prompt.clone(),
            analyzer: KoharenzAnalyzer::from_config(&config),
            config,
        })
    }

    /// Use a different protocol configuration (thresholds, Gödel checks).
    pub fn with_config(mut self, config: ProtocolConfig) -> Self {
        self.analyzer = KoharenzAnalyzer::from_config(&config);
        self.config = config;
        self
    }

    pub fn aegis(&self) -> &AegisAgent {
        &self.aegis
    }

    pub fn juna(&self) -> &JunaAgent {
        &self.juna
    }

    /// Generate fragments for a scene.
    pub fn generate_scene(
        &mut self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        request.validate()?;
        let spec = &request.scene_spec;
        if spec.participating_agents.is_empty() {
            return Err(GenerationError::NoAgents(spec.scene_id.clone()));
        }

        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut kael = KaelAgent::new(spec.act, None)
            .with_system_prompt(self.kael_prompt.clone())
            .with_integration_threshold(self.config.metaphysical_constants.phi_integration_threshold);
        for event in &spec.riss_events {
            kael.record_riss(event);
        }

        let fragments = (0..request.num_fragments as usize)
            .map(|i| self.generate_fragment(spec, i, &mut kael, &mut rng))
            .collect::<Vec<_>>();

        let now = Utc::now();
        tracing::info!(
            scene = %spec.scene_id,
            act = spec.act,
            fragments = fragments.len(),
            "scene generated"
        );

        Ok(GenerationResponse {
            request_id: format!("gen_{}", now.format("%Y%m%d%H%M%S")),
            scene_id: spec.scene_id.clone(),
            fragments,
            metadata: GenerationMetadata {
                timestamp: now,
                model: TEMPLATE_MODEL.to_string(),
                temperature: request.temperature,
                seed: request.seed,
            },
            ontology_report: None,
        })
    }

    /// Generate fragments and attach an ontology report.
    pub fn generate_and_analyze(
        &mut self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let mut response = self.generate_scene(request)?;
        response.ontology_report = Some(
            self.analyzer
                .analyze_scene(&request.scene_spec, &response.fragments),
        );
        Ok(response)
    }

    fn generate_fragment(
        &mut self,
        spec: &SceneSpec,
        index: usize,
        kael: &mut KaelAgent,
        rng: &mut StdRng,
    ) -> SceneFragment {
        let agent_id = spec.participating_agents[index % spec.participating_agents.len()].to_lowercase();

        let (speaker, content, secondary_speakers) = if agent_id.contains("kael") {
            let beat = spec
                .narrative_beats
                .choose(rng)
                .map(String::as_str)
                .unwrap_or("What is happening to me?");
            let content = kael.respond(beat, rng);
            let secondary = analyzer::mentioned_alters(&content);
            ("Kael", content, secondary)
        } else if agent_id.contains("aegis") {
            let register = spec.emotional_register.to_lowercase();
            let input = if register.contains("threat") {
                "Entropic anomaly detected."
            } else if register.contains("stable") {
                "System status nominal."
            } else {
                "Monitoring for coherence disruption."
            };
            ("AEGIS", self.aegis.respond(input), Vec::new())
        } else if agent_id.contains("juna") {
            let input = if spec.narrative_beats.is_empty() {
                "Integration moment".to_string()
            } else {
                spec.narrative_beats.join(" ")
            };
            let content = self
                .juna
                .respond(&input, None, rng)
                .unwrap_or_else(|| JUNA_SILENCE.to_string());
            ("Juna/V", content, Vec::new())
        } else {
            tracing::warn!(agent = %agent_id, "unknown agent in scene");
            ("Unknown", "[Unknown agent content]".to_string(), Vec::new())
        };

        SceneFragment {
            fragment_id: format!("{}_frag_{index:03}", spec.scene_id),
            scene_id: spec.scene_id.clone(),
            speaker: speaker.to_string(),
            secondary_speakers,
            voice_markers: analyzer::voice_markers(&content),
            coherence_score: coherence_score(&content, spec.kernwelt),
            integration_score: integration_score(&content, spec.act),
            content,
        }
    }
}

/// K₁ coherence of a fragment.
pub fn coherence_score(content: &str, kernwelt: Kernwelt) -> f64 {
    let mut score = 0.5;
    match kernwelt {
        Kernwelt::KW1 => score += 0.2,
        Kernwelt::KW2 => score -= 0.1,
        _ => {}
    }
    if analyzer::has_procedural_syntax(content) {
        score += 0.3;
    }
    if content.matches('[').count() > 3 {
        score -= 0.2;
    }
    f64::clamp(score, 0.0, 1.0)
}

/// Φ integration of a fragment.
pub fn integration_score(content: &str, act: u8) -> f64 {
    let lower = content.to_lowercase();
    let markers = INTEGRATION_SCORE_MARKERS
        .iter()
        .filter(|m| lower.contains(*m))
        .count();
    (analyzer::phi_base(act) + markers as f64 * 0.05).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RissEvent, RissType};

    fn generator() -> SceneGenerator {
        SceneGenerator::new(&SystemCards::bundled().unwrap()).unwrap()
    }

    fn coffee_shop() -> SceneSpec {
        SceneSpec::new("act1_scene3", "First Riss: The Coffee Shop Incident", Kernwelt::KW2, 1)
            .with_agents(["kael_agent_v1"])
            .with_emotional_register("quiet dread, creeping dissociation")
            .with_beats([
                "Kael orders coffee",
                "Barista's tone triggers abandonment memory",
                "Kiko activates, Kael tries to suppress",
            ])
            .with_riss_event(RissEvent::new("riss_001", RissType::Temporal, "Kiko", 0.42))
    }

    #[test]
    fn test_generates_requested_fragments() {
        let request = GenerationRequest::new(coffee_shop()).with_seed(42);
        let response = generator().generate_scene(&request).unwrap();

        assert_eq!(response.fragments.len(), 3);
        assert_eq!(response.fragments[0].fragment_id, "act1_scene3_frag_000");
        assert_eq!(response.fragments[2].fragment_id, "act1_scene3_frag_002");
        assert_eq!(response.metadata.model, TEMPLATE_MODEL);
        assert_eq!(response.metadata.seed, Some(42));
        assert!(response.request_id.starts_with("gen_"));
        assert!(response.ontology_report.is_none());

        for fragment in &response.fragments {
            assert_eq!(fragment.speaker, "Kael");
            assert!(fragment.content.starts_with("I— "));
            assert_eq!(fragment.validate(), Ok(()));
        }
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let request = GenerationRequest::new(coffee_shop()).with_seed(7);
        let a = generator().generate_scene(&request).unwrap();
        let b = generator().generate_scene(&request).unwrap();
        let contents = |r: &GenerationResponse| {
            r.fragments.iter().map(|f| f.content.clone()).collect::<Vec<_>>()
        };
        assert_eq!(contents(&a), contents(&b));
    }

    #[test]
    fn test_agents_rotate() {
        let spec = coffee_shop()
            .with_agents(["kael_agent_v1", "aegis_agent_v1", "juna_v_stub", "narrator_x"])
            .with_emotional_register("stable");
        let request = GenerationRequest::new(spec).with_num_fragments(4).with_seed(1);
        let response = generator().generate_scene(&request).unwrap();

        let speakers: Vec<&str> = response.fragments.iter().map(|f| f.speaker.as_str()).collect();
        assert_eq!(speakers, ["Kael", "AEGIS", "Juna/V", "Unknown"]);
        assert!(response.fragments[1].content.contains("STATUS: Operational"));
        assert_eq!(response.fragments[3].content, "[Unknown agent content]");
    }

    #[test]
    fn test_riss_events_activate_alters() {
        let request = GenerationRequest::new(coffee_shop())
            .with_num_fragments(1)
            .with_seed(3);
        let response = generator().generate_scene(&request).unwrap();
        // Kiko is raised to 0.42 by the scene's Riss and so joins the top four.
        assert!(response.fragments[0].secondary_speakers.contains(&"Kiko".to_string()));
    }

    #[test]
    fn test_invalid_request_rejected() {
        let request = GenerationRequest::new(coffee_shop()).with_num_fragments(25);
        assert!(matches!(
            generator().generate_scene(&request),
            Err(GenerationError::Invalid(_))
        ));

        let empty = SceneSpec::new("empty", "Empty", Kernwelt::KW2, 1);
        assert!(matches!(
            generator().generate_scene(&GenerationRequest::new(empty)),
            Err(GenerationError::NoAgents(_))
        ));
    }

    #[test]
    fn test_generate_and_analyze() {
        let request = GenerationRequest::new(coffee_shop()).with_seed(42);
        let response = generator().generate_and_analyze(&request).unwrap();
        let report = response.ontology_report.unwrap();
        assert_eq!(report.scene_id, "act1_scene3");
        assert!((report.riss_progression_index - 0.42).abs() < 1e-9);
        assert_eq!(report.validate(), Ok(()));
    }

    #[test]
    fn test_coherence_score() {
        assert!((coherence_score("plain", Kernwelt::KW1) - 0.7).abs() < 1e-9);
        assert!((coherence_score("plain", Kernwelt::KW2) - 0.4).abs() < 1e-9);
        assert!((coherence_score("[AEGIS.CORE] STATUS:", Kernwelt::KW1) - 1.0).abs() < 1e-9);
        assert!((coherence_score("[a][b][c][d]", Kernwelt::KW3) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_integration_score() {
        assert!((integration_score("alone", 1) - 0.1).abs() < 1e-9);
        // together, we, system
        assert!((integration_score("We are a system, together.", 3) - 0.55).abs() < 1e-9);
        assert_eq!(integration_score("together we system harmonious whole", 5), 1.0);
    }
}
