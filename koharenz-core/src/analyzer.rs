//! Ontology analysis of narrative fragments.
//!
//! All metrics are keyword heuristics over the fragment text. They are meant
//! to be read by a writer checking a scene against its Kernwelt and act, not
//! as measurements of anything.

use crate::cards::AEGIS_ID;
use crate::agents::kael::ALTERS;
use crate::schema::{Kernwelt, OntologyReport, ProtocolConfig, SceneFragment, SceneSpec};
use chrono::Utc;
use std::collections::HashMap;

const PARADOX_INDICATORS: [&str; 10] = [
    "but",
    "yet",
    "however",
    "although",
    "contradiction",
    "impossible",
    "cannot",
    "must not",
    "both",
    "neither",
];

const TRAJECTORY_MARKERS: [&str; 8] = [
    "together",
    "we are",
    "harmonious",
    "integrated",
    "cooperative",
    "unified",
    "whole",
    "system",
];

const POLYPHONIC_MARKERS: [&str; 4] = ["[", "]", ":", "—"];
const PHI_INTEGRATION_MARKERS: [&str; 3] = ["we", "together", "system"];

const GODEL_INDICATORS: [&str; 7] = [
    "cannot prove",
    "unprovable",
    "irresolvable",
    "paradox",
    "undefined",
    "impossible yet true",
    "exists but cannot",
];

/// Markers of AEGIS's procedural syntax.
pub const PROCEDURAL_MARKERS: [&str; 3] = ["[AEGIS", "STATUS:", "PROTOCOL:"];

const KW1_MAX_DENSITY: f64 = 0.1;
const KW2_MIN_DENSITY: f64 = 0.2;
const LATE_ACT_MIN_TRAJECTORY: f64 = 0.6;
const LOW_ALTER_BALANCE: f64 = 0.3;

fn trajectory_base(act: u8) -> f64 {
    match act {
        1 => 0.1,
        2 => 0.2,
        3 => 0.5,
        4 => 0.7,
        5 => 0.9,
        _ => 0.5,
    }
}

/// Φ baseline per act, shared with the generator's integration score.
pub fn phi_base(act: u8) -> f64 {
    match act {
        1 => 0.1,
        2 => 0.2,
        3 => 0.4,
        4 => 0.7,
        5 => 0.85,
        _ => 0.5,
    }
}

/// Marker kinds present in `content`.
pub fn voice_markers(content: &str) -> Vec<String> {
    let kinds: [(&str, &[&str]); 5] = [
        ("brackets", &["[", "]"]),
        ("em-dash", &["—"]),
        ("ellipsis", &["..."]),
        ("colon", &[":"]),
        ("quotes", &["\""]),
    ];
    kinds
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| content.contains(p)))
        .map(|(kind, _)| kind.to_string())
        .collect()
}

/// Names of non-host alters mentioned in `content`, in canonical order.
pub fn mentioned_alters(content: &str) -> Vec<String> {
    ALTERS
        .iter()
        .skip(1)
        .filter(|a| content.contains(a.name))
        .map(|a| a.name.to_string())
        .collect()
}

/// Whether `content` uses AEGIS's procedural syntax.
pub fn has_procedural_syntax(content: &str) -> bool {
    PROCEDURAL_MARKERS.iter().any(|m| content.contains(m))
}

/// Split free text into paragraph fragments for analysis.
///
/// A paragraph that opens with `Name:` or `[Name:` is attributed to `Name`;
/// anything else is attributed to the narrator.
pub fn fragments_from_text(scene_id: &str, text: &str) -> Vec<SceneFragment> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, paragraph)| {
            let speaker = infer_speaker(paragraph).unwrap_or("Narrator");
            let mut fragment = SceneFragment::new(
                format!("{scene_id}_para_{i:03}"),
                scene_id,
                speaker,
                paragraph,
            );
            fragment.secondary_speakers = mentioned_alters(paragraph)
                .into_iter()
                .filter(|name| name != speaker)
                .collect();
            fragment.voice_markers = voice_markers(paragraph);
            fragment
        })
        .collect()
}

fn infer_speaker(paragraph: &str) -> Option<&str> {
    let body = paragraph.strip_prefix('[').unwrap_or(paragraph);
    let end = body.find([':', ','])?;
    let name = body[..end].trim();
    let plausible = !name.is_empty()
        && name.chars().count() <= 24
        && name.split_whitespace().count() <= 2
        && name.chars().next().is_some_and(char::is_uppercase);
    plausible.then_some(name)
}

/// Analyzer for narrative consistency with the protocol rules.
#[derive(Debug, Clone)]
pub struct KoharenzAnalyzer {
    godel_checks: bool,
}

impl Default for KoharenzAnalyzer {
    fn default() -> Self {
        Self { godel_checks: true }
    }
}

impl KoharenzAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            godel_checks: config.enable_godel_checks,
        }
    }

    /// Analyze a complete scene.
    pub fn analyze_scene(&self, spec: &SceneSpec, fragments: &[SceneFragment]) -> OntologyReport {
        let now = Utc::now();
        let violations = self.detect_violations(spec, fragments);
        let suggestions = self.generate_suggestions(spec, fragments, &violations);
        let godel_vulnerabilities = if self.godel_checks {
            self.detect_godel_patterns(fragments)
        } else {
            Vec::new()
        };

        let report = OntologyReport {
            report_id: format!("report_{}_{}", spec.scene_id, now.format("%Y%m%d%H%M%S")),
            scene_id: spec.scene_id.clone(),
            timestamp: now,
            contradiction_density: self.contradiction_density(fragments),
            alter_balance_score: self.alter_balance(fragments),
            riss_progression_index: self.riss_progression(spec),
            integration_trajectory: self.integration_trajectory(fragments, spec.act),
            phi_estimate: self.estimate_phi(fragments, spec.act),
            violations,
            suggestions,
            godel_vulnerabilities,
        };
        tracing::debug!(
            scene = %spec.scene_id,
            fragments = fragments.len(),
            violations = report.violations.len(),
            "scene analyzed"
        );
        report
    }

    /// Share of sentences containing a paradox indicator.
    pub fn contradiction_density(&self, fragments: &[SceneFragment]) -> f64 {
        let mut total = 0usize;
        let mut contradictory = 0usize;

        for fragment in fragments {
            for sentence in fragment
                .content
                .split(['.', '!', '?'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                total += 1;
                let lower = sentence.to_lowercase();
                if PARADOX_INDICATORS.iter().any(|i| lower.contains(i)) {
                    contradictory += 1;
                }
            }
        }

        if total == 0 {
            return 0.0;
        }
        (contradictory as f64 / total as f64).min(1.0)
    }

    /// Normalised Shannon entropy over speakers. Secondary voices weigh half.
    pub fn alter_balance(&self, fragments: &[SceneFragment]) -> f64 {
        let mut counts: HashMap<&str, f64> = HashMap::new();
        for fragment in fragments {
            *counts.entry(fragment.speaker.as_str()).or_default() += 1.0;
            for secondary in &fragment.secondary_speakers {
                *counts.entry(secondary.as_str()).or_default() += 0.5;
            }
        }

        if counts.len() < 2 {
            return 0.0;
        }

        let total: f64 = counts.values().sum();
        let entropy: f64 = counts
            .values()
            .map(|c| c / total)
            .filter(|p| *p > 0.0)
            .map(|p| -p * p.log2())
            .sum();
        let max_entropy = (counts.len() as f64).log2();

        (entropy / max_entropy).min(1.0)
    }

    /// Mean coherence cost of the scene's Riss events.
    pub fn riss_progression(&self, spec: &SceneSpec) -> f64 {
        if spec.riss_events.is_empty() {
            return 0.0;
        }
        let total: f64 = spec.riss_events.iter().map(|r| r.coherence_cost).sum();
        (total / spec.riss_events.len() as f64).min(1.0)
    }

    /// Act baseline adjusted by the density of integration vocabulary.
    pub fn integration_trajectory(&self, fragments: &[SceneFragment], act: u8) -> f64 {
        let base = trajectory_base(act);
        let mut markers = 0usize;
        let mut words = 0usize;

        for fragment in fragments {
            let lower = fragment.content.to_lowercase();
            for word in lower.split_whitespace() {
                words += 1;
                if TRAJECTORY_MARKERS.iter().any(|m| word.contains(m)) {
                    markers += 1;
                }
            }
        }

        if words == 0 {
            return base;
        }
        (base + markers as f64 / words as f64 * 0.3).min(1.0)
    }

    /// Φ estimate from act baseline and marker counts.
    pub fn estimate_phi(&self, fragments: &[SceneFragment], act: u8) -> f64 {
        let mut phi = phi_base(act);
        let mut polyphonic = 0usize;
        let mut integration = 0usize;

        for fragment in fragments {
            let lower = fragment.content.to_lowercase();
            polyphonic += POLYPHONIC_MARKERS
                .iter()
                .map(|m| fragment.content.matches(m).count())
                .sum::<usize>();
            integration += PHI_INTEGRATION_MARKERS
                .iter()
                .map(|m| lower.matches(m).count())
                .sum::<usize>();
        }

        if polyphonic > 10 {
            phi += 0.1;
        }
        if integration > 5 {
            phi += 0.2;
        }
        phi.min(1.0)
    }

    fn detect_violations(&self, spec: &SceneSpec, fragments: &[SceneFragment]) -> Vec<String> {
        let mut violations = Vec::new();

        match spec.kernwelt {
            Kernwelt::KW1 => {
                let cd = self.contradiction_density(fragments);
                if cd > KW1_MAX_DENSITY {
                    violations.push(format!(
                        "KW1 violation: Contradiction density {cd:.2} exceeds threshold (0.1). \
                         Classical logic enforces Law of Non-Contradiction."
                    ));
                }
            }
            Kernwelt::KW2 => {
                let cd = self.contradiction_density(fragments);
                if cd < KW2_MIN_DENSITY {
                    violations.push(format!(
                        "KW2 expectation: Contradiction density {cd:.2} below expected range (0.3-0.5). \
                         KW2 should embrace paradox."
                    ));
                }
            }
            _ => {}
        }

        if spec.act >= 4 {
            let trajectory = self.integration_trajectory(fragments, spec.act);
            if trajectory < LATE_ACT_MIN_TRAJECTORY {
                violations.push(format!(
                    "Integration violation: Act {} shows trajectory {trajectory:.2}, \
                     expected >= 0.6 for late-act integration.",
                    spec.act
                ));
            }
        }

        if spec.participating_agents.iter().any(|a| a == AEGIS_ID) {
            for fragment in fragments {
                if fragment.speaker.to_lowercase().contains("aegis")
                    && !has_procedural_syntax(&fragment.content)
                {
                    violations.push(format!(
                        "AEGIS voice violation: Fragment {} lacks procedural syntax.",
                        fragment.fragment_id
                    ));
                }
            }
        }

        violations
    }

    fn generate_suggestions(
        &self,
        spec: &SceneSpec,
        fragments: &[SceneFragment],
        violations: &[String],
    ) -> Vec<String> {
        let mut suggestions = Vec::new();
        let any = |prefix: &str| violations.iter().any(|v| v.contains(prefix));

        if any("KW1 violation") {
            suggestions.push(
                "Reduce contradiction density by ensuring propositions are logically consistent. \
                 Remove paradoxical language."
                    .to_string(),
            );
        }
        if any("KW2 expectation") {
            suggestions.push(
                "Increase contradiction density by introducing paraconsistent propositions. \
                 Use 'but', 'yet', 'both/and' constructions."
                    .to_string(),
            );
        }
        if any("Integration violation") {
            suggestions.push(
                "Increase integration markers: use 'we' language, show cooperative alter dialogue, \
                 reduce fragmentation and chaos."
                    .to_string(),
            );
        }
        if any("AEGIS voice violation") {
            suggestions.push(
                "Ensure AEGIS uses procedural syntax: [AEGIS.CORE.vX.X], STATUS:, PROTOCOL:, etc. \
                 Avoid emotional or metaphorical language."
                    .to_string(),
            );
        }

        let balance = self.alter_balance(fragments);
        if balance < LOW_ALTER_BALANCE && spec.act >= 3 {
            suggestions.push(format!(
                "Alter balance score {balance:.2} is low for Act {}. \
                 Consider giving voice to more alters to show polyphonic emergence.",
                spec.act
            ));
        }

        suggestions
    }

    fn detect_godel_patterns(&self, fragments: &[SceneFragment]) -> Vec<String> {
        fragments
            .iter()
            .filter_map(|fragment| {
                let lower = fragment.content.to_lowercase();
                GODEL_INDICATORS
                    .iter()
                    .find(|i| lower.contains(*i))
                    .map(|indicator| {
                        format!(
                            "Gödel pattern detected in {}: '{indicator}' suggests unprovable truth within system.",
                            fragment.fragment_id
                        )
                    })
            })
            .collect()
    }
}
