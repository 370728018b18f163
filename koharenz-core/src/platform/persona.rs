//! The six personas of the analysis platform.
//!
//! Personas are thin: each is a system prompt plus routing keywords. The
//! narrative personas reuse the prompts from the system cards.

use crate::cards::{SystemCards, AEGIS_ID, JUNA_ID, KAEL_ID};
use crate::locale::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Tutor,
    Researcher,
    Analyst,
    Aegis,
    Kael,
    JunaV,
}

impl Persona {
    /// Routing order. Earlier personas win ties.
    pub const ALL: [Persona; 6] = [
        Persona::Tutor,
        Persona::Researcher,
        Persona::Analyst,
        Persona::Aegis,
        Persona::Kael,
        Persona::JunaV,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Persona::Tutor => "tutor",
            Persona::Researcher => "researcher",
            Persona::Analyst => "analyst",
            Persona::Aegis => "aegis",
            Persona::Kael => "kael",
            Persona::JunaV => "juna_v",
        }
    }

    pub fn display_name(&self, language: Language) -> &'static str {
        match (self, language) {
            (Persona::Tutor, _) => "Tutor",
            (Persona::Researcher, Language::En) => "Researcher",
            (Persona::Researcher, Language::De) => "Rechercheur",
            (Persona::Analyst, _) => "Analyst",
            (Persona::Aegis, _) => "AEGIS",
            (Persona::Kael, _) => "Kael",
            (Persona::JunaV, _) => "Juna/V",
        }
    }

    /// Lowercase keywords in both languages that route input here.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Persona::Tutor => &[
                "explain", "what is", "teach", "learn", "understand", "example",
                "erkläre", "was ist", "lernen", "verstehen", "beispiel",
            ],
            Persona::Researcher => &[
                "research", "source", "sources", "evidence", "study", "paper", "cite",
                "recherche", "quelle", "quellen", "beleg", "studie", "literatur",
            ],
            Persona::Analyst => &[
                "analyze", "analyse", "compare", "structure", "argument", "evaluate",
                "vergleiche", "struktur", "bewerte",
            ],
            Persona::Aegis => &[
                "coherence", "consistent", "consistency", "logic", "order", "system",
                "kohärenz", "widerspruchsfrei", "logik", "ordnung",
            ],
            Persona::Kael => &[
                "identity", "self", "alter", "alters", "fragment", "dissociation", "contradiction",
                "identität", "selbst", "dissoziation", "widerspruch",
            ],
            Persona::JunaV => &[
                "reality", "real", "world", "correspondence", "koan", "silence",
                "wirklichkeit", "welt", "korrespondenz", "stille",
            ],
        }
    }

    /// Full system prompt in `language`.
    pub fn system_prompt(&self, language: Language, cards: &SystemCards) -> String {
        let base = match self {
            Persona::Tutor | Persona::Researcher | Persona::Analyst => {
                return bundled_prompt(*self, language).to_string()
            }
            Persona::Aegis => card_prompt(cards, AEGIS_ID),
            Persona::Kael => card_prompt(cards, KAEL_ID),
            Persona::JunaV => card_prompt(cards, JUNA_ID),
        };
        match language {
            Language::En => base,
            Language::De => format!("{base}\n\nAntworte ausschließlich auf Deutsch."),
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name(Language::En))
    }
}

fn bundled_prompt(persona: Persona, language: Language) -> &'static str {
    match (persona, language) {
        (Persona::Tutor, Language::En) => include_str!("../prompts/tutor.en.md"),
        (Persona::Tutor, Language::De) => include_str!("../prompts/tutor.de.md"),
        (Persona::Researcher, Language::En) => include_str!("../prompts/researcher.en.md"),
        (Persona::Researcher, Language::De) => include_str!("../prompts/researcher.de.md"),
        (_, Language::En) => include_str!("../prompts/analyst.en.md"),
        (_, Language::De) => include_str!("../prompts/analyst.de.md"),
    }
}

fn card_prompt(cards: &SystemCards, id: &str) -> String {
    match cards.agent(id) {
        Ok(card) => card.system_prompt.clone(),
        Err(e) => {
            tracing::warn!(agent = id, error = %e, "persona card missing, using analyst prompt");
            bundled_prompt(Persona::Analyst, Language::En).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<&str> = Persona::ALL.iter().map(|p| p.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_prompts_follow_language() {
        let cards = SystemCards::bundled().unwrap();
        assert!(Persona::Tutor
            .system_prompt(Language::En, &cards)
            .starts_with("You are the Tutor"));
        assert!(Persona::Tutor
            .system_prompt(Language::De, &cards)
            .starts_with("Du bist der Tutor"));

        let aegis_en = Persona::Aegis.system_prompt(Language::En, &cards);
        assert_eq!(aegis_en, cards.agent(AEGIS_ID).unwrap().system_prompt);
        let aegis_de = Persona::Aegis.system_prompt(Language::De, &cards);
        assert!(aegis_de.starts_with(&aegis_en));
        assert!(aegis_de.ends_with("Antworte ausschließlich auf Deutsch."));
    }

    #[test]
    fn test_serde_ids() {
        assert_eq!(serde_json::to_string(&Persona::JunaV).unwrap(), "\"juna_v\"");
        assert_eq!(
            serde_json::from_str::<Persona>("\"researcher\"").unwrap(),
            Persona::Researcher
        );
    }
}
