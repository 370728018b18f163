//! Keyword routing of free-text prompts to personas.

use super::persona::Persona;

/// Keyword hits per persona, in routing order.
pub fn scores(input: &str) -> [(Persona, usize); 6] {
    let lower = input.to_lowercase();
    Persona::ALL.map(|persona| {
        let hits = persona
            .keywords()
            .iter()
            .filter(|kw| contains_word(&lower, kw))
            .count();
        (persona, hits)
    })
}

/// Pick the persona with the most keyword hits. Ties go to the earlier
/// persona; no hits at all go to the tutor.
pub fn route(input: &str) -> Persona {
    let mut best = (Persona::Tutor, 0);
    for (persona, hits) in scores(input) {
        if hits > best.1 {
            best = (persona, hits);
        }
    }
    tracing::debug!(persona = best.0.id(), hits = best.1, "routed prompt");
    best.0
}

/// Whether `keyword` occurs in `text` at word boundaries.
fn contains_word(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_tutor() {
        assert_eq!(route("Hello there"), Persona::Tutor);
        assert_eq!(route(""), Persona::Tutor);
    }

    #[test]
    fn test_keyword_routing() {
        assert_eq!(route("Find sources and evidence on free will"), Persona::Researcher);
        assert_eq!(route("Is a coherent logic system consistent?"), Persona::Aegis);
        assert_eq!(route("Who is my self when the alters speak?"), Persona::Kael);
        assert_eq!(route("Is the world real?"), Persona::JunaV);
        assert_eq!(route("Vergleiche die Struktur der Argumente"), Persona::Analyst);
        assert_eq!(route("Was ist Wirklichkeit in der Welt?"), Persona::JunaV);
    }

    #[test]
    fn test_ties_go_to_earlier_persona() {
        // one hit each for Tutor ("explain") and Aegis ("logic")
        assert_eq!(route("explain logic"), Persona::Tutor);
        // one hit each for Aegis and Kael
        assert_eq!(route("logic and identity"), Persona::Aegis);
    }

    #[test]
    fn test_word_boundaries() {
        // "real" inside "surreal" and "self" inside "selfish" do not count
        assert_eq!(route("surreal selfish"), Persona::Tutor);
        assert!(contains_word("is it real?", "real"));
        assert!(contains_word("what is truth", "what is"));
        assert!(!contains_word("unreal", "real"));
    }
}
