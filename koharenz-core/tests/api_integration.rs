//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p koharenz-core --test api_integration -- --ignored`
//!
//! They are marked #[ignore] so CI runs stay offline and free.

use claude::Claude;
use koharenz_core::{
    KnowledgeStore, Language, Persona, PlatformSession, SessionSettings, SystemCards,
};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

fn session(language: Language) -> PlatformSession<Claude> {
    let model = Claude::from_env().expect("Failed to create client");
    // Short answers keep the runs fast
    let settings = SessionSettings {
        max_tokens: 400,
        ..SessionSettings::default()
    };
    PlatformSession::with_parts(
        model,
        SystemCards::bundled().unwrap(),
        KnowledgeStore::seeded().unwrap(),
        settings,
        language,
    )
    .expect("Failed to create session")
}

#[tokio::test]
#[ignore] // Run with: cargo test -p koharenz-core --test api_integration -- --ignored
async fn test_prompt_streams_from_routed_persona() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let mut session = session(Language::En);
    let mut deltas = 0;
    let reply = session
        .prompt("Explain the coherence theory of truth in two sentences.", |_| {
            deltas += 1
        })
        .await
        .expect("prompt failed");

    println!("{}: {}", reply.persona, reply.text);
    assert!(!reply.text.trim().is_empty());
    assert!(deltas > 0);
    assert_eq!(session.conversation().len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_research_uses_knowledge_tool() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let mut session = session(Language::En);
    let reply = session
        .research("How does paraconsistent logic handle contradictions?")
        .await
        .expect("research failed");

    println!("tool calls: {}\n{}", reply.tool_calls, reply.text);
    assert_eq!(reply.persona, Persona::Researcher);
    assert!(!reply.text.trim().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_german_analysis() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let mut session = session(Language::De);
    let record = session
        .analyze("Ich bin einer. Wir sind viele. Das habe ich nie gesagt.")
        .await
        .expect("analysis failed");

    for perspective in &record.perspectives {
        println!("--- {} ---\n{}", perspective.persona, perspective.content);
    }
    println!("--- Synthese ---\n{}", record.synthesis);
    assert_eq!(record.perspectives.len(), 3);
    assert!(!record.synthesis.trim().is_empty());
    assert_eq!(record.language, Language::De);
}
