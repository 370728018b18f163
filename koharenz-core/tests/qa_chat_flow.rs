//! QA tests for the chat platform, driven by the scripted `MockModel`.
//!
//! These run without network access.

use claude::{ContentBlock, ToolChoice};
use koharenz_core::cards::{AEGIS_ID, JUNA_ID, KAEL_ID};
use koharenz_core::platform::SEARCH_KNOWLEDGE;
use koharenz_core::testing::{
    assert_offers_tools, assert_persona, assert_request_count, assert_system_contains,
    assert_well_formed,
};
use koharenz_core::{Language, MockReply, Persona, PlatformError, SystemCards, TestHarness};
use serde_json::json;

fn card_prompt(id: &str) -> String {
    SystemCards::bundled().unwrap().agent(id).unwrap().system_prompt.clone()
}

// =============================================================================
// Free-text prompts
// =============================================================================

#[tokio::test]
async fn test_prompt_routes_and_streams() {
    let mut harness = TestHarness::new();
    harness.expect_text("We are many voices and one life.");

    let reply = harness
        .prompt("Who is my self when the alters speak about identity?")
        .await
        .unwrap();

    assert_persona(&reply, Persona::Kael);
    assert_eq!(reply.text, "We are many voices and one life.");
    assert_eq!(harness.streamed.concat(), reply.text);
    assert!(harness.streamed.len() > 1, "reply should arrive in pieces");

    assert_request_count(&harness, 1);
    assert_system_contains(&harness, 0, &card_prompt(KAEL_ID));
    assert_system_contains(&harness, 0, "Relevant passages from the knowledge base");
    assert_system_contains(&harness, 0, "[en_");
    assert!(!harness.system_prompt(0).contains("[de_"));

    assert_eq!(harness.turn_count(), 2);
}

#[tokio::test]
async fn test_unrouted_prompt_goes_to_tutor() {
    let mut harness = TestHarness::new();
    let reply = harness.prompt("Hello").await.unwrap();
    assert_persona(&reply, Persona::Tutor);
    assert_eq!(reply.text, "Mock reply #1");
    assert_system_contains(&harness, 0, "You are the Tutor");
}

#[tokio::test]
async fn test_history_is_sent() {
    let mut harness = TestHarness::new();
    harness.expect_text("first answer").expect_text("second answer");

    harness.prompt("Hello").await.unwrap();
    harness.prompt("Hello again").await.unwrap();

    let requests = harness.requests();
    let second = &requests[1];
    let texts: Vec<String> = second.messages.iter().map(|m| m.text()).collect();
    assert_eq!(texts, ["Hello", "first answer", "Hello again"]);
}

#[tokio::test]
async fn test_german_session_retrieves_only_german() {
    let mut harness = TestHarness::with_language(Language::De);
    let reply = harness
        .prompt("Was ist Wirklichkeit in der Welt? Korrespondenz der Wahrheit")
        .await
        .unwrap();

    assert_persona(&reply, Persona::JunaV);
    assert_system_contains(&harness, 0, &card_prompt(JUNA_ID));
    assert_system_contains(&harness, 0, "Antworte ausschließlich auf Deutsch.");
    assert_system_contains(&harness, 0, "[de_korrespondenztheorie]");
    assert!(!harness.system_prompt(0).contains("[en_"));
}

#[tokio::test]
async fn test_model_error_leaves_conversation_untouched() {
    let mut harness = TestHarness::new();
    harness.expect(MockReply::error("overloaded"));

    let result = harness.prompt("Hello").await;
    assert!(matches!(result, Err(PlatformError::Model(_))));
    assert_eq!(harness.turn_count(), 0);

    // The session keeps working afterwards.
    harness.expect_text("recovered");
    assert_eq!(harness.prompt("Hello").await.unwrap().text, "recovered");
    assert_eq!(harness.turn_count(), 2);
}

// =============================================================================
// Tool use
// =============================================================================

#[tokio::test]
async fn test_learn_runs_knowledge_tool() {
    let mut harness = TestHarness::new();
    harness
        .expect(MockReply::tool_use(
            "call_1",
            SEARCH_KNOWLEDGE,
            json!({"query": "coherence theory of truth"}),
        ))
        .expect_text("Coherence means fitting into the whole.");

    let reply = harness.session.learn("the coherence theory").await.unwrap();

    assert_persona(&reply, Persona::Tutor);
    assert_eq!(reply.text, "Coherence means fitting into the whole.");
    assert_eq!(reply.tool_calls, 1);
    assert_request_count(&harness, 2);

    let requests = harness.requests();
    assert_offers_tools(&requests[0], true);
    assert_offers_tools(&requests[1], true);

    let results = &requests[1].messages.last().unwrap().content;
    match &results[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "call_1");
            assert!(!is_error);
            assert!(content.contains("[en_coherence_theory]"));
        }
        other => panic!("expected a tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tool_loop_is_bounded() {
    let mut harness = TestHarness::new();
    for i in 0..6 {
        harness.expect(MockReply::tool_use(
            format!("call_{i}"),
            SEARCH_KNOWLEDGE,
            json!({"query": "truth"}),
        ));
    }

    let reply = harness.session.research("what is truth").await.unwrap();

    assert_persona(&reply, Persona::Researcher);
    assert_eq!(reply.tool_calls, 4);
    assert_request_count(&harness, 5);
    let requests = harness.requests();
    for request in &requests {
        assert_offers_tools(request, true);
        assert_well_formed(request);
    }
    assert!(requests[..4].iter().all(|r| r.tool_choice.is_none()));
    assert_eq!(requests[4].tool_choice, Some(ToolChoice::None));
}

#[tokio::test]
async fn test_capped_research_without_text_is_not_replayed() {
    let mut harness = TestHarness::new();
    for i in 0..5 {
        harness.expect(MockReply::tool_use(
            format!("call_{i}"),
            SEARCH_KNOWLEDGE,
            json!({"query": "truth"}),
        ));
    }
    harness.expect_text("Hello again.");

    let reply = harness.session.research("what is truth").await.unwrap();
    assert!(reply.text.is_empty());
    assert_eq!(harness.turn_count(), 0);

    harness.prompt("Hello").await.unwrap();
    let request = harness.requests().pop().unwrap();
    assert_well_formed(&request);
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].text(), "Hello");
}

#[tokio::test]
async fn test_empty_stream_is_not_recorded() {
    let mut harness = TestHarness::new();
    harness.expect_text("").expect_text("Truth is a relation.");

    let reply = harness.prompt("Please explain truth.").await.unwrap();
    assert!(reply.text.is_empty());
    assert_eq!(harness.turn_count(), 0);

    harness.prompt("Please explain it again.").await.unwrap();
    let requests = harness.requests();
    let request = &requests[1];
    assert_well_formed(request);
    assert_eq!(request.messages.len(), 1);
    assert_eq!(harness.turn_count(), 2);
}

#[tokio::test]
async fn test_unknown_tool_reported_to_model() {
    let mut harness = TestHarness::new();
    harness
        .expect(MockReply::tool_use("call_1", "roll_dice", json!({})))
        .expect_text("Sorry, I will answer directly.");

    let reply = harness.session.research("anything").await.unwrap();
    assert_eq!(reply.text, "Sorry, I will answer directly.");

    let requests = harness.requests();
    let results = &requests[1].messages.last().unwrap().content;
    assert!(matches!(
        &results[0],
        ContentBlock::ToolResult { is_error: true, content, .. } if content == "Unknown tool: roll_dice"
    ));
}

// =============================================================================
// Multi-perspective analysis
// =============================================================================

#[tokio::test]
async fn test_analyze_fans_out_and_synthesises() {
    let mut harness = TestHarness::new();
    harness
        .expect_text("[AEGIS.CORE] STATUS: contradiction detected")
        .expect_text("We hear ourselves in it.")
        .expect_text("The door is open.")
        .expect_text("All three circle the same wound.");

    let text = "Kael: I am one. We are many.\n\nLex: That is a contradiction.";
    let analysis = harness.session.analyze(text).await.unwrap();

    assert_request_count(&harness, 4);
    assert_system_contains(&harness, 0, &card_prompt(AEGIS_ID));
    assert_system_contains(&harness, 1, &card_prompt(KAEL_ID));
    assert_system_contains(&harness, 2, &card_prompt(JUNA_ID));
    assert_system_contains(&harness, 3, "You are the Analyst");

    let personas: Vec<Persona> = analysis.perspectives.iter().map(|p| p.persona).collect();
    assert_eq!(personas, [Persona::Aegis, Persona::Kael, Persona::JunaV]);
    assert_eq!(analysis.perspectives[1].content, "We hear ourselves in it.");
    assert_eq!(analysis.synthesis, "All three circle the same wound.");

    let brief = harness.requests()[3].messages[0].text();
    assert!(brief.contains("We hear ourselves in it."));
    assert!(brief.contains("The door is open."));
    assert!(brief.contains("contradiction density"));

    assert_eq!(analysis.report.scene_id, "analysis");
    assert!(analysis.report.contradiction_density > 0.0);
    assert_eq!(harness.session.analyses().len(), 1);
}

#[tokio::test]
async fn test_analyze_fails_if_a_perspective_fails() {
    let mut harness = TestHarness::new();
    harness
        .expect_text("fine")
        .expect(MockReply::error("rate limited"))
        .expect_text("fine");

    let result = harness.session.analyze("I am many.").await;
    assert!(matches!(result, Err(PlatformError::Model(_))));
    // All three perspective calls were made; the synthesis was not.
    assert_request_count(&harness, 3);
    assert!(harness.session.analyses().is_empty());
}

#[tokio::test]
async fn test_analyze_rejects_empty_text() {
    let mut harness = TestHarness::new();
    assert!(matches!(
        harness.session.analyze("   ").await,
        Err(PlatformError::EmptyInput)
    ));
    assert_request_count(&harness, 0);
}

// =============================================================================
// Session management
// =============================================================================

#[tokio::test]
async fn test_language_switch_and_clear() {
    let mut harness = TestHarness::new();
    harness.prompt("Hello").await.unwrap();

    harness.session.set_language(Language::De).unwrap();
    assert_eq!(harness.session.language(), Language::De);
    assert_eq!(harness.session.locale().t("chat.cleared"), "Gespräch gelöscht.");

    harness.prompt("Hallo").await.unwrap();
    assert_system_contains(&harness, 1, "Du bist der Tutor");

    harness.session.clear();
    assert_eq!(harness.turn_count(), 0);
}
