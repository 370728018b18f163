//! A conversation with the persona agents.
//!
//! The session owns the model, the knowledge store and the locale. Free-text
//! prompts are routed to a persona and streamed; `/learn` and `/research` run
//! a bounded tool-use loop against the knowledge store; `/analyze` fans out
//! to three narrative personas and synthesises their readings.

use super::llm::{collect_text, LanguageModel};
use super::persona::Persona;
use super::router::route;
use super::tools::{self, PlatformTools};
use crate::analyzer::{fragments_from_text, KoharenzAnalyzer};
use crate::cards::{CardError, SystemCards};
use crate::knowledge::{KnowledgeError, KnowledgeStore, MetadataFilter};
use crate::locale::{Language, Locale, LocaleError};
use crate::persist::{
    AnalysisRecord, ConversationTurn, Perspective, PersistError, SavedSession, SessionMetadata,
    TurnRole,
};
use crate::schema::{Kernwelt, SceneSpec};
use chrono::{DateTime, Utc};
use claude::{ContentBlock, Message, Request, Role, StopReason, ToolChoice};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors from the platform session.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Model error: {0}")]
    Model(#[from] claude::Error),

    #[error("Locale error: {0}")]
    Locale(#[from] LocaleError),

    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("System cards: {0}")]
    Cards(#[from] CardError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Nothing to analyze")]
    EmptyInput,
}

/// Tunables for model calls and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Overrides the model's default.
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    /// Passages added to the system prompt for free-text prompts.
    pub retrieval_top_k: usize,
    /// Most recent turns sent as history.
    pub history_limit: usize,
    pub max_tool_rounds: usize,
    /// Directory with `en.json`/`de.json`; bundled translations otherwise.
    pub locale_dir: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            temperature: Some(0.7),
            retrieval_top_k: 3,
            history_limit: 20,
            max_tool_rounds: 4,
            locale_dir: None,
        }
    }
}

/// A persona's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub persona: Persona,
    pub text: String,
    /// Tool calls made while answering.
    pub tool_calls: usize,
}

pub struct PlatformSession<M: LanguageModel> {
    model: M,
    cards: SystemCards,
    knowledge: KnowledgeStore,
    locale: Locale,
    settings: SessionSettings,
    analyzer: KoharenzAnalyzer,
    session_id: String,
    started_at: DateTime<Utc>,
    conversation: Vec<ConversationTurn>,
    analyses: Vec<AnalysisRecord>,
}

impl<M: LanguageModel> PlatformSession<M> {
    /// Create a session with the bundled cards, seed corpus and translations.
    pub fn new(model: M, language: Language) -> Result<Self, PlatformError> {
        Self::with_parts(
            model,
            SystemCards::bundled()?,
            KnowledgeStore::seeded()?,
            SessionSettings::default(),
            language,
        )
    }

    pub fn with_parts(
        model: M,
        cards: SystemCards,
        knowledge: KnowledgeStore,
        settings: SessionSettings,
        language: Language,
    ) -> Result<Self, PlatformError> {
        let locale = Locale::load(settings.locale_dir.as_deref(), language)?;
        let analyzer = KoharenzAnalyzer::from_config(&cards.to_protocol_config());
        Ok(Self {
            model,
            cards,
            knowledge,
            locale,
            settings,
            analyzer,
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            conversation: Vec::new(),
            analyses: Vec::new(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn language(&self) -> Language {
        self.locale.language()
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn knowledge_mut(&mut self) -> &mut KnowledgeStore {
        &mut self.knowledge
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn conversation(&self) -> &[ConversationTurn] {
        &self.conversation
    }

    pub fn analyses(&self) -> &[AnalysisRecord] {
        &self.analyses
    }

    /// Answer free text with the routed persona, streaming through `on_text`.
    pub async fn prompt(
        &mut self,
        text: &str,
        on_text: impl FnMut(&str),
    ) -> Result<ChatReply, PlatformError> {
        let persona = route(text);
        let language = self.language();

        let mut system = persona.system_prompt(language, &self.cards);
        let hits = self.knowledge.query(
            text,
            Some(&MetadataFilter::lang(language.code())),
            self.settings.retrieval_top_k,
        );
        if !hits.is_empty() {
            system.push_str("\n\nRelevant passages from the knowledge base:\n\n");
            system.push_str(&tools::format_passages(&hits));
        }

        let mut messages = self.history();
        messages.push(Message::user(text));
        let request = self.request(messages, system);

        tracing::info!(persona = persona.id(), lang = %language, passages = hits.len(), "prompt");
        let events = self.model.stream(request).await?;
        let reply = collect_text(events, on_text).await?;

        self.record(text, persona, &reply);
        Ok(ChatReply {
            persona,
            text: reply,
            tool_calls: 0,
        })
    }

    /// Guided explanation of `topic` by the tutor.
    pub async fn learn(&mut self, topic: &str) -> Result<ChatReply, PlatformError> {
        let instruction = match self.language() {
            Language::En => format!("Teach me about: {topic}"),
            Language::De => format!("Erkläre mir: {topic}"),
        };
        self.run_with_tools(Persona::Tutor, &instruction).await
    }

    /// Knowledge-grounded research on `query`.
    pub async fn research(&mut self, query: &str) -> Result<ChatReply, PlatformError> {
        let instruction = match self.language() {
            Language::En => format!("Research this question and cite your sources: {query}"),
            Language::De => format!("Recherchiere diese Frage und zitiere deine Quellen: {query}"),
        };
        self.run_with_tools(Persona::Researcher, &instruction).await
    }

    /// Analyse `text` locally, then through AEGIS, Kael and Juna/V
    /// concurrently, then synthesise with the analyst.
    pub async fn analyze(&mut self, text: &str) -> Result<AnalysisRecord, PlatformError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PlatformError::EmptyInput);
        }
        let language = self.language();

        let fragments = fragments_from_text("analysis", text);
        let spec = SceneSpec::new("analysis", "Ad-hoc analysis", Kernwelt::default(), 3);
        let report = self.analyzer.analyze_scene(&spec, &fragments);

        let perspective_request = |persona: Persona| {
            let system = persona.system_prompt(language, &self.cards);
            let user = match language {
                Language::En => format!("Read this text from your perspective:\n\n{text}"),
                Language::De => format!("Lies diesen Text aus deiner Perspektive:\n\n{text}"),
            };
            self.request(vec![Message::user(user)], system)
        };
        let requests = [Persona::Aegis, Persona::Kael, Persona::JunaV].map(perspective_request);
        let [aegis, kael, juna] = requests;

        tracing::info!(fragments = fragments.len(), "analysis fan-out");
        let (aegis, kael, juna) = futures::join!(
            self.model.complete(aegis),
            self.model.complete(kael),
            self.model.complete(juna),
        );
        let perspectives = vec![
            Perspective { persona: Persona::Aegis, content: aegis?.text() },
            Perspective { persona: Persona::Kael, content: kael?.text() },
            Perspective { persona: Persona::JunaV, content: juna?.text() },
        ];

        let mut brief = format!(
            "Text:\n{text}\n\nMetrics: contradiction density {:.2}, Φ estimate {:.2}, integration trajectory {:.2}, alter balance {:.2}\n",
            report.contradiction_density,
            report.phi_estimate,
            report.integration_trajectory,
            report.alter_balance_score,
        );
        for perspective in &perspectives {
            brief.push_str(&format!(
                "\n{}:\n{}\n",
                perspective.persona.display_name(language),
                perspective.content
            ));
        }
        let synthesis_request = self.request(
            vec![Message::user(brief)],
            Persona::Analyst.system_prompt(language, &self.cards),
        );
        let synthesis = self.model.complete(synthesis_request).await?.text();

        let record = AnalysisRecord {
            input: text.to_string(),
            report,
            perspectives,
            synthesis,
            language,
            timestamp: Utc::now(),
        };
        self.analyses.push(record.clone());
        Ok(record)
    }

    /// Switch language, reloading the translations.
    pub fn set_language(&mut self, language: Language) -> Result<(), PlatformError> {
        self.locale = Locale::load(self.settings.locale_dir.as_deref(), language)?;
        tracing::info!(lang = %language, "language switched");
        Ok(())
    }

    /// Forget the conversation and analyses.
    pub fn clear(&mut self) {
        self.conversation.clear();
        self.analyses.clear();
    }

    pub fn snapshot(&self) -> SavedSession {
        SavedSession::new(
            SessionMetadata {
                session_id: self.session_id.clone(),
                language: self.language(),
                started_at: self.started_at,
                turns: self.conversation.len(),
                analyses: self.analyses.len(),
                model: Some(
                    self.settings
                        .model
                        .clone()
                        .unwrap_or_else(|| self.model.model_name().to_string()),
                ),
            },
            self.conversation.clone(),
            self.analyses.clone(),
        )
    }

    /// Default export file name for this session.
    pub fn default_export_path(&self) -> PathBuf {
        PathBuf::from(format!("koharenz_session_{}.md", self.started_at.format("%Y%m%d_%H%M%S")))
    }

    /// Write the session to `path`: JSON for `.json`, Markdown otherwise.
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<PathBuf, PlatformError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let snapshot = self.snapshot();

        if is_json {
            snapshot.save_json(path).await?;
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| PlatformError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            tokio::fs::write(path, snapshot.to_markdown())
                .await
                .map_err(|source| PlatformError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        tracing::info!(path = %path.display(), json = is_json, "session exported");
        Ok(path.to_path_buf())
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), PlatformError> {
        self.snapshot().save_json(path).await?;
        Ok(())
    }

    /// Resume a saved session, including its language.
    pub async fn load(&mut self, path: impl AsRef<Path>) -> Result<(), PlatformError> {
        let saved = SavedSession::load_json(path).await?;
        self.set_language(saved.metadata.language)?;
        self.session_id = saved.metadata.session_id;
        self.started_at = saved.metadata.started_at;
        self.conversation = saved.conversation;
        self.analyses = saved.analyses;
        Ok(())
    }

    /// Tool-use loop: call the model, run requested tools, feed the results
    /// back. After `max_tool_rounds` tool rounds the model must answer in
    /// text. The tools stay declared on that last call because the history
    /// already holds tool blocks.
    async fn run_with_tools(
        &mut self,
        persona: Persona,
        instruction: &str,
    ) -> Result<ChatReply, PlatformError> {
        let language = self.language();
        let system = persona.system_prompt(language, &self.cards);
        let mut messages = self.history();
        messages.push(Message::user(instruction));

        let mut text = String::new();
        let mut tool_calls = 0;

        for round in 0..=self.settings.max_tool_rounds {
            let mut request = self
                .request(messages.clone(), system.clone())
                .with_tools(PlatformTools::all());
            if round == self.settings.max_tool_rounds {
                request = request.with_tool_choice(ToolChoice::None);
            }
            let response = self.model.complete(request).await?;

            let tool_uses = response.tool_uses();
            let reply = response.text();
            if !reply.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&reply);
            }

            if response.stop_reason != StopReason::ToolUse
                || tool_uses.is_empty()
                || round == self.settings.max_tool_rounds
            {
                break;
            }

            messages.push(Message {
                role: Role::Assistant,
                content: response.content.clone(),
            });

            let results: Vec<ContentBlock> = tool_uses
                .into_iter()
                .map(|call| {
                    tool_calls += 1;
                    tools::execute(&call.name, &call.input, &self.knowledge, language)
                        .into_block(call.id)
                })
                .collect();
            tracing::debug!(round, calls = results.len(), persona = persona.id(), "tool round");

            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        self.record(instruction, persona, &text);
        Ok(ChatReply {
            persona,
            text,
            tool_calls,
        })
    }

    fn request(&self, messages: Vec<Message>, system: String) -> Request {
        let mut request = Request::new(messages)
            .with_system(system)
            .with_max_tokens(self.settings.max_tokens);
        if let Some(model) = &self.settings.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.settings.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    /// The most recent turns as API messages. Empty turns are skipped
    /// together with the prompt they answer.
    fn history(&self) -> Vec<Message> {
        let skip = self.conversation.len().saturating_sub(self.settings.history_limit);
        let mut messages: Vec<Message> = Vec::new();
        for turn in self.conversation.iter().skip(skip) {
            if turn.content.trim().is_empty() {
                if turn.role == TurnRole::Assistant
                    && messages.last().is_some_and(|m| m.role == Role::User)
                {
                    messages.pop();
                }
                continue;
            }
            messages.push(match turn.role {
                TurnRole::User => Message::user(&turn.content),
                TurnRole::Assistant => Message::assistant(&turn.content),
            });
        }
        // History must open with a user message.
        if messages.first().is_some_and(|m| m.role == Role::Assistant) {
            messages.remove(0);
        }
        messages
    }

    /// Record an exchange. A reply without text is not kept, so it never
    /// reaches the model as an empty block.
    fn record(&mut self, user: &str, persona: Persona, reply: &str) {
        if reply.trim().is_empty() {
            tracing::warn!(persona = persona.id(), "empty reply not recorded");
            return;
        }
        let language = self.language();
        self.conversation.push(ConversationTurn::user(user, language));
        self.conversation
            .push(ConversationTurn::assistant(persona, reply, language));
    }
}
