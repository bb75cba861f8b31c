//! KG chatbot: question/answer over the loaded knowledge graph.
//!
//! A [`KgChat`] can only be built from a ready [`ChatGate`]. Transcripts are
//! written to the session database as they grow, so `chat` can pick an
//! earlier conversation back up.

use schemaconsole_client::ApiClient;
use schemaconsole_shared::{AskRequest, AskResponse, ConsoleError, Neo4jPublicConfig, Result};
use schemaconsole_storage::ChatRecord;
use tracing::{debug, instrument, warn};

use crate::session::{ChatGate, Session};

pub const GREETING: &str = "Knowledge Graph is ready. Ask questions about your data.";
pub const NEW_CHAT_GREETING: &str = "New conversation started. Ask your next question.";
pub const ANSWER_FAILED: &str = "An error occurred while generating the response.";
pub const NO_ANSWER: &str = "No answer found.";
pub const NOT_INITIALIZED: &str = "Session Not Initialized";
pub const DEFAULT_TITLE: &str = "New Chat";

/// Characters of the first question kept as the chat title.
const TITLE_LEN: usize = 24;

/// Port of the Neo4j browser UI.
const NEO4J_BROWSER_PORT: u16 = 7474;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }

    fn parse(s: &str) -> Self {
        if s == "user" { Self::User } else { Self::Bot }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

/// An open KG chat conversation.
pub struct KgChat {
    session: Session,
    session_id: String,
    neo4j: Neo4jPublicConfig,
    chat: ChatRecord,
    messages: Vec<Message>,
    thinking: bool,
}

impl KgChat {
    /// Open a fresh conversation. Fails unless the gate is ready.
    pub async fn start(session: &Session, gate: ChatGate) -> Result<Self> {
        let (session_id, neo4j) = unlock(gate)?;
        let chat = session.storage().create_chat(DEFAULT_TITLE).await?;
        let mut this = Self {
            session: session.clone(),
            session_id,
            neo4j,
            chat,
            messages: Vec::new(),
            thinking: false,
        };
        this.push(Role::Bot, GREETING).await?;
        Ok(this)
    }

    /// Reopen a stored conversation.
    pub async fn resume(session: &Session, gate: ChatGate, chat_id: &str) -> Result<Self> {
        let (session_id, neo4j) = unlock(gate)?;
        let chat = session
            .storage()
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| ConsoleError::validation(format!("no chat with id {chat_id}")))?;
        let messages = session
            .storage()
            .list_messages(chat_id)
            .await?
            .into_iter()
            .map(|m| Message {
                role: Role::parse(&m.role),
                text: m.text,
            })
            .collect();

        Ok(Self {
            session: session.clone(),
            session_id,
            neo4j,
            chat,
            messages,
            thinking: false,
        })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn title(&self) -> &str {
        &self.chat.title
    }

    pub fn chat_id(&self) -> &str {
        &self.chat.id
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn neo4j(&self) -> &Neo4jPublicConfig {
        &self.neo4j
    }

    /// Record the user's question and build the request for it.
    ///
    /// Returns `None` (and changes nothing) for blank input or while a
    /// previous question is still being answered.
    pub async fn begin(&mut self, input: &str) -> Result<Option<AskRequest>> {
        let question = input.trim();
        if question.is_empty() || self.thinking {
            return Ok(None);
        }

        if self.chat.title == DEFAULT_TITLE {
            let title: String = question.chars().take(TITLE_LEN).collect();
            self.session.storage().rename_chat(&self.chat.id, &title).await?;
            self.chat.title = title;
        }
        self.push(Role::User, question).await?;
        self.thinking = true;

        Ok(Some(AskRequest {
            session_id: self.session_id.clone(),
            question: question.to_string(),
        }))
    }

    /// Append the bot's reply for an answered (or failed) question.
    pub async fn finish(&mut self, outcome: Result<AskResponse>) -> Result<&Message> {
        self.thinking = false;
        let text = match outcome {
            Ok(resp) => resp.answer().unwrap_or_else(|| NO_ANSWER.to_string()),
            Err(e) => {
                warn!(error = %e, "question failed");
                ANSWER_FAILED.to_string()
            }
        };
        self.push(Role::Bot, &text).await?;
        self.last()
    }

    /// Ask one question end to end. `None` when the input was ignored.
    #[instrument(skip_all, fields(chat_id = %self.chat.id))]
    pub async fn send(&mut self, client: &ApiClient, input: &str) -> Result<Option<&Message>> {
        let Some(req) = self.begin(input).await? else {
            return Ok(None);
        };
        let outcome = client.ask(&req).await;
        self.finish(outcome).await.map(Some)
    }

    /// Start a new conversation in place.
    pub async fn new_chat(&mut self) -> Result<()> {
        self.chat = self.session.storage().create_chat(DEFAULT_TITLE).await?;
        self.messages.clear();
        self.thinking = false;
        self.push(Role::Bot, NEW_CHAT_GREETING).await
    }

    /// Neo4j browser link for the connected graph.
    pub fn kg_browser_url(&self) -> Result<String> {
        kg_browser_url(&self.neo4j.uri)
    }

    async fn push(&mut self, role: Role, text: &str) -> Result<()> {
        self.session
            .storage()
            .append_message(&self.chat.id, role.as_str(), text)
            .await?;
        debug!(role = role.as_str(), len = text.len(), "message appended");
        self.messages.push(Message {
            role,
            text: text.to_string(),
        });
        Ok(())
    }

    fn last(&self) -> Result<&Message> {
        self.messages
            .last()
            .ok_or_else(|| ConsoleError::Session("chat transcript is empty".into()))
    }
}

fn unlock(gate: ChatGate) -> Result<(String, Neo4jPublicConfig)> {
    match gate {
        ChatGate::Ready { session_id, neo4j } => Ok((session_id, neo4j)),
        ChatGate::NotInitialized => Err(ConsoleError::Session(format!(
            "{NOT_INITIALIZED}: connect first so the knowledge graph is loaded"
        ))),
    }
}

/// Stored conversations, newest first.
pub async fn list_chats(session: &Session) -> Result<Vec<ChatRecord>> {
    session.storage().list_chats().await
}

/// Neo4j browser URL for a bolt/neo4j URI: `http://<host>:7474/browser/`.
pub fn kg_browser_url(uri: &str) -> Result<String> {
    let rest = uri
        .trim()
        .split_once("://")
        .map_or(uri.trim(), |(_, rest)| rest);
    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = host_port.split(':').next().unwrap_or_default();

    if host.is_empty() {
        return Err(ConsoleError::validation(format!(
            "cannot derive a host from neo4j uri '{uri}'"
        )));
    }
    Ok(format!("http://{host}:{NEO4J_BROWSER_PORT}/browser/"))
}
