//! Page-to-page handoff state backed by the session database.
//!
//! The connect page writes the RAG session id, the KG-ready flag and the
//! password-free Neo4j location; the workspace tabs save their last result;
//! the chat page reads the gate before it lets the user in. `exit` wipes it
//! all.

use std::path::Path;
use std::sync::Arc;

use schemaconsole_shared::{ConsoleError, DbConfig, Neo4jConfig, Neo4jPublicConfig, Result, SessionId};
use schemaconsole_storage::Storage;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

pub const RAG_SESSION_ID: &str = "rag_session_id";
pub const KG_INITIALIZED: &str = "kg_initialized";
pub const NEO4J_CFG: &str = "neo4j_cfg";
pub const SOURCE_CFG: &str = "source_cfg";
pub const METADATA_STATE: &str = "metadata_state_v1";
pub const MAPPING_STATE: &str = "mapping_state_final_v1";

/// Whether the KG chat page may be entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatGate {
    Ready {
        session_id: String,
        neo4j: Neo4jPublicConfig,
    },
    NotInitialized,
}

impl ChatGate {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Handle over the session store. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    storage: Arc<Storage>,
}

impl Session {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Open (or create) the session database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Storage::open(path).await?))
    }

    /// Open the session database for inspection only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        Ok(Self::new(Storage::open_readonly(path).await?))
    }

    /// Underlying store, for transcript operations.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The current RAG session id, if any.
    pub async fn session_id(&self) -> Result<Option<String>> {
        self.storage.get(RAG_SESSION_ID).await
    }

    /// Reuse the stored RAG session id or mint and store a new one.
    pub async fn session_id_or_create(&self) -> Result<String> {
        if let Some(id) = self.session_id().await?.filter(|id| !id.trim().is_empty()) {
            debug!(session_id = %id, "reusing session id");
            return Ok(id);
        }
        let id = SessionId::new().to_string();
        self.storage.set(RAG_SESSION_ID, &id).await?;
        info!(session_id = %id, "created session id");
        Ok(id)
    }

    /// Record that the knowledge graph is loaded and where it lives.
    pub async fn mark_kg_ready(&self, neo4j: &Neo4jConfig) -> Result<()> {
        self.storage.set(KG_INITIALIZED, "true").await?;
        self.put_json(NEO4J_CFG, &neo4j.public()).await
    }

    pub async fn kg_ready(&self) -> Result<bool> {
        Ok(self.storage.get(KG_INITIALIZED).await?.as_deref() == Some("true"))
    }

    /// Stored Neo4j location (never includes the password).
    pub async fn neo4j(&self) -> Result<Option<Neo4jPublicConfig>> {
        self.load_json(NEO4J_CFG).await
    }

    /// Evaluate the chat gate: a session id, the KG flag and a Neo4j URI
    /// must all be present.
    pub async fn chat_gate(&self) -> Result<ChatGate> {
        let session_id = self.session_id().await?.filter(|id| !id.trim().is_empty());
        let ready = self.kg_ready().await?;
        let neo4j = self.neo4j().await?.filter(|cfg| !cfg.uri.trim().is_empty());

        Ok(match (session_id, ready, neo4j) {
            (Some(session_id), true, Some(neo4j)) => ChatGate::Ready { session_id, neo4j },
            _ => ChatGate::NotInitialized,
        })
    }

    /// Remember the source connection for the workspace tabs, minus the password.
    pub async fn save_source(&self, db: &DbConfig) -> Result<()> {
        self.put_json(SOURCE_CFG, &db.without_password()).await
    }

    /// The saved source connection. Its password is always blank.
    pub async fn source(&self) -> Result<Option<DbConfig>> {
        self.load_json(SOURCE_CFG).await
    }

    /// Whether a connect has completed in this session.
    pub async fn is_connected(&self) -> Result<bool> {
        Ok(self.source().await?.is_some() && self.kg_ready().await?)
    }

    /// Wipe all session state (the "Exit" button).
    pub async fn exit(&self) -> Result<()> {
        self.storage.clear().await?;
        info!("session cleared");
        Ok(())
    }

    /// Serialize `value` as JSON under `key`.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| ConsoleError::parse(format!("failed to encode {key}: {e}")))?;
        self.storage.set(key, &json).await
    }

    /// Load a JSON value stored under `key`.
    ///
    /// A value that no longer decodes is reported as absent. It is also
    /// removed unless the session was opened read-only.
    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable session value");
                if !self.storage.is_readonly() {
                    self.storage.remove(key).await?;
                }
                Ok(None)
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::temp_session;

    fn neo4j() -> Neo4jConfig {
        Neo4jConfig {
            password: "neo-pass".into(),
            ..Neo4jConfig::default()
        }
    }

    #[tokio::test]
    async fn session_id_is_reused() {
        let session = temp_session().await;
        let first = session.session_id_or_create().await.unwrap();
        let second = session.session_id_or_create().await.unwrap();
        assert_eq!(first, second);
        assert!(first.parse::<SessionId>().is_ok());
    }

    #[tokio::test]
    async fn gate_requires_all_three() {
        let session = temp_session().await;
        assert_eq!(session.chat_gate().await.unwrap(), ChatGate::NotInitialized);

        session.session_id_or_create().await.unwrap();
        assert!(!session.chat_gate().await.unwrap().is_ready());

        session.mark_kg_ready(&neo4j()).await.unwrap();
        let gate = session.chat_gate().await.unwrap();
        match gate {
            ChatGate::Ready { neo4j, .. } => assert_eq!(neo4j.uri, "bolt://localhost:7687"),
            ChatGate::NotInitialized => panic!("gate should be ready"),
        }
    }

    #[tokio::test]
    async fn gate_rejects_flag_other_than_true() {
        let session = temp_session().await;
        session.session_id_or_create().await.unwrap();
        session.mark_kg_ready(&neo4j()).await.unwrap();
        session.storage().set(KG_INITIALIZED, "yes").await.unwrap();
        assert!(!session.chat_gate().await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn gate_rejects_blank_uri() {
        let session = temp_session().await;
        session.session_id_or_create().await.unwrap();
        session
            .mark_kg_ready(&Neo4jConfig {
                uri: "  ".into(),
                ..neo4j()
            })
            .await
            .unwrap();
        assert!(!session.chat_gate().await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn passwords_never_reach_storage() {
        let session = temp_session().await;
        session.mark_kg_ready(&neo4j()).await.unwrap();
        session
            .save_source(&DbConfig {
                database: "employee".into(),
                password: "pg-pass".into(),
                ..DbConfig::default()
            })
            .await
            .unwrap();

        let raw_neo = session.storage().get(NEO4J_CFG).await.unwrap().unwrap();
        let raw_src = session.storage().get(SOURCE_CFG).await.unwrap().unwrap();
        assert!(!raw_neo.contains("neo-pass"));
        assert!(!raw_src.contains("pg-pass"));

        let source = session.source().await.unwrap().unwrap();
        assert_eq!(source.database, "employee");
        assert!(source.password.is_empty());
    }

    #[tokio::test]
    async fn corrupt_value_is_removed() {
        let session = temp_session().await;
        session.storage().set(NEO4J_CFG, "{not json").await.unwrap();
        assert!(session.neo4j().await.unwrap().is_none());
        assert!(session.storage().get(NEO4J_CFG).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_value_is_absent_when_readonly() {
        let path = std::env::temp_dir().join(format!("sc_ro_{}.db", uuid::Uuid::now_v7()));
        let writer = Session::open(&path).await.unwrap();
        writer.session_id_or_create().await.unwrap();
        writer.mark_kg_ready(&neo4j()).await.unwrap();
        writer.storage().set(SOURCE_CFG, "{not json").await.unwrap();
        drop(writer);

        let reader = Session::open_readonly(&path).await.unwrap();
        assert!(matches!(reader.source().await, Ok(None)));
        assert!(!reader.is_connected().await.unwrap());
        assert_eq!(
            reader.storage().get(SOURCE_CFG).await.unwrap().as_deref(),
            Some("{not json"),
            "read-only load leaves the value in place"
        );
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn exit_clears_everything() {
        let session = temp_session().await;
        session.session_id_or_create().await.unwrap();
        session.mark_kg_ready(&neo4j()).await.unwrap();
        session.save_source(&DbConfig::default()).await.unwrap();
        assert!(session.is_connected().await.unwrap());

        session.exit().await.unwrap();
        assert!(session.session_id().await.unwrap().is_none());
        assert!(!session.is_connected().await.unwrap());
        assert_eq!(session.chat_gate().await.unwrap(), ChatGate::NotInitialized);
    }
}
