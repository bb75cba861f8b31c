//! Connect workflow: source DB + Neo4j form → validated, KG-loaded session.
//!
//! 1. Validate the source database by generating JSON metadata
//! 2. Create or reuse the RAG session id
//! 3. Load the knowledge graph
//! 4. Initialize the RAG session against Neo4j
//! 5. Persist the password-free handoff state

use std::time::Instant;

use schemaconsole_client::ApiClient;
use schemaconsole_shared::{
    AppConfig, ConsoleError, DbConfig, KgLoadRequest, KgLoadResponse, MetadataResponse,
    Neo4jConfig, OutputFormat, RagInitRequest, Result,
};
use tracing::{error, info, instrument};

use crate::metadata;
use crate::session::Session;

/// Message shown for any failed connect attempt.
pub const CONNECT_FAILED: &str = "Unable to connect. Please verify credentials.";

/// The connect page form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectForm {
    pub pg: DbConfig,
    pub neo4j: Neo4jConfig,
    /// Neo4j database name handed to the RAG initializer.
    pub neo4j_database: String,
}

impl ConnectForm {
    /// Prefill from config defaults; passwords come from the configured env vars.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pg: config.source.to_db_config(),
            neo4j: config.neo4j.to_neo4j_config(),
            neo4j_database: config.neo4j.database.clone(),
        }
    }

    /// Names of required fields that are still blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.pg.database.trim().is_empty() {
            missing.push("database");
        }
        if self.neo4j.uri.trim().is_empty() {
            missing.push("neo4j uri");
        }
        if self.neo4j.user.trim().is_empty() {
            missing.push("neo4j user");
        }
        if self.neo4j.password.is_empty() {
            missing.push("neo4j password");
        }
        missing
    }

    pub fn can_connect(&self) -> bool {
        self.missing_fields().is_empty()
    }

    fn rag_database(&self) -> &str {
        match self.neo4j_database.trim() {
            "" => "neo4j",
            name => name,
        }
    }
}

/// What a successful connect produced.
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    pub session_id: String,
    pub metadata: MetadataResponse,
    pub kg: KgLoadResponse,
    pub elapsed: std::time::Duration,
}

/// Progress callback for the connect workflow.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new step.
    fn phase(&self, name: &str);
    /// Called when the workflow completes.
    fn done(&self, outcome: &ConnectOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &ConnectOutcome) {}
}

/// Run the connect workflow.
///
/// Every failure is logged with its cause and surfaced as [`CONNECT_FAILED`].
#[instrument(skip_all, fields(database = %form.pg.database, neo4j = %form.neo4j.uri))]
pub async fn connect(
    client: &ApiClient,
    session: &Session,
    form: &ConnectForm,
    progress: &dyn ProgressReporter,
) -> Result<ConnectOutcome> {
    if !form.can_connect() {
        return Err(ConsoleError::validation(format!(
            "missing required fields: {}",
            form.missing_fields().join(", ")
        )));
    }

    match run_steps(client, session, form, progress).await {
        Ok(outcome) => {
            progress.done(&outcome);
            Ok(outcome)
        }
        Err(e) => {
            error!(error = %e, "connect failed");
            Err(ConsoleError::Session(CONNECT_FAILED.into()))
        }
    }
}

async fn run_steps(
    client: &ApiClient,
    session: &Session,
    form: &ConnectForm,
    progress: &dyn ProgressReporter,
) -> Result<ConnectOutcome> {
    let start = Instant::now();
    let pg = form.pg.normalized();

    progress.phase("Validating source database");
    let metadata = client
        .generate_metadata(&metadata::metadata_request(&pg, OutputFormat::Json))
        .await?;

    progress.phase("Preparing session");
    let session_id = session.session_id_or_create().await?;

    progress.phase("Loading knowledge graph");
    let kg = client
        .load_kg(&KgLoadRequest {
            pg: pg.clone(),
            neo4j: form.neo4j.clone(),
        })
        .await?;

    progress.phase("Initializing RAG session");
    client
        .init_rag(&RagInitRequest {
            session_id: session_id.clone(),
            neo4j_uri: form.neo4j.uri.clone(),
            neo4j_user: form.neo4j.user.clone(),
            neo4j_password: form.neo4j.password.clone(),
            neo4j_database: form.rag_database().to_string(),
        })
        .await?;

    progress.phase("Saving session");
    session.mark_kg_ready(&form.neo4j).await?;
    session.save_source(&pg).await?;

    let outcome = ConnectOutcome {
        session_id,
        metadata,
        kg,
        elapsed: start.elapsed(),
    };
    info!(
        session_id = %outcome.session_id,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "connected"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::session::ChatGate;
    use crate::testutil::{client_for, fixture, temp_session};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<String>>);

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.0.lock().unwrap().push(name.to_string());
        }
        fn done(&self, _outcome: &ConnectOutcome) {
            self.0.lock().unwrap().push("done".into());
        }
    }

    fn form() -> ConnectForm {
        ConnectForm {
            pg: DbConfig {
                database: "employee".into(),
                password: "pg-pass".into(),
                ..DbConfig::default()
            },
            neo4j: Neo4jConfig {
                password: "neo-pass".into(),
                ..Neo4jConfig::default()
            },
            neo4j_database: String::new(),
        }
    }

    async fn mount_happy_backend(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/metadata/generate"))
            .and(body_partial_json(serde_json::json!({"output_format": "json"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(fixture("metadata_response.json"), "application/json"),
            )
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/kg/load"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "success"})),
            )
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/nlp-rag/init"))
            .and(body_partial_json(serde_json::json!({"neo4j_database": "neo4j"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn can_connect_requires_fields() {
        let mut f = form();
        assert!(f.can_connect());

        f.neo4j.password.clear();
        assert!(!f.can_connect());
        assert_eq!(f.missing_fields(), ["neo4j password"]);

        let blank = ConnectForm::default();
        assert_eq!(
            blank.missing_fields(),
            ["database", "neo4j password"],
            "uri and user have defaults"
        );
    }

    #[tokio::test]
    async fn connect_runs_all_steps_and_opens_gate() {
        let server = MockServer::start().await;
        mount_happy_backend(&server).await;

        let client = client_for(&server);
        let session = temp_session().await;
        let progress = RecordingProgress::default();

        let outcome = connect(&client, &session, &form(), &progress).await.unwrap();
        assert_eq!(outcome.metadata.database.as_deref(), Some("employee"));
        assert_eq!(outcome.kg.status.as_deref(), Some("success"));

        let phases = progress.0.lock().unwrap().clone();
        assert_eq!(phases.len(), 6);
        assert_eq!(phases.last().map(String::as_str), Some("done"));

        match session.chat_gate().await.unwrap() {
            ChatGate::Ready { session_id, .. } => assert_eq!(session_id, outcome.session_id),
            ChatGate::NotInitialized => panic!("gate should be ready"),
        }
        let source = session.source().await.unwrap().unwrap();
        assert!(source.password.is_empty());
    }

    #[tokio::test]
    async fn failure_surfaces_generic_message_and_keeps_gate_closed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/metadata/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/kg/load"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"detail": "neo4j auth failed"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = temp_session().await;
        let err = connect(&client, &session, &form(), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), format!("session error: {CONNECT_FAILED}"));
        assert!(!session.chat_gate().await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn incomplete_form_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = temp_session().await;
        let err = connect(&client, &session, &ConnectForm::default(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Validation { .. }));
    }
}
