//! Typed HTTP client for the schema-intelligence backend.
//!
//! Every console screen talks to exactly one backend endpoint. This crate
//! wraps each of them in a method on [`ApiClient`] that serializes the
//! request DTO, sends a single request (no retry, no backoff), and maps
//! the outcome to the shared error model:
//!
//! - transport failures → [`ConsoleError::Network`]
//! - non-2xx statuses → [`ConsoleError::Api`], with FastAPI's `detail` extracted
//! - undecodable bodies → [`ConsoleError::Parse`]

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Response};
use schemaconsole_shared::{
    AskRequest, AskResponse, BackendConfig, ConfigOptions, ConsoleError, KgLoadRequest,
    KgLoadResponse, MappingRequest, MappingResponse, MetadataRequest, MetadataResponse,
    MetricsSnapshot, Nl2sqlChatRequest, Nl2sqlChatResponse, RagInitRequest, RagInitResponse,
    Result,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("SchemaConsole/", env!("CARGO_PKG_VERSION"));

/// Connect timeout, separate from the (long) request timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest error body echoed back into an error message.
const MAX_DETAIL_LEN: usize = 500;

// ---------------------------------------------------------------------------
// Endpoint paths
// ---------------------------------------------------------------------------

pub const METADATA_GENERATE: &str = "/metadata/generate";
pub const METADATA_DOWNLOAD: &str = "/metadata/download";
pub const MAPPING_HYBRID: &str = "/mapping/hybrid";
pub const MAPPING_DOWNLOAD: &str = "/mapping/download";
pub const KG_LOAD: &str = "/kg/load";
pub const RAG_INIT: &str = "/nlp-rag/init";
pub const RAG_ASK: &str = "/nlp-rag/ask";
pub const NL2SQL_CHAT: &str = "/nl2sql/chat";
pub const NL2SQL_METRICS: &str = "/nl2sql/metrics";
pub const NL2SQL_DOWNLOAD_METRICS: &str = "/nl2sql/download-metrics";
pub const NL2SQL_CONFIG: &str = "/nl2sql/config";

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Client for the backend REST API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    /// Build a client for the configured backend.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base = config.base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base).map_err(|e| {
            ConsoleError::config(format!("invalid backend URL '{}': {e}", config.base_url))
        })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConsoleError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base })
    }

    /// The backend base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{path}", self.base))
            .map_err(|e| ConsoleError::config(format!("invalid endpoint URL for {path}: {e}")))
    }

    fn download_url(&self, path: &str, file: &str) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut().append_pair("path", file);
        Ok(url)
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    /// `POST /metadata/generate`: introspect the source schema.
    #[instrument(skip_all, fields(database = %req.db.database, format = %req.output_format))]
    pub async fn generate_metadata(&self, req: &MetadataRequest) -> Result<MetadataResponse> {
        self.post_json(METADATA_GENERATE, req).await
    }

    /// Browser-style link for a generated metadata file.
    pub fn metadata_download_url(&self, saved_file: &str) -> Result<Url> {
        self.download_url(METADATA_DOWNLOAD, saved_file)
    }

    /// `GET /metadata/download?path=`: save the generated file to `dest`.
    pub async fn download_metadata(&self, saved_file: &str, dest: &Path) -> Result<u64> {
        let url = self.metadata_download_url(saved_file)?;
        self.download_to(METADATA_DOWNLOAD, url, dest).await
    }

    // -----------------------------------------------------------------------
    // Mapping
    // -----------------------------------------------------------------------

    /// `POST /mapping/hybrid`: propose source→target correspondences.
    #[instrument(skip_all, fields(
        source = %req.src_cfg.database,
        target = %req.tgt_cfg.database,
        min_confidence = req.min_confidence,
    ))]
    pub async fn run_hybrid_mapping(&self, req: &MappingRequest) -> Result<MappingResponse> {
        self.post_json(MAPPING_HYBRID, req).await
    }

    /// Browser-style link for a generated mapping file.
    pub fn mapping_download_url(&self, saved_file: &str) -> Result<Url> {
        self.download_url(MAPPING_DOWNLOAD, saved_file)
    }

    /// `GET /mapping/download?path=`: save the generated file to `dest`.
    pub async fn download_mapping(&self, saved_file: &str, dest: &Path) -> Result<u64> {
        let url = self.mapping_download_url(saved_file)?;
        self.download_to(MAPPING_DOWNLOAD, url, dest).await
    }

    // -----------------------------------------------------------------------
    // Knowledge graph + RAG
    // -----------------------------------------------------------------------

    /// `POST /kg/load`: populate Neo4j from the relational source.
    #[instrument(skip_all, fields(database = %req.pg.database, neo4j = %req.neo4j.uri))]
    pub async fn load_kg(&self, req: &KgLoadRequest) -> Result<KgLoadResponse> {
        self.post_json(KG_LOAD, req).await
    }

    /// `POST /nlp-rag/init`: bind a RAG session to the graph.
    #[instrument(skip_all, fields(session_id = %req.session_id))]
    pub async fn init_rag(&self, req: &RagInitRequest) -> Result<RagInitResponse> {
        self.post_json(RAG_INIT, req).await
    }

    /// `POST /nlp-rag/ask`: ask one question in an initialized session.
    #[instrument(skip_all, fields(session_id = %req.session_id))]
    pub async fn ask(&self, req: &AskRequest) -> Result<AskResponse> {
        self.post_json(RAG_ASK, req).await
    }

    // -----------------------------------------------------------------------
    // NL2SQL
    // -----------------------------------------------------------------------

    /// `POST /nl2sql/chat`: conversational NL→SQL turn.
    #[instrument(skip_all, fields(
        client_id = %req.client_id,
        agent = %req.agent_name,
        history = req.history.len(),
    ))]
    pub async fn nl2sql_chat(&self, req: &Nl2sqlChatRequest) -> Result<Nl2sqlChatResponse> {
        self.post_json(NL2SQL_CHAT, req).await
    }

    /// `GET /nl2sql/metrics`: aggregated query statistics.
    pub async fn nl2sql_metrics(&self) -> Result<MetricsSnapshot> {
        self.get_json(NL2SQL_METRICS).await
    }

    /// `GET /nl2sql/download-metrics`: save the metrics summary file.
    pub async fn download_metrics(&self, dest: &Path) -> Result<u64> {
        let url = self.endpoint(NL2SQL_DOWNLOAD_METRICS)?;
        self.download_to(NL2SQL_DOWNLOAD_METRICS, url, dest).await
    }

    /// `GET /nl2sql/config`: client ids, agents and models to choose from.
    pub async fn nl2sql_config(&self) -> Result<ConfigOptions> {
        self.get_json(NL2SQL_CONFIG).await
    }

    // -----------------------------------------------------------------------
    // Transport helpers
    // -----------------------------------------------------------------------

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ConsoleError::Network(format!("{path}: {e}")))?;
        read_json(path, response).await
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ConsoleError::Network(format!("{path}: {e}")))?;
        read_json(path, response).await
    }

    async fn download_to(&self, endpoint: &str, url: Url, dest: &Path) -> Result<u64> {
        debug!(%url, "GET (download)");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ConsoleError::Network(format!("{endpoint}: {e}")))?;

        let response = check_status(endpoint, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConsoleError::Network(format!("{endpoint}: failed to read body: {e}")))?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConsoleError::io(parent, e))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| ConsoleError::io(dest, e))?;

        info!(dest = %dest.display(), bytes = bytes.len(), "downloaded file");
        Ok(bytes.len() as u64)
    }
}

/// Last path component of a backend-side file path, for naming local copies.
pub fn suggested_file_name(saved_file: &str) -> Option<&str> {
    saved_file
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}

async fn read_json<R: DeserializeOwned>(endpoint: &str, response: Response) -> Result<R> {
    let response = check_status(endpoint, response).await?;
    let body = response
        .text()
        .await
        .map_err(|e| ConsoleError::Network(format!("{endpoint}: failed to read body: {e}")))?;

    serde_json::from_str(&body)
        .map_err(|e| ConsoleError::parse(format!("{endpoint}: unexpected response shape: {e}")))
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    warn!(endpoint, status = status.as_u16(), %detail, "backend returned an error");
    Err(ConsoleError::Api {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
        detail,
    })
}

/// Pull a human-readable message out of an error body.
///
/// FastAPI reports `{"detail": "..."}` for raised HTTP errors and
/// `{"detail": [ {...}, ... ]}` for validation failures.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let text = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => trimmed.to_string(),
        },
        _ => trimmed.to_string(),
    };

    Some(truncate(&text, MAX_DETAIL_LEN))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
