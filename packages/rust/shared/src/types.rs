//! Request/response types mirroring the schema-intelligence backend contracts.
//!
//! The backend owns these shapes; the console only mirrors them for display.
//! Optional response fields are tolerated as absent so that older or newer
//! backend revisions still deserialize.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ConsoleError;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for RAG session identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// File format the backend writes for metadata and mapping results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Xlsx,
}

impl OutputFormat {
    /// All formats in menu order.
    pub const ALL: [OutputFormat; 3] = [Self::Csv, Self::Json, Self::Xlsx];

    /// File extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
        }
    }

    /// The next format in menu order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Csv => Self::Json,
            Self::Json => Self::Xlsx,
            Self::Xlsx => Self::Csv,
        }
    }

    /// The previous format in menu order, wrapping around.
    pub fn prev(self) -> Self {
        match self {
            Self::Csv => Self::Xlsx,
            Self::Json => Self::Csv,
            Self::Xlsx => Self::Json,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(ConsoleError::validation(format!(
                "unknown output format '{other}': expected csv, json, or xlsx"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection configs
// ---------------------------------------------------------------------------

/// Relational database connection form.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub schema_name: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_type: "postgres".into(),
            host: "localhost".into(),
            port: 5432,
            database: String::new(),
            username: "postgres".into(),
            password: String::new(),
            schema_name: "public".into(),
        }
    }
}

impl DbConfig {
    /// Fill blank `db_type` / `schema_name` with the backend's defaults.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.db_type.trim().is_empty() {
            cfg.db_type = "postgres".into();
        }
        if cfg.schema_name.trim().is_empty() {
            cfg.schema_name = "public".into();
        }
        cfg
    }

    /// Copy with the password blanked, safe to persist.
    pub fn without_password(&self) -> Self {
        Self {
            password: String::new(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("schema_name", &self.schema_name)
            .finish()
    }
}

/// Neo4j connection form.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: String::new(),
        }
    }
}

impl Neo4jConfig {
    /// The password-free subset kept in session storage.
    pub fn public(&self) -> Neo4jPublicConfig {
        Neo4jPublicConfig {
            uri: self.uri.clone(),
            user: self.user.clone(),
        }
    }
}

impl fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Neo4j location without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neo4jPublicConfig {
    pub uri: String,
    pub user: String,
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Body of `POST /metadata/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRequest {
    #[serde(flatten)]
    pub db: DbConfig,
    pub output_format: OutputFormat,
}

/// Aggregate counts reported by the metadata job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSummary {
    #[serde(default)]
    pub table_count: Option<u64>,
    #[serde(default)]
    pub column_count: Option<u64>,
    #[serde(default)]
    pub relationship_count: Option<u64>,
}

/// One table in the metadata preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePreview {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub column_count: u64,
}

/// One column in the metadata preview (first few columns per table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPreview {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

/// Response of `POST /metadata/generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataResponse {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub summary: Option<MetadataSummary>,
    #[serde(default)]
    pub tables_preview: Vec<TablePreview>,
    #[serde(default)]
    pub columns_preview: Vec<ColumnPreview>,
    #[serde(default)]
    pub saved_file: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Body of `POST /mapping/hybrid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRequest {
    pub src_cfg: DbConfig,
    pub tgt_cfg: DbConfig,
    pub qdrant_host: String,
    pub qdrant_port: u16,
    pub top_k_dense: u32,
    pub output_format: OutputFormat,
    pub min_confidence: f64,
}

/// Headline numbers of a mapping run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDashboard {
    #[serde(default)]
    pub source_tables: Option<u64>,
    #[serde(default)]
    pub target_tables: Option<u64>,
    #[serde(default)]
    pub matched_tables: Option<u64>,
    #[serde(default)]
    pub matched_columns: Option<u64>,
    #[serde(default)]
    pub avg_confidence_score: Option<f64>,
}

/// One proposed correspondence. Columns are backend-defined and kept in
/// the order the backend sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingRow(pub Map<String, Value>);

impl MappingRow {
    /// Column names in backend order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Display text of a cell: strings verbatim, null/missing as empty,
    /// anything else as compact JSON.
    pub fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Overwrite a cell with a string value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), Value::String(value.into()));
    }
}

/// `details` object of a mapping response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDetails {
    #[serde(default)]
    pub dashboard: Option<MappingDashboard>,
    #[serde(default)]
    pub all_rows: Vec<MappingRow>,
}

/// Response of `POST /mapping/hybrid`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingResponse {
    #[serde(default)]
    pub details: Option<MappingDetails>,
    #[serde(default)]
    pub saved_file: Option<String>,
    #[serde(default)]
    pub table_match_count: Option<u64>,
    #[serde(default)]
    pub column_match_count: Option<u64>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

impl MappingResponse {
    /// Rows from `details.all_rows`, or empty.
    pub fn rows(&self) -> &[MappingRow] {
        self.details
            .as_ref()
            .map(|d| d.all_rows.as_slice())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Knowledge graph + RAG
// ---------------------------------------------------------------------------

/// Body of `POST /kg/load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KgLoadRequest {
    pub pg: DbConfig,
    pub neo4j: Neo4jConfig,
}

/// Response of `POST /kg/load`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KgLoadResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub neo4j_database: Option<String>,
    #[serde(default)]
    pub tables_loaded: Option<u64>,
    #[serde(default)]
    pub rows_loaded: Option<u64>,
    #[serde(default)]
    pub relationships_created: Option<u64>,
}

/// Body of `POST /nlp-rag/init`.
#[derive(Clone, Serialize, Deserialize)]
pub struct RagInitRequest {
    pub session_id: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,
}

impl fmt::Debug for RagInitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagInitRequest")
            .field("session_id", &self.session_id)
            .field("neo4j_uri", &self.neo4j_uri)
            .field("neo4j_user", &self.neo4j_user)
            .field("neo4j_password", &"<redacted>")
            .field("neo4j_database", &self.neo4j_database)
            .finish()
    }
}

/// Response of `POST /nlp-rag/init`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagInitResponse {
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `POST /nlp-rag/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub session_id: String,
    pub question: String,
}

/// Response of `POST /nlp-rag/ask`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl AskResponse {
    /// The answer as display text, if the backend produced one.
    pub fn answer(&self) -> Option<String> {
        match self.result.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// NL2SQL
// ---------------------------------------------------------------------------

/// A single message in an NL2SQL conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Body of `POST /nl2sql/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nl2sqlChatRequest {
    pub user_message: String,
    pub history: Vec<ChatMessage>,
    pub client_id: String,
    pub agent_name: String,
    pub model_name: String,
}

/// Response of `POST /nl2sql/chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nl2sqlChatResponse {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub chart_suggestion: Option<String>,
    #[serde(default)]
    pub dataframe: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub full_history: Option<Vec<ChatMessage>>,
}

/// Response of `GET /nl2sql/config`: dropdown choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOptions {
    #[serde(default)]
    pub client_ids: Vec<String>,
    #[serde(default)]
    pub agent_types: Vec<String>,
    #[serde(default)]
    pub model_names: Vec<String>,
}

/// Response of `GET /nl2sql/metrics`: aggregated query statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub total_queries: Option<u64>,
    #[serde(default)]
    pub successful: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub total_tokens: Option<Value>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub avg_latency_ms: Option<f64>,
    #[serde(default)]
    pub avg_confidence: Option<f64>,
    #[serde(default)]
    pub queries_needing_retry: Option<u64>,
    #[serde(default)]
    pub avg_retries: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().expect("parse SessionId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(" xlsx ".parse::<OutputFormat>().unwrap(), OutputFormat::Xlsx);
        assert!("parquet".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Xlsx.next(), OutputFormat::Csv);
        assert_eq!(OutputFormat::Csv.prev(), OutputFormat::Xlsx);
        assert_eq!(
            serde_json::to_value(OutputFormat::Json).unwrap(),
            Value::String("json".into())
        );
    }

    #[test]
    fn metadata_request_is_flat() {
        let req = MetadataRequest {
            db: DbConfig {
                database: "employee".into(),
                password: "s3cret".into(),
                ..DbConfig::default()
            },
            output_format: OutputFormat::Json,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["database"], "employee");
        assert_eq!(json["port"], 5432);
        assert_eq!(json["schema_name"], "public");
        assert_eq!(json["output_format"], "json");
        assert!(json.get("db").is_none());
    }

    #[test]
    fn debug_redacts_passwords() {
        let db = DbConfig {
            password: "hunter2".into(),
            ..DbConfig::default()
        };
        let neo = Neo4jConfig {
            password: "hunter3".into(),
            ..Neo4jConfig::default()
        };
        assert!(!format!("{db:?}").contains("hunter2"));
        assert!(!format!("{neo:?}").contains("hunter3"));
    }

    #[test]
    fn normalized_fills_blank_defaults() {
        let db = DbConfig {
            db_type: String::new(),
            schema_name: " ".into(),
            ..DbConfig::default()
        };
        let n = db.normalized();
        assert_eq!(n.db_type, "postgres");
        assert_eq!(n.schema_name, "public");
    }

    #[test]
    fn mapping_row_preserves_column_order() {
        let json = r#"{"source_table":"emp","source_column":"id","target_table":"staff","best_match_column":"staff_id","confidence":0.91}"#;
        let row: MappingRow = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = row.keys().collect();
        assert_eq!(
            keys,
            ["source_table", "source_column", "target_table", "best_match_column", "confidence"]
        );
        assert_eq!(row.text("confidence"), "0.91");
        assert_eq!(row.text("missing"), "");
    }

    #[test]
    fn ask_response_answer_text() {
        let r: AskResponse = serde_json::from_str(r#"{"question":"q","result":"42 incidents"}"#).unwrap();
        assert_eq!(r.answer().as_deref(), Some("42 incidents"));

        let r: AskResponse = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert!(r.answer().is_none());

        let r: AskResponse = serde_json::from_str(r#"{"result":{"count":3}}"#).unwrap();
        assert!(r.answer().unwrap().contains("\"count\": 3"));
    }

    #[test]
    fn metadata_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/metadata_response.json")
            .expect("read fixture");
        let parsed: MetadataResponse =
            serde_json::from_str(&fixture).expect("deserialize metadata fixture");
        let summary = parsed.summary.expect("summary");
        assert_eq!(summary.table_count, Some(4));
        assert_eq!(parsed.tables_preview.len(), 4);
        assert_eq!(parsed.columns_preview.len(), 6);
    }

    #[test]
    fn mapping_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/mapping_response.json")
            .expect("read fixture");
        let parsed: MappingResponse =
            serde_json::from_str(&fixture).expect("deserialize mapping fixture");
        assert_eq!(parsed.rows().len(), 4);
        let dash = parsed.details.unwrap().dashboard.unwrap();
        assert_eq!(dash.matched_columns, Some(4));
    }
}
