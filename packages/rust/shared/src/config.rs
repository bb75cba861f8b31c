//! Application configuration for SchemaConsole.
//!
//! User config lives at `~/.schemaconsole/schemaconsole.toml`.
//! CLI flags override config file values, which override defaults.
//! Passwords are never written to the file: each section names the
//! environment variable that holds its secret.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};
use crate::types::{DbConfig, Neo4jConfig, OutputFormat};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "schemaconsole.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".schemaconsole";

/// Session database file name inside the config directory.
const SESSION_DB_NAME: &str = "session.db";

// ---------------------------------------------------------------------------
// Config structs (matching schemaconsole.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend service location.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Default source database form values.
    #[serde(default)]
    pub source: SourceDefaults,

    /// Default Neo4j form values.
    #[serde(default)]
    pub neo4j: Neo4jDefaults,

    /// Hybrid mapping defaults.
    #[serde(default)]
    pub mapping: MappingDefaults,

    /// Metadata generation defaults.
    #[serde(default)]
    pub metadata: MetadataDefaults,

    /// NL2SQL chat defaults.
    #[serde(default)]
    pub nl2sql: Nl2sqlDefaults,
}

/// `[backend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the schema-intelligence backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds. Mapping and KG loads can run for minutes.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_timeout_secs() -> u64 {
    600
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefaults {
    #[serde(default = "default_db_type")]
    pub db_type: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default = "default_pg_user")]
    pub username: String,
    #[serde(default = "default_schema")]
    pub schema_name: String,
    /// Name of the env var holding the source password.
    #[serde(default = "default_pg_password_env")]
    pub password_env: String,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            host: default_host(),
            port: default_pg_port(),
            database: String::new(),
            username: default_pg_user(),
            schema_name: default_schema(),
            password_env: default_pg_password_env(),
        }
    }
}

impl SourceDefaults {
    /// Build a form-ready [`DbConfig`], pulling the password from the environment.
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            db_type: self.db_type.clone(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            username: self.username.clone(),
            password: resolve_secret(&self.password_env).unwrap_or_default(),
            schema_name: self.schema_name.clone(),
        }
    }
}

fn default_db_type() -> String {
    "postgres".into()
}
fn default_host() -> String {
    "localhost".into()
}
fn default_pg_port() -> u16 {
    5432
}
fn default_pg_user() -> String {
    "postgres".into()
}
fn default_schema() -> String {
    "public".into()
}
fn default_pg_password_env() -> String {
    "SCHEMACONSOLE_PG_PASSWORD".into()
}

/// `[neo4j]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jDefaults {
    #[serde(default = "default_neo4j_uri")]
    pub uri: String,
    #[serde(default = "default_neo4j_user")]
    pub user: String,
    /// Database name passed to the RAG initializer.
    #[serde(default = "default_neo4j_database")]
    pub database: String,
    /// Name of the env var holding the Neo4j password.
    #[serde(default = "default_neo4j_password_env")]
    pub password_env: String,
}

impl Default for Neo4jDefaults {
    fn default() -> Self {
        Self {
            uri: default_neo4j_uri(),
            user: default_neo4j_user(),
            database: default_neo4j_database(),
            password_env: default_neo4j_password_env(),
        }
    }
}

impl Neo4jDefaults {
    /// Build a form-ready [`Neo4jConfig`], pulling the password from the environment.
    pub fn to_neo4j_config(&self) -> Neo4jConfig {
        Neo4jConfig {
            uri: self.uri.clone(),
            user: self.user.clone(),
            password: resolve_secret(&self.password_env).unwrap_or_default(),
        }
    }
}

fn default_neo4j_uri() -> String {
    "bolt://localhost:7687".into()
}
fn default_neo4j_user() -> String {
    "neo4j".into()
}
fn default_neo4j_database() -> String {
    "neo4j".into()
}
fn default_neo4j_password_env() -> String {
    "SCHEMACONSOLE_NEO4J_PASSWORD".into()
}

/// `[mapping]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDefaults {
    #[serde(default = "default_qdrant_host")]
    pub qdrant_host: String,
    #[serde(default = "default_qdrant_port")]
    pub qdrant_port: u16,
    #[serde(default = "default_top_k_dense")]
    pub top_k_dense: u32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Name of the env var holding the target database password.
    #[serde(default = "default_target_password_env")]
    pub target_password_env: String,
}

impl Default for MappingDefaults {
    fn default() -> Self {
        Self {
            qdrant_host: default_qdrant_host(),
            qdrant_port: default_qdrant_port(),
            top_k_dense: default_top_k_dense(),
            min_confidence: default_min_confidence(),
            output_format: OutputFormat::default(),
            target_password_env: default_target_password_env(),
        }
    }
}

fn default_qdrant_host() -> String {
    "localhost".into()
}
fn default_qdrant_port() -> u16 {
    6333
}
fn default_top_k_dense() -> u32 {
    5
}
fn default_min_confidence() -> f64 {
    0.5
}
fn default_target_password_env() -> String {
    "SCHEMACONSOLE_TARGET_PASSWORD".into()
}

/// `[metadata]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataDefaults {
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// `[nl2sql]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nl2sqlDefaults {
    /// Client config id known to the backend (see `/nl2sql/config`).
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

impl Default for Nl2sqlDefaults {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            agent_name: default_agent_name(),
            model_name: default_model_name(),
        }
    }
}

fn default_agent_name() -> String {
    "Conversational Agent".into()
}
fn default_model_name() -> String {
    "llama-3.3-70b-versatile".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.schemaconsole/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ConsoleError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.schemaconsole/schemaconsole.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the path to the session database (`~/.schemaconsole/session.db`).
pub fn session_db_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(SESSION_DB_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConsoleError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ConsoleError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ConsoleError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ConsoleError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConsoleError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the named environment variable.
///
/// Returns `None` when the variable is unset or empty.
pub fn resolve_secret(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("SCHEMACONSOLE_PG_PASSWORD"));
        assert!(!toml_str.contains("password ="));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.backend.base_url, "http://localhost:8000");
        assert_eq!(parsed.mapping.qdrant_port, 6333);
        assert_eq!(parsed.mapping.top_k_dense, 5);
        assert_eq!(parsed.neo4j.database, "neo4j");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[backend]
base_url = "http://schema-intel.internal:9000"

[source]
database = "employee"

[mapping]
output_format = "xlsx"
min_confidence = 0.65
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.backend.base_url, "http://schema-intel.internal:9000");
        assert_eq!(config.backend.timeout_secs, 600);
        assert_eq!(config.source.database, "employee");
        assert_eq!(config.source.schema_name, "public");
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.mapping.output_format, OutputFormat::Xlsx);
        assert!((config.mapping.min_confidence - 0.65).abs() < f64::EPSILON);
        assert_eq!(config.nl2sql.agent_name, "Conversational Agent");
    }

    #[test]
    fn source_defaults_build_db_config() {
        let mut source = SourceDefaults::default();
        // Use a unique env var name to avoid interfering with other tests
        source.password_env = "SC_TEST_NONEXISTENT_PASSWORD_12345".into();
        source.database = "hr".into();
        let db = source.to_db_config();
        assert_eq!(db.database, "hr");
        assert_eq!(db.db_type, "postgres");
        assert!(db.password.is_empty());
    }

    #[test]
    fn missing_secret_resolves_to_none() {
        assert!(resolve_secret("SC_TEST_NONEXISTENT_SECRET_98765").is_none());
    }
}
