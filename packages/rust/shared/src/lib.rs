//! Shared types, error model, and configuration for SchemaConsole.
//!
//! This crate is the foundation depended on by all other SchemaConsole crates.
//! It provides:
//! - [`ConsoleError`], the unified error type
//! - Backend DTOs ([`DbConfig`], [`MetadataResponse`], [`MappingResponse`], ...)
//! - Configuration ([`AppConfig`], config loading, secret resolution)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendConfig, MappingDefaults, MetadataDefaults, Neo4jDefaults, Nl2sqlDefaults,
    SourceDefaults, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_secret, session_db_path,
};
pub use error::{ConsoleError, Result};
pub use types::{
    AskRequest, AskResponse, ChatMessage, ColumnPreview, ConfigOptions, DbConfig, KgLoadRequest,
    KgLoadResponse, MappingDashboard, MappingDetails, MappingRequest, MappingResponse, MappingRow,
    MetadataRequest, MetadataResponse, MetadataSummary, MetricsSnapshot, Neo4jConfig,
    Neo4jPublicConfig, Nl2sqlChatRequest, Nl2sqlChatResponse, OutputFormat, RagInitRequest,
    RagInitResponse, SessionId, TablePreview,
};
