//! Metadata tab: generate schema metadata, show its dashboard, download the file.

use std::path::{Path, PathBuf};

use schemaconsole_client::{ApiClient, suggested_file_name};
use schemaconsole_shared::{
    ConsoleError, DbConfig, MetadataRequest, MetadataResponse, OutputFormat, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::session::{METADATA_STATE, Session};

/// Placeholder for a missing dashboard value.
pub const MISSING: &str = "—";

/// Persisted state of the metadata tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataState {
    #[serde(default)]
    pub format: OutputFormat,
    pub result: MetadataResponse,
}

/// Build the generate request, filling blank db type and schema.
pub fn metadata_request(db: &DbConfig, format: OutputFormat) -> MetadataRequest {
    MetadataRequest {
        db: db.normalized(),
        output_format: format,
    }
}

/// Generate metadata and remember the result for the tab.
#[instrument(skip_all, fields(database = %db.database, %format))]
pub async fn generate(
    client: &ApiClient,
    session: &Session,
    db: &DbConfig,
    format: OutputFormat,
) -> Result<MetadataState> {
    let result = client.generate_metadata(&metadata_request(db, format)).await?;
    let state = MetadataState { format, result };
    session.put_json(METADATA_STATE, &state).await?;
    info!(saved_file = ?state.result.saved_file, "metadata generated");
    Ok(state)
}

/// The last generated metadata, if any.
pub async fn restore(session: &Session) -> Result<Option<MetadataState>> {
    session.load_json(METADATA_STATE).await
}

/// Download the backend's metadata file into `dir` (or to an explicit file path).
pub async fn download(client: &ApiClient, result: &MetadataResponse, dest: &Path) -> Result<PathBuf> {
    let saved = result
        .saved_file
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConsoleError::validation("metadata result has no saved file"))?;

    let target = resolve_destination(dest, saved, "metadata");
    client.download_metadata(saved, &target).await?;
    Ok(target)
}

/// If `dest` is a directory, append the backend file name.
pub(crate) fn resolve_destination(dest: &Path, saved_file: &str, fallback: &str) -> PathBuf {
    if dest.is_dir() {
        dest.join(suggested_file_name(saved_file).unwrap_or(fallback))
    } else {
        dest.to_path_buf()
    }
}

/// `generated_at` as `YYYY-MM-DD HH:MM:SS`.
pub fn format_generated_at(raw: &str) -> String {
    raw.chars().take(19).collect::<String>().replacen('T', " ", 1)
}

/// Labelled dashboard cards for a metadata result.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDashboard {
    pub entries: Vec<(&'static str, String)>,
}

impl From<&MetadataResponse> for MetadataDashboard {
    fn from(resp: &MetadataResponse) -> Self {
        let summary = resp.summary.clone().unwrap_or_default();
        Self {
            entries: vec![
                ("No of Tables", count(summary.table_count)),
                ("No of Columns", count(summary.column_count)),
                ("No of Relationships", count(summary.relationship_count)),
            ],
        }
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client_for, fixture, temp_session};
    use schemaconsole_shared::MetadataSummary;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn request_normalizes_blank_fields() {
        let db = DbConfig {
            db_type: String::new(),
            schema_name: String::new(),
            database: "employee".into(),
            ..DbConfig::default()
        };
        let req = metadata_request(&db, OutputFormat::Xlsx);
        assert_eq!(req.db.db_type, "postgres");
        assert_eq!(req.db.schema_name, "public");
        assert_eq!(req.output_format, OutputFormat::Xlsx);
    }

    #[test]
    fn generated_at_formatting() {
        assert_eq!(
            format_generated_at("2025-11-04T09:31:27.418203"),
            "2025-11-04 09:31:27"
        );
        assert_eq!(format_generated_at("2025-11-04"), "2025-11-04");
    }

    #[test]
    fn dashboard_uses_placeholder() {
        let resp = MetadataResponse {
            summary: Some(MetadataSummary {
                table_count: Some(4),
                column_count: None,
                relationship_count: Some(0),
            }),
            ..MetadataResponse::default()
        };
        let dash = MetadataDashboard::from(&resp);
        assert_eq!(
            dash.entries,
            vec![
                ("No of Tables", "4".to_string()),
                ("No of Columns", MISSING.to_string()),
                ("No of Relationships", "0".to_string()),
            ]
        );

        let empty = MetadataDashboard::from(&MetadataResponse::default());
        assert!(empty.entries.iter().all(|(_, v)| v == MISSING));
    }

    #[tokio::test]
    async fn generate_persists_and_restores() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/metadata/generate"))
            .and(body_partial_json(serde_json::json!({"output_format": "csv"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(fixture("metadata_response.json"), "application/json"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = temp_session().await;
        assert!(restore(&session).await.unwrap().is_none());

        let db = DbConfig {
            database: "employee".into(),
            ..DbConfig::default()
        };
        let state = generate(&client, &session, &db, OutputFormat::Csv).await.unwrap();
        let restored = restore(&session).await.unwrap().unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.result.tables_preview.len(), 4);
    }

    #[tokio::test]
    async fn download_into_directory_uses_backend_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/download"))
            .and(query_param("path", "outputs/metadata/metadata_employee.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let resp: MetadataResponse =
            serde_json::from_str(&fixture("metadata_response.json")).unwrap();
        let dir = std::env::temp_dir().join(format!("sc_meta_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let written = download(&client, &resp, &dir).await.unwrap();
        assert_eq!(written, dir.join("metadata_employee.json"));
        assert!(written.exists());

        let missing = download(&client, &MetadataResponse::default(), &dir).await;
        assert!(missing.is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
