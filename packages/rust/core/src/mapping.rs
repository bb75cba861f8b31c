//! Mapping tab: run hybrid mapping, review and edit the proposed rows,
//! then export them.
//!
//! Edits go through [`MappingSheet`]. Any edit marks the sheet unsaved and
//! export is refused until it is saved again, mirroring the
//! "Save Changes" then "Download" flow.

use std::fmt;
use std::path::{Path, PathBuf};

use schemaconsole_client::ApiClient;
use schemaconsole_shared::{
    AppConfig, ConsoleError, DbConfig, MappingDashboard, MappingRequest, MappingResponse,
    MappingRow, OutputFormat, Result,
};
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::metadata::{MISSING, resolve_destination};
use crate::session::{MAPPING_STATE, Session};

/// Columns the user may change, each restricted to values already present.
pub const EDITABLE_COLUMNS: [&str; 2] = ["target_table", "best_match_column"];

const XLSX_SHEET: &str = "Mapping";

// ---------------------------------------------------------------------------
// Options + request
// ---------------------------------------------------------------------------

/// Tuning knobs for a mapping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingOptions {
    pub format: OutputFormat,
    pub min_confidence: f64,
    pub qdrant_host: String,
    pub qdrant_port: u16,
    pub top_k_dense: u32,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl MappingOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            format: config.mapping.output_format,
            min_confidence: config.mapping.min_confidence,
            qdrant_host: config.mapping.qdrant_host.clone(),
            qdrant_port: config.mapping.qdrant_port,
            top_k_dense: config.mapping.top_k_dense,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConsoleError::validation(format!(
                "min confidence must be between 0 and 1, got {}",
                self.min_confidence
            )));
        }
        if self.top_k_dense == 0 {
            return Err(ConsoleError::validation("top_k_dense must be at least 1"));
        }
        Ok(())
    }
}

/// Build the hybrid mapping request.
pub fn mapping_request(src: &DbConfig, tgt: &DbConfig, opts: &MappingOptions) -> MappingRequest {
    MappingRequest {
        src_cfg: src.normalized(),
        tgt_cfg: tgt.normalized(),
        qdrant_host: opts.qdrant_host.clone(),
        qdrant_port: opts.qdrant_port,
        top_k_dense: opts.top_k_dense,
        output_format: opts.format,
        min_confidence: opts.min_confidence,
    }
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Everything the mapping tab restores on return. The target password is
/// blanked before it gets here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingState {
    pub options: MappingOptions,
    pub target: DbConfig,
    pub result: MappingResponse,
    pub sheet: MappingSheet,
}

/// Run hybrid mapping and persist the fresh sheet.
#[instrument(skip_all, fields(source = %src.database, target = %tgt.database))]
pub async fn run(
    client: &ApiClient,
    session: &Session,
    src: &DbConfig,
    tgt: &DbConfig,
    opts: &MappingOptions,
) -> Result<MappingState> {
    opts.validate()?;
    let result = client
        .run_hybrid_mapping(&mapping_request(src, tgt, opts))
        .await?;

    let state = MappingState {
        options: opts.clone(),
        target: tgt.without_password(),
        sheet: MappingSheet::new(result.rows().to_vec()),
        result,
    };
    info!(rows = state.sheet.len(), "mapping generated");
    persist(session, &state).await?;
    Ok(state)
}

/// Save the state if it has rows. An empty sheet leaves the previous state alone.
pub async fn persist(session: &Session, state: &MappingState) -> Result<()> {
    if state.sheet.is_empty() {
        return Ok(());
    }
    let safe = MappingState {
        target: state.target.without_password(),
        ..state.clone()
    };
    session.put_json(MAPPING_STATE, &safe).await
}

/// The last mapping state; unreadable state is discarded.
pub async fn restore(session: &Session) -> Result<Option<MappingState>> {
    session.load_json(MAPPING_STATE).await
}

/// Download the backend's own mapping file.
pub async fn download(client: &ApiClient, result: &MappingResponse, dest: &Path) -> Result<PathBuf> {
    let saved = result
        .saved_file
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConsoleError::validation("mapping result has no saved file"))?;

    let target = resolve_destination(dest, saved, "mapping");
    client.download_mapping(saved, &target).await?;
    Ok(target)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Labelled dashboard cards for a mapping result. Empty when the backend
/// sent no dashboard.
pub fn dashboard_entries(result: &MappingResponse) -> Vec<(&'static str, String)> {
    let Some(d) = result.details.as_ref().and_then(|d| d.dashboard.as_ref()) else {
        return Vec::new();
    };
    dashboard_from(d)
}

fn dashboard_from(d: &MappingDashboard) -> Vec<(&'static str, String)> {
    let count = |v: Option<u64>| v.map_or_else(|| MISSING.to_string(), |v| v.to_string());
    vec![
        ("Source Tables", count(d.source_tables)),
        ("Target Tables", count(d.target_tables)),
        ("Matched Tables", count(d.matched_tables)),
        ("Matched Columns", count(d.matched_columns)),
        (
            "Avg Confidence",
            d.avg_confidence_score
                .map_or_else(|| MISSING.to_string(), |v| v.to_string()),
        ),
    ]
}

// ---------------------------------------------------------------------------
// Sheet
// ---------------------------------------------------------------------------

/// Editable mapping rows plus the saved flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSheet {
    rows: Vec<MappingRow>,
    saved: bool,
}

impl MappingSheet {
    pub fn new(rows: Vec<MappingRow>) -> Self {
        Self { rows, saved: false }
    }

    pub fn rows(&self) -> &[MappingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Column headers, taken from the first row.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|r| r.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn target_table_options(&self) -> Vec<String> {
        self.distinct("target_table")
    }

    pub fn best_match_column_options(&self) -> Vec<String> {
        self.distinct("best_match_column")
    }

    /// Allowed values for an editable column.
    pub fn options_for(&self, column: &str) -> Option<Vec<String>> {
        match column {
            "target_table" => Some(self.target_table_options()),
            "best_match_column" => Some(self.best_match_column_options()),
            _ => None,
        }
    }

    /// Distinct non-empty values of `key`, in first-seen order.
    fn distinct(&self, key: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            let value = row.text(key);
            if !value.is_empty() && !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }

    /// Change one cell. Marks the sheet unsaved.
    pub fn update_row(&mut self, index: usize, column: &str, value: &str) -> Result<()> {
        let options = self.options_for(column).ok_or_else(|| {
            ConsoleError::validation(format!(
                "column '{column}' is not editable (editable: {})",
                EDITABLE_COLUMNS.join(", ")
            ))
        })?;
        if !options.iter().any(|o| o == value) {
            return Err(ConsoleError::validation(format!(
                "'{value}' is not a known {column}; choose one of: {}",
                options.join(", ")
            )));
        }
        let len = self.rows.len();
        let row = self.rows.get_mut(index).ok_or_else(|| {
            ConsoleError::validation(format!("row {index} out of range (0..{len})"))
        })?;

        row.set(column, value);
        self.saved = false;
        Ok(())
    }

    /// Accept the current edits, enabling export.
    pub fn save(&mut self) {
        self.saved = true;
    }

    /// Serialize the rows for download.
    pub fn export(&self, format: OutputFormat) -> Result<Vec<u8>> {
        if !self.saved {
            return Err(ConsoleError::validation(
                "save your changes before downloading",
            ));
        }
        if self.rows.is_empty() {
            return Err(ConsoleError::validation("there are no mapping rows to export"));
        }

        match format {
            OutputFormat::Csv => self.to_csv(),
            OutputFormat::Json => serde_json::to_vec_pretty(&self.rows)
                .map_err(|e| ConsoleError::parse(format!("failed to encode mapping rows: {e}"))),
            OutputFormat::Xlsx => self.to_xlsx(),
        }
    }

    /// One "Mapping" worksheet: header row, then cells in `columns()` order.
    /// Numbers and booleans keep their type; nulls are left blank.
    fn to_xlsx(&self) -> Result<Vec<u8>> {
        let columns = self.columns();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(XLSX_SHEET).map_err(xlsx_err)?;

        for (c, name) in columns.iter().enumerate() {
            sheet.write_string(0, xlsx_col(c)?, name).map_err(xlsx_err)?;
        }
        for (r, row) in self.rows.iter().enumerate() {
            let r = u32::try_from(r + 1)
                .map_err(|_| ConsoleError::validation("too many rows for an xlsx sheet"))?;
            for (c, name) in columns.iter().enumerate() {
                let c = xlsx_col(c)?;
                match row.0.get(name) {
                    None | Some(Value::Null) => {}
                    Some(Value::Bool(b)) => {
                        sheet.write_boolean(r, c, *b).map_err(xlsx_err)?;
                    }
                    Some(Value::Number(n)) => match n.as_f64() {
                        Some(f) => {
                            sheet.write_number(r, c, f).map_err(xlsx_err)?;
                        }
                        None => {
                            sheet.write_string(r, c, n.to_string()).map_err(xlsx_err)?;
                        }
                    },
                    Some(_) => {
                        sheet.write_string(r, c, row.text(name)).map_err(xlsx_err)?;
                    }
                }
            }
        }

        workbook.save_to_buffer().map_err(xlsx_err)
    }

    fn to_csv(&self) -> Result<Vec<u8>> {
        let columns = self.columns();
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(Vec::new());

        writer.write_record(&columns).map_err(csv_err)?;
        for row in &self.rows {
            writer
                .write_record(columns.iter().map(|c| row.text(c)))
                .map_err(csv_err)?;
        }
        writer
            .into_inner()
            .map_err(|e| ConsoleError::parse(format!("failed to finish csv: {e}")))
    }
}

/// Default local file name for an export.
pub fn export_file_name(format: OutputFormat) -> String {
    format!("mapping.{}", format.extension())
}

/// Export the sheet to `dest`. Returns the path written.
pub fn export_to(sheet: &MappingSheet, format: OutputFormat, dest: &Path) -> Result<PathBuf> {
    let bytes = sheet.export(format)?;
    let path = if dest.is_dir() {
        dest.join(export_file_name(format))
    } else {
        dest.to_path_buf()
    };
    std::fs::write(&path, bytes).map_err(|e| ConsoleError::io(&path, e))?;
    Ok(path)
}

fn xlsx_col(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| ConsoleError::validation("too many columns for an xlsx sheet"))
}

fn xlsx_err(e: XlsxError) -> ConsoleError {
    warn!(error = %e, "xlsx export failed");
    ConsoleError::parse(format!("failed to write xlsx: {e}"))
}

fn csv_err(e: csv::Error) -> ConsoleError {
    warn!(error = %e, "csv export failed");
    ConsoleError::parse(format!("failed to write csv: {e}"))
}

// ---------------------------------------------------------------------------
// Confidence legend
// ---------------------------------------------------------------------------

/// Confidence bucket of a mapping score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    pub const ALL: [ConfidenceLevel; 5] = [
        Self::VeryHigh,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::VeryLow,
    ];

    pub fn from_score(score: f64) -> Self {
        if score >= 0.90 {
            Self::VeryHigh
        } else if score >= 0.80 {
            Self::High
        } else if score >= 0.65 {
            Self::Medium
        } else if score >= 0.50 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    /// Score range as shown in the legend.
    pub fn range(self) -> &'static str {
        match self {
            Self::VeryHigh => "≥ 0.90",
            Self::High => "0.80 – 0.89",
            Self::Medium => "0.65 – 0.79",
            Self::Low => "0.50 – 0.64",
            Self::VeryLow => "< 0.50",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::VeryLow => "Very Low",
        }
    }

    /// Bucket of a row's `confidence` cell, if numeric.
    pub fn of_row(row: &MappingRow) -> Option<Self> {
        row.0.get("confidence")?.as_f64().map(Self::from_score)
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client_for, fixture, temp_session};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture_sheet() -> (MappingResponse, MappingSheet) {
        let resp: MappingResponse =
            serde_json::from_str(&fixture("mapping_response.json")).unwrap();
        let sheet = MappingSheet::new(resp.rows().to_vec());
        (resp, sheet)
    }

    #[test]
    fn columns_and_options() {
        let (_, sheet) = fixture_sheet();
        assert_eq!(
            sheet.columns(),
            ["source_table", "source_column", "target_table", "best_match_column", "confidence"]
        );
        assert_eq!(sheet.target_table_options(), ["staff", "org_units"]);
        assert_eq!(
            sheet.best_match_column_options(),
            ["staff_id", "hire_date", "unit_name"]
        );
        assert!(sheet.options_for("confidence").is_none());
    }

    #[test]
    fn edit_save_export_cycle() {
        let (_, mut sheet) = fixture_sheet();
        assert!(sheet.export(OutputFormat::Csv).is_err(), "unsaved");

        sheet.save();
        assert!(sheet.export(OutputFormat::Csv).is_ok());

        sheet.update_row(3, "target_table", "staff").unwrap();
        assert!(!sheet.is_saved());
        assert!(sheet.export(OutputFormat::Json).is_err());

        sheet.save();
        let json: Vec<MappingRow> =
            serde_json::from_slice(&sheet.export(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json[3].text("target_table"), "staff");
    }

    #[test]
    fn update_rejects_bad_edits() {
        let (_, mut sheet) = fixture_sheet();
        sheet.save();
        assert!(sheet.update_row(0, "confidence", "1.0").is_err());
        assert!(sheet.update_row(0, "target_table", "nowhere").is_err());
        assert!(sheet.update_row(99, "target_table", "staff").is_err());
        assert!(sheet.is_saved(), "rejected edits leave the flag alone");
    }

    #[test]
    fn csv_quotes_everything_and_blanks_nulls() {
        let (_, mut sheet) = fixture_sheet();
        sheet.save();
        let csv = String::from_utf8(sheet.export(OutputFormat::Csv).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            r#""source_table","source_column","target_table","best_match_column","confidence""#
        );
        assert_eq!(
            lines[1],
            r#""employees","employee_id","staff","staff_id","0.94""#
        );
        assert_eq!(lines[4], r#""incidents","risk_level_id","","","0.66""#);
    }

    #[test]
    fn xlsx_carries_edited_rows() {
        use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};

        let (_, mut sheet) = fixture_sheet();
        sheet.update_row(3, "target_table", "staff").unwrap();
        sheet.save();
        let bytes = sheet.export(OutputFormat::Xlsx).unwrap();

        let mut book: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes)).unwrap();
        let range = book.worksheet_range("Mapping").unwrap();
        assert_eq!(range.get_size(), (5, 5));
        assert_eq!(
            range.get_value((0, 2)),
            Some(&Data::String("target_table".into()))
        );
        assert_eq!(range.get_value((4, 2)), Some(&Data::String("staff".into())));
        assert_eq!(range.get_value((1, 4)), Some(&Data::Float(0.94)));
    }

    #[test]
    fn empty_export_refused() {
        let mut empty = MappingSheet::default();
        empty.save();
        assert!(empty.export(OutputFormat::Csv).is_err());
        assert!(empty.export(OutputFormat::Xlsx).is_err());
    }

    #[test]
    fn confidence_buckets() {
        assert_eq!(ConfidenceLevel::from_score(0.95), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(0.90), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(0.89), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.80), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.65), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.64), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.50), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.49), ConfidenceLevel::VeryLow);

        let (_, sheet) = fixture_sheet();
        assert_eq!(
            ConfidenceLevel::of_row(&sheet.rows()[2]),
            Some(ConfidenceLevel::Medium)
        );
    }

    #[test]
    fn dashboard_labels() {
        let (resp, _) = fixture_sheet();
        let entries = dashboard_entries(&resp);
        let labels: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            labels,
            ["Source Tables", "Target Tables", "Matched Tables", "Matched Columns", "Avg Confidence"]
        );
        assert_eq!(entries[4].1, "0.7825");
        assert!(dashboard_entries(&MappingResponse::default()).is_empty());

        let partial = dashboard_from(&MappingDashboard::default());
        assert!(partial.iter().all(|(_, v)| v == MISSING));
    }

    #[test]
    fn options_validation() {
        let mut opts = MappingOptions::default();
        assert!(opts.validate().is_ok());
        opts.min_confidence = 1.5;
        assert!(opts.validate().is_err());
    }

    #[tokio::test]
    async fn run_persists_without_target_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mapping/hybrid"))
            .and(body_partial_json(serde_json::json!({
                "tgt_cfg": {"database": "hr", "password": "tgt-pass"},
                "min_confidence": 0.5,
                "qdrant_port": 6333,
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(fixture("mapping_response.json"), "application/json"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let session = temp_session().await;
        let src = DbConfig {
            database: "employee".into(),
            ..DbConfig::default()
        };
        let tgt = DbConfig {
            database: "hr".into(),
            password: "tgt-pass".into(),
            ..DbConfig::default()
        };

        let state = run(&client, &session, &src, &tgt, &MappingOptions::default())
            .await
            .unwrap();
        assert_eq!(state.sheet.len(), 4);
        assert!(!state.sheet.is_saved());

        let raw = session.storage().get(MAPPING_STATE).await.unwrap().unwrap();
        assert!(!raw.contains("tgt-pass"));

        let restored = restore(&session).await.unwrap().unwrap();
        assert_eq!(restored.sheet, state.sheet);
        assert_eq!(restored.target.database, "hr");
    }

    #[tokio::test]
    async fn empty_sheet_is_not_persisted_and_corrupt_state_dropped() {
        let session = temp_session().await;
        let state = MappingState {
            options: MappingOptions::default(),
            target: DbConfig::default(),
            result: MappingResponse::default(),
            sheet: MappingSheet::default(),
        };
        persist(&session, &state).await.unwrap();
        assert!(session.storage().get(MAPPING_STATE).await.unwrap().is_none());

        session.storage().set(MAPPING_STATE, "[]").await.unwrap();
        assert!(restore(&session).await.unwrap().is_none());
        assert!(session.storage().get(MAPPING_STATE).await.unwrap().is_none());
    }

    #[test]
    fn export_to_directory() {
        let (_, mut sheet) = fixture_sheet();
        sheet.save();
        let dir = std::env::temp_dir().join(format!("sc_map_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = export_to(&sheet, OutputFormat::Json, &dir).unwrap();
        assert_eq!(path, dir.join("mapping.json"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
