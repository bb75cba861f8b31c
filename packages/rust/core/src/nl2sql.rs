//! Conversational NL2SQL: question → SQL, summary and result table.

use std::path::{Path, PathBuf};

use schemaconsole_client::ApiClient;
use schemaconsole_shared::{
    AppConfig, ChatMessage, ConfigOptions, ConsoleError, MetricsSnapshot, Nl2sqlChatRequest,
    Nl2sqlChatResponse, Result,
};
use serde_json::{Map, Value};
use tracing::{info, instrument};

const METRICS_FILE_NAME: &str = "nl2sql_metrics.json";

/// One NL2SQL conversation with the agent/model it talks to.
#[derive(Debug, Clone, PartialEq)]
pub struct Nl2sqlConversation {
    pub client_id: String,
    pub agent_name: String,
    pub model_name: String,
    history: Vec<ChatMessage>,
}

impl Nl2sqlConversation {
    pub fn new(
        client_id: impl Into<String>,
        agent_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            agent_name: agent_name.into(),
            model_name: model_name.into(),
            history: Vec::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.nl2sql.client_id.clone(),
            config.nl2sql.agent_name.clone(),
            config.nl2sql.model_name.clone(),
        )
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Request for `question` carrying the history so far.
    pub fn request(&self, question: &str) -> Result<Nl2sqlChatRequest> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ConsoleError::validation("question must not be empty"));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConsoleError::validation(
                "no client id selected; see `nl2sql options`",
            ));
        }
        Ok(Nl2sqlChatRequest {
            user_message: question.to_string(),
            history: self.history.clone(),
            client_id: self.client_id.clone(),
            agent_name: self.agent_name.clone(),
            model_name: self.model_name.clone(),
        })
    }

    /// Fold a response into the history.
    ///
    /// A backend-supplied `full_history` replaces ours; otherwise the
    /// question and the summary (or error) are appended.
    pub fn record(&mut self, question: &str, resp: &Nl2sqlChatResponse) {
        if let Some(full) = resp.full_history.as_ref().filter(|h| !h.is_empty()) {
            self.history = full.clone();
            return;
        }
        self.history.push(ChatMessage::user(question.trim()));
        let reply = resp
            .summary
            .as_deref()
            .or(resp.error.as_deref())
            .unwrap_or_default();
        self.history.push(ChatMessage::assistant(reply));
    }

    /// Ask one question and update the history.
    #[instrument(skip_all, fields(client_id = %self.client_id, agent = %self.agent_name))]
    pub async fn send(&mut self, client: &ApiClient, question: &str) -> Result<Nl2sqlChatResponse> {
        let req = self.request(question)?;
        let resp = client.nl2sql_chat(&req).await?;
        self.record(question, &resp);
        info!(mode = ?resp.mode, history = self.history.len(), "nl2sql answered");
        Ok(resp)
    }
}

/// A dataframe reshaped for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// Union of record keys in first-seen order; missing cells are empty.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| match record.get(c) {
                        None | Some(Value::Null) => String::new(),
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                    })
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Dropdown choices offered by the backend.
pub async fn options(client: &ApiClient) -> Result<ConfigOptions> {
    client.nl2sql_config().await
}

/// Aggregated NL2SQL metrics.
pub async fn metrics(client: &ApiClient) -> Result<MetricsSnapshot> {
    client.nl2sql_metrics().await
}

/// Save the metrics file to `dest` (a directory gets a default file name).
pub async fn download_metrics(client: &ApiClient, dest: &Path) -> Result<PathBuf> {
    let target = if dest.is_dir() {
        dest.join(METRICS_FILE_NAME)
    } else {
        dest.to_path_buf()
    };
    client.download_metrics(&target).await?;
    Ok(target)
}

/// Labelled metric lines, skipping fields the backend left out.
pub fn metrics_entries(m: &MetricsSnapshot) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    let mut push = |label: &'static str, value: Option<String>| {
        if let Some(v) = value {
            out.push((label, v));
        }
    };
    push("Total Queries", m.total_queries.map(|v| v.to_string()));
    push("Successful", m.successful.map(|v| v.to_string()));
    push("Failed", m.failed.map(|v| v.to_string()));
    push("Success Rate", m.success_rate.map(|v| format!("{:.1}%", v * 100.0)));
    push("Total Tokens", m.total_tokens.as_ref().map(token_text));
    push("Total Cost (USD)", m.total_cost_usd.map(|v| format!("{v:.4}")));
    push("Avg Latency (ms)", m.avg_latency_ms.map(|v| format!("{v:.0}")));
    push("Avg Confidence", m.avg_confidence.map(|v| format!("{v:.2}")));
    push("Queries Needing Retry", m.queries_needing_retry.map(|v| v.to_string()));
    push("Avg Retries", m.avg_retries.map(|v| format!("{v:.2}")));
    push("Last Updated", m.last_updated.clone());
    out
}

fn token_text(v: &Value) -> String {
    match v {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client_for, fixture};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn conversation() -> Nl2sqlConversation {
        Nl2sqlConversation::new("ehs", "Conversational Agent", "llama-3.3-70b-versatile")
    }

    #[test]
    fn result_table_unions_columns() {
        let resp: Nl2sqlChatResponse =
            serde_json::from_str(&fixture("nl2sql_chat_response.json")).unwrap();
        let table = ResultTable::from_records(resp.dataframe.as_deref().unwrap());
        assert_eq!(table.columns, ["department", "staff", "note"]);
        assert_eq!(table.rows[0], ["Operations", "212", ""]);
        assert_eq!(table.rows[2], ["Finance", "41", "includes contractors"]);
        assert!(ResultTable::from_records(&[]).is_empty());
    }

    #[test]
    fn request_validation() {
        assert!(conversation().request("  ").is_err());
        let mut conv = conversation();
        conv.client_id.clear();
        assert!(conv.request("hi").is_err());
        assert_eq!(conversation().request(" hi ").unwrap().user_message, "hi");
    }

    #[test]
    fn record_appends_or_adopts_history() {
        let mut conv = conversation();
        conv.record(
            "q1",
            &Nl2sqlChatResponse {
                summary: Some("a1".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            conv.history(),
            [ChatMessage::user("q1"), ChatMessage::assistant("a1")]
        );

        conv.record(
            "q2",
            &Nl2sqlChatResponse {
                error: Some("bad sql".into()),
                ..Default::default()
            },
        );
        assert_eq!(conv.history()[3], ChatMessage::assistant("bad sql"));

        let full = vec![ChatMessage::user("x"), ChatMessage::assistant("y")];
        conv.record(
            "q3",
            &Nl2sqlChatResponse {
                full_history: Some(full.clone()),
                ..Default::default()
            },
        );
        assert_eq!(conv.history(), full.as_slice());
    }

    #[tokio::test]
    async fn send_carries_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nl2sql/chat"))
            .and(body_partial_json(serde_json::json!({
                "user_message": "follow up",
                "history": [
                    {"role": "user", "content": "Show department wise staff count"},
                    {"role": "assistant", "content": "Operations has the most staff, followed by Safety."}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mode": "summary_only",
                "summary": "done"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/nl2sql/chat"))
            .and(body_partial_json(serde_json::json!({
                "user_message": "Show department wise staff count"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(fixture("nl2sql_chat_response.json"), "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut conv = conversation();
        let first = conv
            .send(&client, "Show department wise staff count")
            .await
            .unwrap();
        assert!(first.sql.unwrap().starts_with("SELECT"));

        let second = conv.send(&client, "follow up").await.unwrap();
        assert_eq!(second.summary.as_deref(), Some("done"));
        assert_eq!(conv.history().len(), 4);
    }

    #[test]
    fn metrics_lines() {
        let m: MetricsSnapshot = serde_json::from_str(&fixture("metrics.json")).unwrap();
        let entries = metrics_entries(&m);
        assert_eq!(entries[0], ("Total Queries", "18".to_string()));
        assert!(entries.contains(&("Success Rate", "88.9%".to_string())));
        assert!(entries.contains(&("Total Tokens", "input=48211, output=9120".to_string())));
        assert!(metrics_entries(&MetricsSnapshot::default()).is_empty());
    }
}
