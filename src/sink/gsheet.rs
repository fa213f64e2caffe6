use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;

use crate::config::GSheetConfig;
use crate::error::{AppError, Result, SinkError};
use crate::sink::{table_row, Sink};
use crate::types::Snapshot;

/// Appends snapshot rows to a Google Sheets tab through the
/// `values:append` endpoint. Rows land below whatever the tab already holds,
/// so the date column keeps successive days apart.
pub struct GSheetSink {
    client: reqwest::Client,
    append_url: Url,
    access_token: String,
}

impl GSheetSink {
    pub fn new(cfg: GSheetConfig, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        let base = format!("{}/", cfg.api_url.trim_end_matches('/'));
        let mut append_url = Url::parse(&base)
            .map_err(|e| AppError::Config(format!("invalid GSHEET_API_URL {base}: {e}")))?;
        append_url
            .path_segments_mut()
            .map_err(|_| AppError::Config(format!("GSHEET_API_URL {base} cannot take a path")))?
            .pop_if_empty()
            .push(&cfg.spreadsheet_id)
            .push("values")
            .push(&format!("{}!A1:append", cfg.sheet_name));
        append_url
            .query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        Ok(Self {
            client,
            append_url,
            access_token: cfg.access_token,
        })
    }
}

#[async_trait]
impl Sink for GSheetSink {
    fn name(&self) -> &str {
        "gsheet"
    }

    async fn write(&self, snapshot: &Snapshot) -> std::result::Result<usize, SinkError> {
        let values: Vec<Vec<String>> = snapshot
            .records()
            .iter()
            .map(|r| table_row(snapshot, r))
            .collect();

        let resp = self
            .client
            .post(self.append_url.clone())
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": values }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(values.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{record, snapshot};
    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Captured {
        calls: Arc<Mutex<Vec<(String, String, HashMap<String, String>, serde_json::Value)>>>,
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/v4/spreadsheets")
    }

    fn config(api_url: String) -> GSheetConfig {
        GSheetConfig {
            spreadsheet_id: "sheet-123".into(),
            access_token: "tok".into(),
            sheet_name: "Daily Odds".into(),
            api_url,
        }
    }

    #[tokio::test]
    async fn appends_one_row_per_record() {
        let captured = Captured::default();
        let router = Router::new()
            .route(
                "/v4/spreadsheets/:id/values/:range",
                post(
                    |State(c): State<Captured>,
                     Path((id, range)): Path<(String, String)>,
                     Query(q): Query<HashMap<String, String>>,
                     headers: HeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        assert_eq!(auth, "Bearer tok");
                        c.calls.lock().unwrap().push((id, range, q, body));
                        Json(json!({ "updates": { "updatedRows": 2 } }))
                    },
                ),
            )
            .with_state(captured.clone());
        let base = serve(router).await;

        let sink = GSheetSink::new(config(base), 5).unwrap();
        let snap = snapshot(
            "2025-03-01",
            vec![
                record("Arsenal", "Chelsea", "1X2", "Home", 2.1),
                record("Liverpool", "Everton", "1X2", "Away", 5.5),
            ],
        );
        assert_eq!(sink.write(&snap).await.unwrap(), 2);

        let calls = captured.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (id, range, query, body) = &calls[0];
        assert_eq!(id, "sheet-123");
        assert_eq!(range, "Daily Odds!A1:append");
        assert_eq!(query.get("valueInputOption").map(String::as_str), Some("RAW"));
        let rows = body["values"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "2025-03-01");
        assert_eq!(rows[0][2], "Arsenal");
        assert_eq!(rows[1][7], "5.5");
    }

    #[tokio::test]
    async fn rejected_append_surfaces_status_and_body() {
        let router = Router::new().route(
            "/v4/spreadsheets/:id/values/:range",
            post(|| async { (StatusCode::FORBIDDEN, "insufficient scope") }),
        );
        let base = serve(router).await;

        let sink = GSheetSink::new(config(base), 5).unwrap();
        let snap = snapshot("2025-03-01", vec![record("A", "B", "1X2", "Home", 2.0)]);
        match sink.write(&snap).await.unwrap_err() {
            SinkError::Remote { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "insufficient scope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
