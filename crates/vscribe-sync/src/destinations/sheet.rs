//! Spreadsheet destination.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, Utc};
use serde_json::{json, Value};
use vscribe_lark::LarkClient;
use vscribe_models::AnalysisRecord;
use vscribe_store::SyncSlot;

use crate::destination::{Destination, RemoteRef};
use crate::error::{SyncError, SyncResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pushes records as fixed nine-column rows (A through I).
pub struct SheetDestination {
    client: Arc<LarkClient>,
    spreadsheet_token: String,
    sheet_id: String,
}

impl SheetDestination {
    pub fn new(client: Arc<LarkClient>, spreadsheet_token: String, sheet_id: String) -> Self {
        Self {
            client,
            spreadsheet_token,
            sheet_id,
        }
    }

    /// Row layout: serial, file name, summary, description, tags, objects,
    /// analysis time, sync time, sync marker.
    fn row_values(record: &AnalysisRecord) -> Vec<Value> {
        vec![
            json!(record.sequence_id),
            json!(record.file_name),
            json!(record.content_summary.clone().unwrap_or_default()),
            json!(record.detailed_description.clone().unwrap_or_default()),
            json!(record.keyword_tags.clone().unwrap_or_default()),
            json!(record.main_objects.clone().unwrap_or_default()),
            json!(record
                .created_at
                .with_timezone(&Local)
                .format(TIME_FORMAT)
                .to_string()),
            json!(Utc::now().with_timezone(&Local).format(TIME_FORMAT).to_string()),
            json!("已同步"),
        ]
    }

    async fn write_row(&self, row: i64, record: &AnalysisRecord) -> SyncResult<()> {
        let range = format!("{}!A{row}:I{row}", self.sheet_id);
        self.client
            .sheet_write_values(
                &self.spreadsheet_token,
                &range,
                vec![Self::row_values(record)],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Destination for SheetDestination {
    fn name(&self) -> &'static str {
        "sheet"
    }

    fn slot(&self) -> SyncSlot {
        SyncSlot::Sheet
    }

    fn remote_ref(&self, record: &AnalysisRecord) -> RemoteRef {
        record.sheet_row.map(RemoteRef::Row).unwrap_or(RemoteRef::None)
    }

    async fn create(&self, record: &AnalysisRecord) -> SyncResult<RemoteRef> {
        let row = self
            .client
            .sheet_next_free_row(&self.spreadsheet_token, &self.sheet_id)
            .await?;
        self.write_row(row, record).await?;
        Ok(RemoteRef::Row(row))
    }

    async fn update(&self, record: &AnalysisRecord, remote: &RemoteRef) -> SyncResult<()> {
        let RemoteRef::Row(row) = remote else {
            return Err(SyncError::destination("sheet update without row number"));
        };
        self.write_row(*row, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destinations::sample_record;
    use serde_json::json;
    use vscribe_lark::LarkConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn destination(server: &MockServer) -> SheetDestination {
        Mock::given(method("POST"))
            .and(path("/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "ok",
                "tenant_access_token": "t", "expire": 7200
            })))
            .mount(server)
            .await;

        let client = Arc::new(LarkClient::new(LarkConfig {
            app_id: "cli_x".into(),
            app_secret: "s".into(),
            base_url: server.uri(),
        }));
        SheetDestination::new(client, "sht1".into(), "sid".into())
    }

    #[test]
    fn test_row_has_nine_columns() {
        let values = SheetDestination::row_values(&sample_record());
        assert_eq!(values.len(), 9);
        assert_eq!(values[0], json!("20260828120000ABCD1234"));
        assert_eq!(values[8], json!("已同步"));
    }

    #[tokio::test]
    async fn test_create_writes_to_first_free_row() {
        let server = MockServer::start().await;
        let dest = destination(&server).await;

        Mock::given(method("GET"))
            .and(path("/sheets/v2/spreadsheets/sht1/values/sid!A1:A5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"valueRange": {"values": [["序号"], ["X1"], ["X2"]]}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/sheets/v2/spreadsheets/sht1/values"))
            .and(body_partial_json(json!({
                "valueRange": {"range": "sid!A4:I4"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success", "data": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let remote = dest.create(&sample_record()).await.unwrap();
        assert_eq!(remote, RemoteRef::Row(4));
    }

    #[tokio::test]
    async fn test_update_rewrites_existing_row() {
        let server = MockServer::start().await;
        let dest = destination(&server).await;

        Mock::given(method("PUT"))
            .and(path("/sheets/v2/spreadsheets/sht1/values"))
            .and(body_partial_json(json!({
                "valueRange": {"range": "sid!A7:I7"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success", "data": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        dest.update(&sample_record(), &RemoteRef::Row(7))
            .await
            .unwrap();
    }
}
