//! Spreadsheet value operations (sheets v2 API).

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::LarkClient;
use crate::error::LarkResult;

/// Rows scanned when looking for the first free row.
const ROW_SCAN_LIMIT: u32 = 5000;

#[derive(Debug, Deserialize)]
struct ReadData {
    #[serde(rename = "valueRange")]
    value_range: ValueRange,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl LarkClient {
    /// Read cell values from a range like `"0b1a2c!A1:I10"`.
    pub async fn sheet_read_values(
        &self,
        spreadsheet_token: &str,
        range: &str,
    ) -> LarkResult<Vec<Vec<Value>>> {
        let url = format!(
            "{}/sheets/v2/spreadsheets/{}/values/{}",
            self.base_url, spreadsheet_token, range
        );
        let data: ReadData = self.get_json(&url).await?;
        Ok(data.value_range.values)
    }

    /// Overwrite a range with the given rows.
    pub async fn sheet_write_values(
        &self,
        spreadsheet_token: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> LarkResult<()> {
        let url = format!(
            "{}/sheets/v2/spreadsheets/{}/values",
            self.base_url, spreadsheet_token
        );
        let body = json!({ "valueRange": { "range": range, "values": values } });
        let _: Value = self.put_json(&url, &body).await?;
        debug!(range, "wrote sheet values");
        Ok(())
    }

    /// Append rows after the last table row of the sheet.
    pub async fn sheet_append_values(
        &self,
        spreadsheet_token: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> LarkResult<()> {
        let url = format!(
            "{}/sheets/v2/spreadsheets/{}/values_append",
            self.base_url, spreadsheet_token
        );
        let body = json!({ "valueRange": { "range": range, "values": values } });
        let _: Value = self.post_json(&url, &body).await?;
        Ok(())
    }

    /// First row with no value in column A. Row 1 is reserved for headers,
    /// so an empty sheet answers 2.
    pub async fn sheet_next_free_row(
        &self,
        spreadsheet_token: &str,
        sheet_id: &str,
    ) -> LarkResult<i64> {
        let range = format!("{sheet_id}!A1:A{ROW_SCAN_LIMIT}");
        let rows = self.sheet_read_values(spreadsheet_token, &range).await?;

        let last_filled = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.first()
                    .map(|cell| !cell.is_null() && cell.as_str() != Some(""))
                    .unwrap_or(false)
            })
            .map(|(i, _)| i as i64 + 1)
            .max()
            .unwrap_or(0);

        Ok((last_filled + 1).max(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LarkConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_with_token(server: &MockServer) -> LarkClient {
        Mock::given(method("POST"))
            .and(path("/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "ok",
                "tenant_access_token": "t-abc", "expire": 7200
            })))
            .mount(server)
            .await;
        LarkClient::new(LarkConfig {
            app_id: "cli_x".into(),
            app_secret: "s".into(),
            base_url: server.uri(),
        })
    }

    #[tokio::test]
    async fn test_next_free_row_empty_sheet_defaults_to_two() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/sheets/v2/spreadsheets/sht1/values/sid!A1:A5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"valueRange": {"values": []}}
            })))
            .mount(&server)
            .await;

        assert_eq!(client.sheet_next_free_row("sht1", "sid").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_next_free_row_skips_trailing_blanks() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/sheets/v2/spreadsheets/sht1/values/sid!A1:A5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"valueRange": {"values": [["序号"], ["A1"], [""], [null]]}}
            })))
            .mount(&server)
            .await;

        assert_eq!(client.sheet_next_free_row("sht1", "sid").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_write_values_sends_value_range() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("PUT"))
            .and(path("/sheets/v2/spreadsheets/sht1/values"))
            .and(body_partial_json(json!({
                "valueRange": {"range": "sid!A3:I3"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success", "data": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        client
            .sheet_write_values("sht1", "sid!A3:I3", vec![vec![json!("ABC123")]])
            .await
            .unwrap();
    }
}
