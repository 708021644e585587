//! Bitable (multi-dimensional table) record operations.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::LarkClient;
use crate::error::LarkResult;

#[derive(Debug, Deserialize)]
struct RecordData {
    record: RecordBody,
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    record_id: String,
}

#[derive(Debug, Deserialize)]
struct DeleteData {
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct FieldListData {
    #[serde(default)]
    items: Vec<FieldItem>,
}

#[derive(Debug, Deserialize)]
struct FieldItem {
    field_name: String,
}

#[derive(Debug, Deserialize)]
struct FieldCreateData {
    field: FieldItem,
}

/// Bitable field type code for plain text.
pub const FIELD_TYPE_TEXT: i64 = 1;

impl LarkClient {
    /// Create a record; returns the remote record ID.
    pub async fn bitable_add_record(
        &self,
        app_token: &str,
        table_id: &str,
        fields: Map<String, Value>,
    ) -> LarkResult<String> {
        let url = format!(
            "{}/bitable/v1/apps/{}/tables/{}/records",
            self.base_url, app_token, table_id
        );
        let data: RecordData = self.post_json(&url, &json!({ "fields": fields })).await?;
        debug!(record_id = %data.record.record_id, "created bitable record");
        Ok(data.record.record_id)
    }

    /// Update an existing record in place.
    pub async fn bitable_update_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> LarkResult<()> {
        let url = format!(
            "{}/bitable/v1/apps/{}/tables/{}/records/{}",
            self.base_url, app_token, table_id, record_id
        );
        let _: RecordData = self.put_json(&url, &json!({ "fields": fields })).await?;
        Ok(())
    }

    /// List the field names of a table.
    pub async fn bitable_list_fields(
        &self,
        app_token: &str,
        table_id: &str,
    ) -> LarkResult<Vec<String>> {
        let url = format!(
            "{}/bitable/v1/apps/{}/tables/{}/fields?page_size=100",
            self.base_url, app_token, table_id
        );
        let data: FieldListData = self.get_json(&url).await?;
        Ok(data.items.into_iter().map(|f| f.field_name).collect())
    }

    /// Create a field; returns the remote field name.
    pub async fn bitable_create_field(
        &self,
        app_token: &str,
        table_id: &str,
        field_name: &str,
        field_type: i64,
    ) -> LarkResult<String> {
        let url = format!(
            "{}/bitable/v1/apps/{}/tables/{}/fields",
            self.base_url, app_token, table_id
        );
        let data: FieldCreateData = self
            .post_json(
                &url,
                &json!({ "field_name": field_name, "type": field_type }),
            )
            .await?;
        debug!(field = %data.field.field_name, "created bitable field");
        Ok(data.field.field_name)
    }

    /// Delete a record. Returns false when the remote side reports it gone.
    pub async fn bitable_delete_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
    ) -> LarkResult<bool> {
        let url = format!(
            "{}/bitable/v1/apps/{}/tables/{}/records/{}",
            self.base_url, app_token, table_id, record_id
        );
        let data: DeleteData = self.delete_json(&url).await?;
        Ok(data.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LarkConfig;
    use crate::error::LarkError;
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

    fn sample_fields() -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("视频序列号".into(), json!("ABC123"));
        fields.insert("关键词标签".into(), json!("猫,狗"));
        fields
    }

    #[tokio::test]
    async fn test_add_record() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/bitable/v1/apps/app1/tables/tbl1/records"))
            .and(body_partial_json(json!({"fields": {"视频序列号": "ABC123"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"record": {"record_id": "rec_42"}}
            })))
            .mount(&server)
            .await;

        let record_id = client
            .bitable_add_record("app1", "tbl1", sample_fields())
            .await
            .unwrap();
        assert_eq!(record_id, "rec_42");
    }

    #[tokio::test]
    async fn test_update_missing_record_is_api_error() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("PUT"))
            .and(path("/bitable/v1/apps/app1/tables/tbl1/records/rec_gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1254043, "msg": "RecordIdNotFound"
            })))
            .mount(&server)
            .await;

        let err = client
            .bitable_update_record("app1", "tbl1", "rec_gone", sample_fields())
            .await
            .unwrap_err();
        assert!(matches!(err, LarkError::Api { code: 1254043, .. }));
    }

    #[tokio::test]
    async fn test_list_and_create_fields() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/bitable/v1/apps/app1/tables/tbl1/fields"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"items": [{"field_name": "视频序列号", "type": 1}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bitable/v1/apps/app1/tables/tbl1/fields"))
            .and(body_partial_json(json!({"field_name": "内容摘要", "type": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"field": {"field_name": "内容摘要", "type": 1}}
            })))
            .mount(&server)
            .await;

        let names = client.bitable_list_fields("app1", "tbl1").await.unwrap();
        assert_eq!(names, vec!["视频序列号"]);

        let created = client
            .bitable_create_field("app1", "tbl1", "内容摘要", FIELD_TYPE_TEXT)
            .await
            .unwrap();
        assert_eq!(created, "内容摘要");
    }

    #[tokio::test]
    async fn test_delete_record() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/bitable/v1/apps/app1/tables/tbl1/records/rec_42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success", "data": {"deleted": true}
            })))
            .mount(&server)
            .await;

        assert!(client
            .bitable_delete_record("app1", "tbl1", "rec_42")
            .await
            .unwrap());
    }
}
