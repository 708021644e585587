//! Bitable destination.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use vscribe_lark::LarkClient;
use vscribe_mapping::CustomFieldMapper;
use vscribe_models::AnalysisRecord;
use vscribe_store::SyncSlot;

use crate::destination::{Destination, RemoteRef};
use crate::error::{SyncError, SyncResult};

use super::fields_for;

/// Pushes records into a bitable, shaped by the user's mapping config.
pub struct TableDestination {
    client: Arc<LarkClient>,
    app_token: String,
    table_id: String,
    mapper: CustomFieldMapper,
}

impl TableDestination {
    pub fn new(
        client: Arc<LarkClient>,
        app_token: String,
        table_id: String,
        mapper: CustomFieldMapper,
    ) -> Self {
        Self {
            client,
            app_token,
            table_id,
            mapper,
        }
    }

    fn remote_fields(&self, record: &AnalysisRecord) -> SyncResult<Map<String, Value>> {
        let mapped = self.mapper.map_fields(&fields_for(record))?;
        Ok(mapped
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect())
    }
}

#[async_trait]
impl Destination for TableDestination {
    fn name(&self) -> &'static str {
        "table"
    }

    fn slot(&self) -> SyncSlot {
        SyncSlot::Table
    }

    fn remote_ref(&self, record: &AnalysisRecord) -> RemoteRef {
        record
            .table_record_id
            .clone()
            .map(RemoteRef::Record)
            .unwrap_or(RemoteRef::None)
    }

    async fn create(&self, record: &AnalysisRecord) -> SyncResult<RemoteRef> {
        let fields = self.remote_fields(record)?;
        let record_id = self
            .client
            .bitable_add_record(&self.app_token, &self.table_id, fields)
            .await?;
        Ok(RemoteRef::Record(record_id))
    }

    async fn update(&self, record: &AnalysisRecord, remote: &RemoteRef) -> SyncResult<()> {
        let RemoteRef::Record(record_id) = remote else {
            return Err(SyncError::destination("table update without record id"));
        };
        let fields = self.remote_fields(record)?;
        self.client
            .bitable_update_record(&self.app_token, &self.table_id, record_id, fields)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destinations::sample_record;
    use serde_json::json;
    use vscribe_lark::LarkConfig;
    use vscribe_mapping::FieldMappingConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn destination(server: &MockServer) -> TableDestination {
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
        let mapper = CustomFieldMapper::new(FieldMappingConfig::default_config()).unwrap();
        TableDestination::new(client, "app1".into(), "tbl1".into(), mapper)
    }

    #[tokio::test]
    async fn test_create_pushes_mapped_fields() {
        let server = MockServer::start().await;
        let dest = destination(&server).await;

        // The serial column must carry the local sequence ID, not the
        // model-reported one.
        Mock::given(method("POST"))
            .and(path("/bitable/v1/apps/app1/tables/tbl1/records"))
            .and(body_partial_json(json!({
                "fields": {
                    "视频序列号": "20260828120000ABCD1234",
                    "关键词标签": "海边,散步"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"record": {"record_id": "rec_9"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let remote = dest.create(&sample_record()).await.unwrap();
        assert_eq!(remote, RemoteRef::Record("rec_9".to_string()));
    }

    #[tokio::test]
    async fn test_update_targets_existing_record() {
        let server = MockServer::start().await;
        let dest = destination(&server).await;

        Mock::given(method("PUT"))
            .and(path("/bitable/v1/apps/app1/tables/tbl1/records/rec_9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"record": {"record_id": "rec_9"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        dest.update(&sample_record(), &RemoteRef::Record("rec_9".into()))
            .await
            .unwrap();
    }
}
