//! Document destination.
//!
//! Append-only: each push adds a formatted block of paragraphs at the end
//! of the document. There is no remote reference to update, so a forced
//! re-push simply appends again.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use vscribe_lark::LarkClient;
use vscribe_models::AnalysisRecord;
use vscribe_store::SyncSlot;

use crate::destination::{Destination, RemoteRef};
use crate::error::SyncResult;

pub struct DocDestination {
    client: Arc<LarkClient>,
    document_id: String,
}

impl DocDestination {
    pub fn new(client: Arc<LarkClient>, document_id: String) -> Self {
        Self {
            client,
            document_id,
        }
    }

    fn paragraphs(record: &AnalysisRecord) -> Vec<String> {
        let time = record
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S");
        vec![
            format!("视频序列号：{}", record.sequence_id),
            format!("文件名：{}", record.file_name),
            format!(
                "内容摘要：{}",
                record.content_summary.clone().unwrap_or_default()
            ),
            format!(
                "详细描述：{}",
                record.detailed_description.clone().unwrap_or_default()
            ),
            format!(
                "关键词标签：{}",
                record.keyword_tags.clone().unwrap_or_default()
            ),
            format!(
                "主要对象：{}",
                record.main_objects.clone().unwrap_or_default()
            ),
            format!("分析时间：{time}"),
            "────────────────".to_string(),
        ]
    }
}

#[async_trait]
impl Destination for DocDestination {
    fn name(&self) -> &'static str {
        "doc"
    }

    fn slot(&self) -> SyncSlot {
        SyncSlot::Doc
    }

    fn remote_ref(&self, _record: &AnalysisRecord) -> RemoteRef {
        RemoteRef::None
    }

    async fn create(&self, record: &AnalysisRecord) -> SyncResult<RemoteRef> {
        self.client
            .doc_append_paragraphs(&self.document_id, &Self::paragraphs(record))
            .await?;
        Ok(RemoteRef::None)
    }

    async fn update(&self, record: &AnalysisRecord, _remote: &RemoteRef) -> SyncResult<()> {
        // No addressable remote entry; re-pushing appends a fresh block.
        self.create(record).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destinations::sample_record;
    use serde_json::json;
    use vscribe_lark::LarkConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_paragraph_block_shape() {
        let paragraphs = DocDestination::paragraphs(&sample_record());
        assert_eq!(paragraphs.len(), 8);
        assert_eq!(paragraphs[0], "视频序列号：20260828120000ABCD1234");
        assert!(paragraphs[2].starts_with("内容摘要：海边散步"));
    }

    #[tokio::test]
    async fn test_create_appends_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "ok",
                "tenant_access_token": "t", "expire": 7200
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docx/v1/documents/doc1/blocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"items": [{"block_id": "blk_root", "block_type": 1}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/docx/v1/documents/doc1/blocks/blk_root/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success", "data": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(LarkClient::new(LarkConfig {
            app_id: "cli_x".into(),
            app_secret: "s".into(),
            base_url: server.uri(),
        }));
        let dest = DocDestination::new(client, "doc1".into());
        let remote = dest.create(&sample_record()).await.unwrap();
        assert_eq!(remote, RemoteRef::None);
    }
}
