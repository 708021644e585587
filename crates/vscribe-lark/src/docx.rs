//! Document block operations (docx v1 API).

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::LarkClient;
use crate::error::{LarkError, LarkResult};

/// Page block, the root of every document.
const BLOCK_TYPE_PAGE: i64 = 1;
/// Plain text paragraph block.
const BLOCK_TYPE_TEXT: i64 = 2;

#[derive(Debug, Deserialize)]
struct BlocksData {
    #[serde(default)]
    items: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    block_id: String,
    block_type: i64,
}

impl LarkClient {
    /// ID of the document's root (page) block.
    pub async fn doc_root_block(&self, document_id: &str) -> LarkResult<String> {
        let url = format!(
            "{}/docx/v1/documents/{}/blocks?page_size=500",
            self.base_url, document_id
        );
        let data: BlocksData = self.get_json(&url).await?;
        data.items
            .into_iter()
            .find(|b| b.block_type == BLOCK_TYPE_PAGE)
            .map(|b| b.block_id)
            .ok_or(LarkError::MissingData)
    }

    /// Append text paragraphs to the end of a document.
    ///
    /// Each string becomes one paragraph block under the root block.
    pub async fn doc_append_paragraphs(
        &self,
        document_id: &str,
        paragraphs: &[String],
    ) -> LarkResult<()> {
        if paragraphs.is_empty() {
            return Ok(());
        }

        let root = self.doc_root_block(document_id).await?;
        let children: Vec<_> = paragraphs
            .iter()
            .map(|text| {
                json!({
                    "block_type": BLOCK_TYPE_TEXT,
                    "text": {
                        "elements": [{"text_run": {"content": text}}]
                    }
                })
            })
            .collect();

        let url = format!(
            "{}/docx/v1/documents/{}/blocks/{}/children",
            self.base_url, document_id, root
        );
        let _: serde_json::Value = self.post_json(&url, &json!({ "children": children })).await?;
        debug!(count = paragraphs.len(), "appended document paragraphs");
        Ok(())
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
    async fn test_append_paragraphs_targets_root_block() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/docx/v1/documents/doc1/blocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success",
                "data": {"items": [
                    {"block_id": "blk_root", "block_type": 1},
                    {"block_id": "blk_text", "block_type": 2}
                ]}
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/docx/v1/documents/doc1/blocks/blk_root/children"))
            .and(body_partial_json(json!({
                "children": [{"block_type": 2}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success", "data": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        client
            .doc_append_paragraphs("doc1", &["视频分析记录".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_root_block() {
        let server = MockServer::start().await;
        let client = client_with_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/docx/v1/documents/doc1/blocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "msg": "success", "data": {"items": []}
            })))
            .mount(&server)
            .await;

        let err = client.doc_root_block("doc1").await.unwrap_err();
        assert!(matches!(err, LarkError::MissingData));
    }
}
