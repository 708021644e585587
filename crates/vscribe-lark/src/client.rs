//! Core Lark client and response envelope handling.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{LarkError, LarkResult};
use crate::token::TokenCache;

const DEFAULT_BASE_URL: &str = "https://open.feishu.cn/open-apis";

/// Configuration for the Lark client.
#[derive(Debug, Clone)]
pub struct LarkConfig {
    pub app_id: String,
    pub app_secret: String,
    pub base_url: String,
}

impl LarkConfig {
    /// Create config from environment variables.
    pub fn from_env() -> LarkResult<Self> {
        Ok(Self {
            app_id: std::env::var("LARK_APP_ID")
                .map_err(|_| LarkError::config_error("LARK_APP_ID not set"))?,
            app_secret: std::env::var("LARK_APP_SECRET")
                .map_err(|_| LarkError::config_error("LARK_APP_SECRET not set"))?,
            base_url: std::env::var("LARK_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        })
    }
}

/// Every Lark response wraps its payload in this envelope; a non-zero code
/// is an application-level error even on HTTP 200.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Lark open platform client.
pub struct LarkClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    tokens: TokenCache,
}

impl LarkClient {
    pub fn new(config: LarkConfig) -> Self {
        let tokens = TokenCache::new(
            config.app_id.clone(),
            config.app_secret.clone(),
            config.base_url.clone(),
        );
        Self {
            http: Client::new(),
            base_url: config.base_url,
            tokens,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> LarkResult<Self> {
        Ok(Self::new(LarkConfig::from_env()?))
    }

    pub(crate) async fn bearer(&self) -> LarkResult<String> {
        self.tokens.get_token(&self.http).await
    }

    /// Verify credentials by fetching a token.
    pub async fn check_auth(&self) -> LarkResult<()> {
        self.bearer().await.map(|_| ())
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> LarkResult<T> {
        let token = self.bearer().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        Self::unwrap_envelope(response.json().await?)
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> LarkResult<T> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::unwrap_envelope(response.json().await?)
    }

    pub(crate) async fn put_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> LarkResult<T> {
        let token = self.bearer().await?;
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::unwrap_envelope(response.json().await?)
    }

    pub(crate) async fn delete_json<T: DeserializeOwned>(&self, url: &str) -> LarkResult<T> {
        let token = self.bearer().await?;
        let response = self.http.delete(url).bearer_auth(token).send().await?;
        Self::unwrap_envelope(response.json().await?)
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> LarkResult<T> {
        if envelope.code != 0 {
            return Err(LarkError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        envelope.data.ok_or(LarkError::MissingData)
    }
}
