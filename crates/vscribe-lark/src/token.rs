//! Tenant access token caching.
//!
//! Thread-safe, async-aware token cache with:
//! - Refresh margin so a token never expires mid-request
//! - Single-flight refresh to prevent thundering herd

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{LarkError, LarkResult};

/// Refresh margin: treat the token as expired this long before it really is.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    /// Remaining validity in seconds
    #[serde(default)]
    expire: u64,
}

/// Tenant token cache with single-flight refresh.
pub struct TokenCache {
    app_id: String,
    app_secret: String,
    base_url: String,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(app_id: String, app_secret: String, base_url: String) -> Self {
        Self {
            app_id,
            app_secret,
            base_url,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token, forcing a refresh on the next request.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Get a valid tenant access token, refreshing if needed.
    pub async fn get_token(&self, http: &Client) -> LarkResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.token.clone());
            }
        }

        let url = format!("{}/auth/v3/tenant_access_token/internal", self.base_url);
        let response: TokenResponse = http
            .post(&url)
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await?
            .json()
            .await?;

        if response.code != 0 {
            return Err(LarkError::auth_failed(format!(
                "{} (code {})",
                response.msg, response.code
            )));
        }

        let expires_at = Instant::now() + Duration::from_secs(response.expire);
        debug!(expire_s = response.expire, "refreshed tenant access token");
        *cache = Some(CachedToken {
            token: response.tenant_access_token.clone(),
            expires_at,
        });
        Ok(response.tenant_access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_token_fetch_and_reuse() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v3/tenant_access_token/internal"))
            .and(body_json(json!({"app_id": "cli_x", "app_secret": "s"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "tenant_access_token": "t-abc",
                "expire": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new("cli_x".into(), "s".into(), server.uri());
        let http = Client::new();

        assert_eq!(cache.get_token(&http).await.unwrap(), "t-abc");
        // Second call must be served from cache, not another HTTP roundtrip.
        assert_eq!(cache.get_token(&http).await.unwrap(), "t-abc");
    }

    #[tokio::test]
    async fn test_short_expiry_forces_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "tenant_access_token": "t-short",
                // Inside the refresh margin, so never considered valid.
                "expire": 10
            })))
            .expect(2)
            .mount(&server)
            .await;

        let cache = TokenCache::new("cli_x".into(), "s".into(), server.uri());
        let http = Client::new();
        cache.get_token(&http).await.unwrap();
        cache.get_token(&http).await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 10003,
                "msg": "invalid app_secret"
            })))
            .mount(&server)
            .await;

        let cache = TokenCache::new("cli_x".into(), "bad".into(), server.uri());
        let err = cache.get_token(&Client::new()).await.unwrap_err();
        assert!(matches!(err, LarkError::AuthFailed(_)));
    }
}
