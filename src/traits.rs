use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::AppError;
use crate::retry::RetryPolicy;

/// Outbound delivery to a group chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait ChatApi: Send + Sync {
    async fn send_group_msg(&self, group_id: i64, message: &str) -> Result<(), AppError>;
}

/// Provider of one-time account codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait CodeApi: Send + Sync {
    /// `Ok(None)` when the provider has no code ready for this token.
    async fn dynamic_code(&self, token: &str) -> Result<Option<String>, AppError>;
}

/// OneBot v11 HTTP API (`/send_group_msg`).
pub(crate) struct ChatApiImpl {
    pub(crate) http: Client,
    pub(crate) api_url: String,
    pub(crate) timeout: Duration,
    pub(crate) retry: RetryPolicy,
}

#[async_trait]
impl ChatApi for ChatApiImpl {
    async fn send_group_msg(&self, group_id: i64, message: &str) -> Result<(), AppError> {
        let url = format!("{}/send_group_msg", self.api_url.trim_end_matches('/'));
        let http = &self.http;
        let url = url.as_str();
        let timeout = self.timeout;
        let group = group_id.to_string();
        let group = group.as_str();

        let body = self
            .retry
            .run("send_group_msg", move || async move {
                let resp = http
                    .get(url)
                    .query(&[("group_id", group), ("message", message)])
                    .timeout(timeout)
                    .send()
                    .await?;
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                if !status.is_success() {
                    error!(status = %status, body = %body, "Group send failed");
                    return Err(AppError::upstream(status, body));
                }
                Ok::<_, AppError>(body)
            })
            .await?;

        // The bridge answers 200 with `{"status": "failed"}` for rejected sends.
        if let Ok(reply) = serde_json::from_str::<Value>(&body) {
            if reply["status"].as_str() == Some("failed") {
                let reason = reply["wording"]
                    .as_str()
                    .or_else(|| reply["message"].as_str())
                    .unwrap_or("unknown reason");
                return Err(AppError::Chat(format!(
                    "send to group {group_id} rejected: {reason}"
                )));
            }
        }
        debug!(group_id, "Group message sent");
        Ok(())
    }
}

const CODE_PLACEHOLDER: &str = "等待提交...";

/// Dynamic-code web form: POST `api_key`, read `<div class="dynamic-code">`.
pub(crate) struct CodeApiImpl {
    http: Client,
    url: String,
    timeout: Duration,
    retry: RetryPolicy,
    code_div: Regex,
    tags: Regex,
}

impl CodeApiImpl {
    pub(crate) fn new(
        http: Client,
        url: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, AppError> {
        let code_div = Regex::new(r#"(?is)<div[^>]*class\s*=\s*["'][^"']*\bdynamic-code\b[^"']*["'][^>]*>(.*?)</div>"#)
            .map_err(|e| AppError::Config(format!("invalid code pattern: {e}")))?;
        let tags = Regex::new(r"<[^>]*>")
            .map_err(|e| AppError::Config(format!("invalid tag pattern: {e}")))?;
        Ok(Self {
            http,
            url,
            timeout,
            retry,
            code_div,
            tags,
        })
    }

    fn extract_code(&self, html: &str) -> Option<String> {
        let inner = self.code_div.captures(html)?.get(1)?.as_str();
        let text = self.tags.replace_all(inner, "");
        let code = text.trim();
        if code.is_empty() || code == CODE_PLACEHOLDER {
            return None;
        }
        Some(code.to_string())
    }
}

#[async_trait]
impl CodeApi for CodeApiImpl {
    async fn dynamic_code(&self, token: &str) -> Result<Option<String>, AppError> {
        let http = &self.http;
        let url = self.url.as_str();
        let timeout = self.timeout;
        let html = self
            .retry
            .run("dynamic_code", move || async move {
                let resp = http
                    .post(url)
                    .form(&[("api_key", token)])
                    .timeout(timeout)
                    .send()
                    .await?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AppError::upstream(status, body));
                }
                Ok::<_, AppError>(resp.text().await?)
            })
            .await?;
        let code = self.extract_code(&html);
        if code.is_none() {
            debug!("No dynamic code available");
        }
        Ok(code)
    }
}
