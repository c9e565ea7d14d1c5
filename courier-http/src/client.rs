//! HTTP 客户端抽象
//!
//! 通道只依赖 `HttpClient`，默认实现基于 `reqwest`；测试中可以替换为桩实现。
//!
use crate::request::HttpRequest;
use crate::settings::HttpSettings;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 客户端失败：网络错误（无响应）或非 2xx 响应
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct HttpClientError {
    pub message: String,
    pub response: Option<HttpErrorResponse>,
    /// 未能建立连接
    pub is_connect: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpErrorResponse {
    pub status: u16,
    pub status_text: String,
    pub data: Value,
}

impl HttpClientError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
            is_connect: false,
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            is_connect: true,
            ..Self::network(message)
        }
    }

    pub fn status(status: u16, status_text: impl Into<String>, data: Value) -> Self {
        Self {
            message: format!("Request failed with status code {status}"),
            response: Some(HttpErrorResponse {
                status,
                status_text: status_text.into(),
                data,
            }),
            is_connect: false,
        }
    }
}

impl From<reqwest::Error> for HttpClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            return HttpClientError::connect(error.to_string());
        }
        HttpClientError::network(error.to_string())
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// 发送请求并返回响应体
    async fn request(
        &self,
        settings: &HttpSettings,
        request: &HttpRequest,
    ) -> Result<Value, HttpClientError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(
        &self,
        settings: &HttpSettings,
        request: &HttpRequest,
    ) -> Result<Value, HttpClientError> {
        let url = resolve_url(
            settings.base_url.as_deref(),
            request.url.as_deref().unwrap_or_default(),
        );
        let method = request.method.unwrap_or(settings.method);

        let mut builder = self.client.request(method.into(), &url);
        for (name, value) in settings.headers.iter().chain(request.headers.iter().flatten()) {
            builder = builder.header(name, value);
        }
        if let Some(params) = &request.params {
            builder = builder.query(params);
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(Duration::from_millis(timeout));
        }

        debug!(url = %url, method = %method, "Sending http request");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        let data = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
        };

        if !status.is_success() {
            return Err(HttpClientError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                data,
            ));
        }
        Ok(data)
    }
}

/// 拼接 `base_url` 与请求路径；绝对地址原样返回
pub fn resolve_url(base_url: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match base_url {
        Some(base) if !base.is_empty() => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_joined_with_base() {
        assert_eq!(
            resolve_url(Some("https://api.local/"), "/user/get"),
            "https://api.local/user/get"
        );
        assert_eq!(
            resolve_url(Some("https://api.local"), "user.get"),
            "https://api.local/user.get"
        );
        assert_eq!(resolve_url(None, "user.get"), "user.get");
        assert_eq!(
            resolve_url(Some("https://api.local"), "http://other.local/x"),
            "http://other.local/x"
        );
    }
}
