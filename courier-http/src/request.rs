//! HTTP 请求描述与发送前的规范化
//!
//! HTTP 命令的请求载荷本身就是一个请求描述，只填充未设置的字段：`url` 缺省为命令名，`method` 缺省取配置，
//! `GET` 请求的 `data` 移动到 `params`（查询参数）。
//!
use crate::settings::{HttpMethod, HttpSettings};
use courier_core::{
    Command, CommandOptions, TransportError, TransportResult, Validate, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    /// 请求体
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// 查询参数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// 毫秒
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_handle_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_handle_loading: Option<bool>,
}

impl HttpRequest {
    /// 以校验过的载荷作为请求体
    pub fn with_data<T>(data: &T) -> TransportResult<Self>
    where
        T: Serialize + Validate + ?Sized,
    {
        data.validate()?;
        let data = serde_json::to_value(data)
            .map_err(|e| TransportError::invalid_data(e.to_string(), None))?;
        Ok(Self {
            data: Some(data),
            ..Self::default()
        })
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

impl Validate for HttpRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(ValidationError::field("url", "must not be empty"));
        }
        Ok(())
    }
}

/// 由命令与选项生成最终的请求描述
pub fn prepare_request(
    command: &Command,
    options: &CommandOptions,
    settings: &HttpSettings,
) -> TransportResult<HttpRequest> {
    let mut request = if command.request().is_null() {
        HttpRequest::default()
    } else {
        command.request_as::<HttpRequest>()?
    };

    if request.url.is_none() {
        request.url = Some(command.name().to_string());
    }
    let method = *request.method.get_or_insert(settings.method);
    if request.timeout.is_none() {
        request.timeout = Some(options.timeout.unwrap_or(settings.transport.timeout));
    }
    if request.is_handle_error.is_none() && settings.is_handle_error {
        request.is_handle_error = Some(true);
    }
    if request.is_handle_loading.is_none() && settings.is_handle_loading {
        request.is_handle_loading = Some(true);
    }
    if method == HttpMethod::Get {
        if let Some(data) = request.data.take() {
            request.params = Some(data);
        }
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::TransportSettings;
    use serde_json::json;

    fn settings(method: HttpMethod) -> HttpSettings {
        HttpSettings::builder().method(method).build()
    }

    #[test]
    fn url_and_method_default_from_command_and_settings() {
        let command = Command::new_async("user/list", &json!(null)).unwrap();
        let options = CommandOptions::builder().timeout(1500).build();

        let request = prepare_request(&command, &options, &settings(HttpMethod::Post)).unwrap();
        assert_eq!(request.url.as_deref(), Some("user/list"));
        assert_eq!(request.method, Some(HttpMethod::Post));
        assert_eq!(request.timeout, Some(1500));
        assert_eq!(request.is_handle_error, None);
    }

    #[test]
    fn get_moves_payload_into_query() {
        let request = HttpRequest::with_data(&json!({"page": 2})).unwrap();
        let command = Command::new_async("user/list", &request).unwrap();

        let request =
            prepare_request(&command, &CommandOptions::default(), &settings(HttpMethod::Get))
                .unwrap();
        assert_eq!(request.data, None);
        assert_eq!(request.params, Some(json!({"page": 2})));
        assert_eq!(request.timeout, Some(TransportSettings::default().timeout));
    }

    #[test]
    fn explicit_values_are_kept() {
        let request = HttpRequest {
            url: Some("/v2/users".into()),
            params: Some(json!({"q": "x"})),
            ..HttpRequest::with_data(&json!({"name": "A"})).unwrap()
        }
        .method(HttpMethod::Put);
        let command = Command::new_async("user.update", &request).unwrap();
        let mut settings = settings(HttpMethod::Get);
        settings.is_handle_error = true;
        settings.is_handle_loading = true;

        let request = prepare_request(&command, &CommandOptions::default(), &settings).unwrap();
        assert_eq!(request.url.as_deref(), Some("/v2/users"));
        assert_eq!(request.method, Some(HttpMethod::Put));
        assert_eq!(request.data, Some(json!({"name": "A"})));
        assert_eq!(request.params, Some(json!({"q": "x"})));
        assert_eq!(request.is_handle_error, Some(true));
        assert_eq!(request.is_handle_loading, Some(true));
    }

    #[test]
    fn explicit_timeout_and_flags_win_over_settings() {
        let request = HttpRequest {
            timeout: Some(50),
            is_handle_error: Some(false),
            is_handle_loading: Some(false),
            ..HttpRequest::default()
        };
        let command = Command::new_async("user.get", &request).unwrap();
        let mut settings = settings(HttpMethod::Post);
        settings.is_handle_error = true;
        settings.is_handle_loading = true;
        let options = CommandOptions::builder().timeout(30_000).build();

        let request = prepare_request(&command, &options, &settings).unwrap();
        assert_eq!(request.timeout, Some(50));
        assert_eq!(request.is_handle_error, Some(false));
        assert_eq!(request.is_handle_loading, Some(false));
    }

    #[test]
    fn empty_url_fails_validation() {
        let request = HttpRequest {
            url: Some(" ".into()),
            ..HttpRequest::default()
        };
        let error = Command::new_async("user.get", &request).unwrap_err();
        assert!(matches!(error, TransportError::Validation { .. }));
    }
}
