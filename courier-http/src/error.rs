//! HTTP 客户端错误归一化
//!
use crate::client::HttpClientError;
use courier_core::ExtendedError;
use serde_json::json;

/// 将客户端失败转换为结构化错误
///
/// - 无响应或响应体为空：400，message 取客户端错误信息；
/// - 响应体本身是结构化错误：直接使用；
/// - 其余情况：message 取状态文本（为空时取 `data.error`），code 为 HTTP 状态码，details 为响应体。
pub fn parse_http_error(error: &HttpClientError) -> ExtendedError {
    let response = match &error.response {
        Some(response) if !response.data.is_null() => response,
        _ => {
            return ExtendedError::new(error.message.clone(), ExtendedError::HTTP_CODE_BAD_REQUEST)
                .with_details(json!({ "message": error.message }));
        }
    };

    if ExtendedError::is_shape(&response.data) {
        return ExtendedError::from_value(&response.data);
    }

    let mut message = response.status_text.clone();
    if message.is_empty() {
        message = response
            .data
            .get("error")
            .and_then(|item| item.as_str())
            .unwrap_or_default()
            .to_string();
    }
    if message.is_empty() {
        message = error.message.clone();
    }
    ExtendedError::new(message, response.status).with_details(response.data.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ErrorCode;

    #[test]
    fn network_failure_is_bad_request() {
        let error = parse_http_error(&HttpClientError::network("connection refused"));
        assert_eq!(error.message, "connection refused");
        assert_eq!(error.code, ErrorCode::Number(400));
    }

    #[test]
    fn empty_body_is_bad_request() {
        let error = parse_http_error(&HttpClientError::status(502, "Bad Gateway", json!(null)));
        assert_eq!(error.message, "Request failed with status code 502");
        assert_eq!(error.code, ErrorCode::Number(400));
    }

    #[test]
    fn structured_body_is_kept() {
        let body = json!({"message": "User not found", "code": "USER_NOT_FOUND", "details": {"id": 7}});
        let error = parse_http_error(&HttpClientError::status(404, "Not Found", body));
        assert_eq!(error.message, "User not found");
        assert_eq!(error.code, ErrorCode::Text("USER_NOT_FOUND".into()));
        assert_eq!(error.details, Some(json!({"id": 7})));
    }

    #[test]
    fn status_text_or_body_error_becomes_message() {
        let error = parse_http_error(&HttpClientError::status(
            503,
            "Service Unavailable",
            json!({"retry": true}),
        ));
        assert_eq!(error.message, "Service Unavailable");
        assert_eq!(error.code, ErrorCode::Number(503));
        assert_eq!(error.details, Some(json!({"retry": true})));

        let error = parse_http_error(&HttpClientError::status(599, "", json!({"error": "Boom"})));
        assert_eq!(error.message, "Boom");
        assert_eq!(error.code, ErrorCode::Number(599));
    }
}
