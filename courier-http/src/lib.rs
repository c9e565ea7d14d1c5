//! HTTP 通道（courier-http）
//!
//! - `settings`：通道配置（基础地址、默认方法、请求头）；
//! - `request`：HTTP 请求描述与发送前的规范化；
//! - `client`：HTTP 客户端抽象及 `reqwest` 实现；
//! - `error`：客户端失败归一化为结构化错误；
//! - `channel`：`HttpChannel` 与便捷封装 `HttpTransport`。
//!
pub mod channel;
pub mod client;
pub mod error;
pub mod request;
pub mod settings;

pub use channel::{HttpChannel, HttpTransport};
pub use client::{HttpClient, HttpClientError, HttpErrorResponse, ReqwestHttpClient};
pub use error::parse_http_error;
pub use request::{HttpRequest, prepare_request};
pub use settings::{HttpMethod, HttpSettings};
