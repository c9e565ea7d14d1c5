//! 传输层统一错误定义
//!
//! - `ExtendedError`：跨边界传递的结构化错误（message / code / details / stack）；
//! - `TransportError`：传输核心的错误分类，所有变体都可以转换为 `ExtendedError`；
//! - `CryptoError`：签名/验签时的编码与密钥错误。
//!
//! 调用方最终只会看到结构化错误，不会看到底层通道（HTTP 客户端等）的原生错误形态。
//!
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// 错误码：数字（HTTP 状态码、默认码）或字符串（传输层错误码）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Number(code) => write!(f, "{code}"),
            ErrorCode::Text(code) => f.write_str(code),
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(value: i64) -> Self {
        ErrorCode::Number(value)
    }
}

impl From<u16> for ErrorCode {
    fn from(value: u16) -> Self {
        ErrorCode::Number(i64::from(value))
    }
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        ErrorCode::Text(value.to_string())
    }
}

impl From<String> for ErrorCode {
    fn from(value: String) -> Self {
        ErrorCode::Text(value)
    }
}

/// 结构化错误
///
/// 序列化形态为 `{ message, code, details, isFatal }`，`stack` 仅在进程内保留。
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} ({code})")]
#[serde(rename_all = "camelCase")]
pub struct ExtendedError {
    pub message: String,
    pub code: ErrorCode,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default = "default_fatal")]
    pub is_fatal: bool,
    #[serde(skip)]
    pub stack: Option<String>,
}

fn default_fatal() -> bool {
    true
}

impl ExtendedError {
    pub const DEFAULT_ERROR_CODE: i64 = -1000;
    pub const DEFAULT_ERROR_MESSAGE: &'static str = "Default extended error";
    pub const UNDEFINED_ERROR_MESSAGE: &'static str = "Undefined error";

    pub const HTTP_CODE_BAD_REQUEST: u16 = 400;
    pub const HTTP_CODE_UNAUTHORIZED: u16 = 401;
    pub const HTTP_CODE_FORBIDDEN: u16 = 403;
    pub const HTTP_CODE_NOT_FOUND: u16 = 404;
    pub const HTTP_CODE_REQUEST_TIMEOUT: u16 = 408;
    pub const HTTP_CODE_INTERNAL_SERVER_ERROR: u16 = 500;
    pub const HTTP_CODE_NOT_IMPLEMENTED: u16 = 501;
    pub const HTTP_CODE_SERVICE_UNAVAILABLE: u16 = 503;

    pub fn new(message: impl Into<String>, code: impl Into<ErrorCode>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
            is_fatal: true,
            stack: None,
        }
    }

    /// 使用默认错误码创建
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::new(Self::UNDEFINED_ERROR_MESSAGE, Self::DEFAULT_ERROR_CODE);
        }
        Self::new(message, Self::DEFAULT_ERROR_CODE)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// 将任意 `anyhow::Error` 归一化为结构化错误
    ///
    /// - 已经是 `ExtendedError` / `TransportError` 的直接转换；
    /// - 其余错误使用完整错误链作为 message，`{:?}` 输出（含 backtrace）作为 stack。
    pub fn create(error: &anyhow::Error) -> Self {
        if let Some(item) = error.downcast_ref::<ExtendedError>() {
            return item.clone();
        }
        if let Some(item) = error.downcast_ref::<TransportError>() {
            return item.to_extended();
        }
        Self::from_message(format!("{error:#}")).with_stack(format!("{error:?}"))
    }

    /// 将标准错误归一化为结构化错误
    pub fn from_std(error: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(item) = error.downcast_ref::<ExtendedError>() {
            return item.clone();
        }
        if let Some(item) = error.downcast_ref::<TransportError>() {
            return item.to_extended();
        }
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::from_message(message).with_stack(format!("{error:?}"))
    }

    /// 判断一个 JSON 值是否具备结构化错误的形态（同时含有 code / message / details 字段）
    pub fn is_shape(value: &Value) -> bool {
        match value.as_object() {
            Some(map) => {
                map.contains_key("code") && map.contains_key("message") && map.contains_key("details")
            }
            None => false,
        }
    }

    /// 从 JSON 值还原结构化错误，缺失字段使用默认值
    pub fn from_value(value: &Value) -> Self {
        let code = match value.get("code") {
            Some(Value::Number(n)) => n
                .as_i64()
                .map(ErrorCode::Number)
                .unwrap_or(ErrorCode::Number(Self::DEFAULT_ERROR_CODE)),
            Some(Value::String(s)) => ErrorCode::Text(s.clone()),
            _ => ErrorCode::Number(Self::DEFAULT_ERROR_CODE),
        };
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(Self::DEFAULT_ERROR_MESSAGE)
            .to_string();
        let details = value.get("details").filter(|v| !v.is_null()).cloned();
        let is_fatal = value.get("isFatal").and_then(Value::as_bool).unwrap_or(true);

        Self {
            message,
            code,
            details,
            is_fatal,
            stack: None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "message": self.message,
            "code": self.code,
            "details": self.details,
            "isFatal": self.is_fatal,
        })
    }

    /// 人类可读的完整描述：`message (code)`，若有 details 则换行追加格式化后的 details
    pub fn to_detailed_string(&self) -> String {
        let mut value = self.to_string();
        if let Some(details) = &self.details {
            let details = match details {
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed) if parsed.is_object() || parsed.is_array() => {
                        serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| s.clone())
                    }
                    _ => s.clone(),
                },
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            };
            value.push('\n');
            value.push_str(&details);
        }
        value
    }
}

/// 传输层错误分类
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    // --- 构造期 ---
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    // --- 路由 ---
    #[error("No listener for \"{name}\" command")]
    NoListener { name: String },
    #[error("Command \"{name}\" already listening")]
    AlreadyListening { name: String },

    // --- 超时/等待 ---
    #[error("{name} ({id}) is timed out")]
    Timeout { name: String, id: String },
    #[error("{name} ({id}) wait timeout or count exceeded")]
    WaitExceeded { name: String, id: String },
    /// 处理器发出的 "稍后重试" 信号，不会传递给调用方
    #[error("{0}")]
    Wait(String),

    // --- 通道 ---
    #[error("{name} ({id}) no connection")]
    NoConnection { name: String, id: String },
    #[error("{message}")]
    InvalidData {
        message: String,
        details: Option<Value>,
    },
    #[error("Method doesn't implemented: {0}")]
    NotImplemented(String),
    #[error("Transport is destroyed")]
    Destroyed,

    // --- 内部 ---
    #[error("Unreachable statement: {0}")]
    UnreachableStatement(String),

    // --- 通用 ---
    #[error("{}", .0.message)]
    Extended(ExtendedError),
}

impl TransportError {
    pub const TIMEOUT_CODE: &'static str = "TRANSPORT_TIMEOUT_ERROR";
    pub const WAIT_CODE: &'static str = "TRANSPORT_WAIT_ERROR";
    pub const WAIT_EXCEED_CODE: &'static str = "TRANSPORT_WAIT_EXCEED_ERROR";
    pub const NO_CONNECTION_CODE: &'static str = "TRANSPORT_NO_CONNECTION_ERROR";
    pub const NO_LISTENER_CODE: &'static str = "TRANSPORT_NO_LISTENER_ERROR";
    pub const INVALID_DATA_CODE: &'static str = "TRANSPORT_INVALID_DATA";
    pub const DESTROYED_CODE: &'static str = "TRANSPORT_DESTROYED_ERROR";
    pub const UNREACHABLE_STATEMENT_CODE: &'static str = "UNREACHABLE_STATEMENT_ERROR";

    pub fn wait(message: impl Into<String>) -> Self {
        TransportError::Wait(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TransportError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_data(message: impl Into<String>, details: Option<Value>) -> Self {
        TransportError::InvalidData {
            message: message.into(),
            details,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::Validation { .. } => {
                ErrorCode::from(ExtendedError::HTTP_CODE_BAD_REQUEST)
            }
            TransportError::NoListener { .. } => ErrorCode::from(Self::NO_LISTENER_CODE),
            TransportError::AlreadyListening { .. } => {
                ErrorCode::Number(ExtendedError::DEFAULT_ERROR_CODE)
            }
            TransportError::Timeout { .. } => ErrorCode::from(Self::TIMEOUT_CODE),
            TransportError::WaitExceeded { .. } => ErrorCode::from(Self::WAIT_EXCEED_CODE),
            TransportError::Wait(_) => ErrorCode::from(Self::WAIT_CODE),
            TransportError::NoConnection { .. } => ErrorCode::from(Self::NO_CONNECTION_CODE),
            TransportError::InvalidData { .. } => ErrorCode::from(Self::INVALID_DATA_CODE),
            TransportError::NotImplemented(_) => {
                ErrorCode::from(ExtendedError::HTTP_CODE_NOT_IMPLEMENTED)
            }
            TransportError::Destroyed => ErrorCode::from(Self::DESTROYED_CODE),
            TransportError::UnreachableStatement(_) => {
                ErrorCode::from(Self::UNREACHABLE_STATEMENT_CODE)
            }
            TransportError::Extended(e) => e.code.clone(),
        }
    }

    /// 是否为等待信号（无论是本地变体还是跨边界还原后的错误码）
    pub fn is_wait(&self) -> bool {
        match self {
            TransportError::Wait(_) => true,
            TransportError::Extended(e) => e.code == ErrorCode::from(Self::WAIT_CODE),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.code() == ErrorCode::from(Self::TIMEOUT_CODE)
    }

    pub fn is_wait_exceeded(&self) -> bool {
        self.code() == ErrorCode::from(Self::WAIT_EXCEED_CODE)
    }

    pub fn is_no_listener(&self) -> bool {
        self.code() == ErrorCode::from(Self::NO_LISTENER_CODE)
    }

    pub fn is_no_connection(&self) -> bool {
        self.code() == ErrorCode::from(Self::NO_CONNECTION_CODE)
    }

    pub fn to_extended(&self) -> ExtendedError {
        if let TransportError::Extended(e) = self {
            return e.clone();
        }
        let error = ExtendedError::new(self.to_string(), self.code());
        match self {
            TransportError::Validation {
                details: Some(details),
                ..
            }
            | TransportError::InvalidData {
                details: Some(details),
                ..
            } => error.with_details(details.clone()),
            _ => error,
        }
    }
}

impl From<ExtendedError> for TransportError {
    fn from(error: ExtendedError) -> Self {
        if error.code == ErrorCode::from(TransportError::WAIT_CODE) {
            return TransportError::Wait(error.message);
        }
        TransportError::Extended(error)
    }
}

impl From<TransportError> for ExtendedError {
    fn from(error: TransportError) -> Self {
        error.to_extended()
    }
}

/// 统一 Result 类型别名
pub type TransportResult<T> = Result<T, TransportError>;

/// 签名/验签错误
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid key length: expected={expected}, found={found}")]
    KeyLength { expected: &'static str, found: usize },
    #[error("invalid signature length: expected=64, found={0}")]
    SignatureLength(usize),
    #[error("invalid key: {0}")]
    Key(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
