//! 传输命令（Command）
//!
//! 命令由稳定的 `id`、路由键 `name` 与请求载荷 `request` 组成。
//! 命令分为两类，在构造时确定（显式标签，而非运行时形态探测）：
//! - `CommandKind::FireAndForget`：只发送，不期待应答；
//! - `CommandKind::Async`：发送方等待与之关联的应答，应答写入 `data` 或 `error`（二者之一，至多一次）。
//!
use crate::error::{ExtendedError, TransportError, TransportResult};
use crate::validate::Validate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// 命令类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    FireAndForget,
    Async,
}

/// 传输命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    id: String,
    name: String,
    request: Value,
    kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ExtendedError>,
}

impl Command {
    /// 创建只发送的命令，构造时校验请求载荷
    pub fn new<T>(name: impl Into<String>, request: &T) -> TransportResult<Self>
    where
        T: Serialize + Validate + ?Sized,
    {
        Self::validated(name.into(), request, CommandKind::FireAndForget)
    }

    /// 创建期待应答的命令，构造时校验请求载荷
    pub fn new_async<T>(name: impl Into<String>, request: &T) -> TransportResult<Self>
    where
        T: Serialize + Validate + ?Sized,
    {
        Self::validated(name.into(), request, CommandKind::Async)
    }

    /// 由已经序列化的载荷直接组装（例如从线上收到的命令），不做校验
    pub fn from_parts(
        id: Option<String>,
        name: impl Into<String>,
        request: Value,
        kind: CommandKind,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: name.into(),
            request: normalize_request(request),
            kind,
            data: None,
            error: None,
        }
    }

    fn validated<T>(name: String, request: &T, kind: CommandKind) -> TransportResult<Self>
    where
        T: Serialize + Validate + ?Sized,
    {
        request.validate()?;
        let value = serde_json::to_value(request)
            .map_err(|e| TransportError::invalid_data(e.to_string(), None))?;
        Ok(Self::from_parts(None, name, value, kind))
    }

    /// 指定命令 ID（默认生成 UUID v4）
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn is_async(&self) -> bool {
        self.kind == CommandKind::Async
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ExtendedError> {
        self.error.as_ref()
    }

    /// 是否为带错误应答的异步命令
    pub fn has_error(&self) -> bool {
        self.is_async() && self.error.is_some()
    }

    pub fn is_responded(&self) -> bool {
        self.data.is_some() || self.error.is_some()
    }

    /// 写入应答：只对异步命令生效，且只接受第一次写入
    ///
    /// 返回是否写入成功。
    pub fn response(&mut self, result: Result<Value, TransportError>) -> bool {
        if !self.is_async() || self.is_responded() {
            return false;
        }
        match result {
            Ok(data) => self.data = Some(data),
            Err(error) => self.error = Some(error.to_extended()),
        }
        true
    }

    /// 应答结果（仅当已写入应答时）
    pub fn outcome(&self) -> Option<Result<Value, TransportError>> {
        if let Some(error) = &self.error {
            return Some(Err(TransportError::from(error.clone())));
        }
        self.data.clone().map(Ok)
    }

    /// 将请求载荷反序列化为具体类型
    pub fn request_as<T: DeserializeOwned>(&self) -> TransportResult<T> {
        serde_json::from_value(self.request.clone()).map_err(|e| {
            TransportError::invalid_data(
                format!("Invalid \"{}\" command request: {e}", self.name),
                Some(self.request.clone()),
            )
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

fn normalize_request(request: Value) -> Value {
    match request {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationError;
    use serde_json::json;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Transfer {
        amount: i64,
    }

    impl Validate for Transfer {
        fn validate(&self) -> Result<(), ValidationError> {
            if self.amount <= 0 {
                return Err(ValidationError::field("amount", "must be positive"));
            }
            Ok(())
        }
    }

    #[test]
    fn invalid_request_is_rejected_at_construction() {
        let err = Command::new_async("bank.transfer", &Transfer { amount: 0 }).unwrap_err();
        assert!(matches!(err, TransportError::Validation { .. }));
    }

    #[test]
    fn id_is_generated_unless_given() {
        let a = Command::new("ping", &json!({})).unwrap();
        let b = Command::new("ping", &json!({})).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().with_id("fixed").id(), "fixed");
        assert_eq!(a.kind(), CommandKind::FireAndForget);
    }

    #[test]
    fn missing_request_becomes_empty_object() {
        let command = Command::new_async("ping", &()).unwrap();
        assert_eq!(command.request(), &json!({}));
    }

    #[test]
    fn response_is_written_once_and_only_for_async() {
        let mut command = Command::new_async("bank.transfer", &Transfer { amount: 5 }).unwrap();
        assert!(command.response(Ok(json!({"ok": true}))));
        assert!(!command.response(Err(TransportError::Destroyed)));
        assert_eq!(command.data(), Some(&json!({"ok": true})));
        assert!(!command.has_error());

        let mut fire = Command::new("bank.audit", &json!({})).unwrap();
        assert!(!fire.response(Ok(json!(1))));
        assert!(!fire.is_responded());
    }

    #[test]
    fn error_response_marks_command() {
        let mut command = Command::new_async("x", &json!({})).unwrap();
        command.response(Err(TransportError::NoListener { name: "x".into() }));
        assert!(command.has_error());
        assert!(command.outcome().unwrap().unwrap_err().is_no_listener());
    }

    #[test]
    fn request_as_reports_invalid_data() {
        let command = Command::new_async("bank.transfer", &json!({"amount": "ten"})).unwrap();
        let err = command.request_as::<Transfer>().unwrap_err();
        assert!(matches!(err, TransportError::InvalidData { .. }));

        let command = Command::new_async("bank.transfer", &Transfer { amount: 10 }).unwrap();
        assert_eq!(command.request_as::<Transfer>().unwrap(), Transfer { amount: 10 });
    }
}
