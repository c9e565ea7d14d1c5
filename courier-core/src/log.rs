//! 传输日志类型与渲染
//!
//! 每一次状态迁移都对应一个 `LogType`，每个类型有固定的单字符标记。
//! 命令渲染为 `"<mark> <name> <suffix> (<id>)"`，事件渲染为 `"<mark> <name>"`。
//!
use crate::command::Command;
use crate::error::TransportError;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    RequestSended,
    RequestReceived,
    RequestNoReply,
    RequestExpired,
    RequestNoListener,

    ResponseReceived,
    ResponseSended,
    ResponseNoReply,
    ResponseNoReplyError,
    ResponseExpired,
    ResponseWait,
    ResponseWaitExceeded,
    ResponseTimeout,

    EventSended,
    EventReceived,
    EventReceivedNoListener,
}

impl LogType {
    pub const ALL: [LogType; 16] = [
        LogType::RequestSended,
        LogType::RequestReceived,
        LogType::RequestNoReply,
        LogType::RequestExpired,
        LogType::RequestNoListener,
        LogType::ResponseReceived,
        LogType::ResponseSended,
        LogType::ResponseNoReply,
        LogType::ResponseNoReplyError,
        LogType::ResponseExpired,
        LogType::ResponseWait,
        LogType::ResponseWaitExceeded,
        LogType::ResponseTimeout,
        LogType::EventSended,
        LogType::EventReceived,
        LogType::EventReceivedNoListener,
    ];

    pub const fn mark(self) -> char {
        match self {
            LogType::RequestSended => '→',
            LogType::RequestReceived => '⇠',
            LogType::RequestNoReply => '⇥',
            LogType::RequestExpired => '↚',
            LogType::RequestNoListener => '⊘',

            LogType::ResponseReceived => '←',
            LogType::ResponseSended => '⇢',
            LogType::ResponseNoReply => '✔',
            LogType::ResponseNoReplyError => '✘',
            LogType::ResponseExpired => '↛',
            LogType::ResponseWait => '↺',
            LogType::ResponseWaitExceeded => '↯',
            LogType::ResponseTimeout => '⧖',

            LogType::EventSended => '↣',
            LogType::EventReceived => '↢',
            LogType::EventReceivedNoListener => '↤',
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LogType::RequestSended => "REQUEST_SENDED",
            LogType::RequestReceived => "REQUEST_RECEIVED",
            LogType::RequestNoReply => "REQUEST_NO_REPLY",
            LogType::RequestExpired => "REQUEST_EXPIRED",
            LogType::RequestNoListener => "REQUEST_NO_LISTENER",
            LogType::ResponseReceived => "RESPONSE_RECEIVED",
            LogType::ResponseSended => "RESPONSE_SENDED",
            LogType::ResponseNoReply => "RESPONSE_NO_REPLY",
            LogType::ResponseNoReplyError => "RESPONSE_NO_REPLY_ERROR",
            LogType::ResponseExpired => "RESPONSE_EXPIRED",
            LogType::ResponseWait => "RESPONSE_WAIT",
            LogType::ResponseWaitExceeded => "RESPONSE_WAIT_EXCEEDED",
            LogType::ResponseTimeout => "RESPONSE_TIMEOUT",
            LogType::EventSended => "EVENT_SENDED",
            LogType::EventReceived => "EVENT_RECEIVED",
            LogType::EventReceivedNoListener => "EVENT_RECEIVED_NO_LISTENER",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|item| item.as_str() == s)
            .ok_or_else(|| TransportError::UnreachableStatement(format!("log type {s}")))
    }
}

/// 命令日志过滤器：返回 false 时不输出
pub type CommandLogFilter = Arc<dyn Fn(&Command, LogType) -> bool + Send + Sync>;
/// 事件日志过滤器：返回 false 时不输出
pub type EventLogFilter = Arc<dyn Fn(&Event, LogType) -> bool + Send + Sync>;

/// 命令结果后缀：`•` 无结果，`✔` 成功，`✘` 失败
pub fn command_suffix(command: &Command) -> char {
    if command.is_async() && command.is_responded() {
        if command.has_error() { '✘' } else { '✔' }
    } else {
        '•'
    }
}

pub fn command_to_string(command: &Command, log_type: LogType) -> String {
    format!(
        "{} {} {} ({})",
        log_type.mark(),
        command.name(),
        command_suffix(command),
        command.id()
    )
}

pub fn event_to_string(event: &Event, log_type: LogType) -> String {
    format!("{} {}", log_type.mark(), event.name())
}

/// 载荷的详细输出（格式化 JSON），载荷为空时返回 None
pub fn verbose(data: Option<&Value>, log_type: LogType) -> Option<String> {
    let data = data.filter(|value| !value.is_null())?;
    let text = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    Some(format!("{} {text}", log_type.mark()))
}
