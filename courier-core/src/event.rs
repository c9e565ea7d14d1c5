//! 传输事件（Event）
//!
//! 事件只按 `name` 路由，不与任何发送方关联；一个事件可以被零个或多个订阅者接收。
//!
use crate::error::{TransportError, TransportResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// 链路追踪信息
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrace {
    trace_id: String,
    occurred_at: DateTime<Utc>,
    correlation_id: Option<String>,
}

impl EventTrace {
    pub fn generate() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            occurred_at: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn occurred_at(&self) -> &DateTime<Utc> {
        &self.occurred_at
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    uid: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace: Option<EventTrace>,
}

impl Event {
    pub fn new<T: Serialize + ?Sized>(name: impl Into<String>, data: &T) -> TransportResult<Self> {
        let data = serde_json::to_value(data)
            .map_err(|e| TransportError::invalid_data(e.to_string(), None))?;
        Ok(Self::from_parts(name, Some(data)))
    }

    /// 不带载荷的事件
    pub fn empty(name: impl Into<String>) -> Self {
        Self::from_parts(name, None)
    }

    pub fn from_parts(name: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            name: name.into(),
            data,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: EventTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// 若尚无追踪信息则生成一份
    pub fn ensure_trace(&mut self) -> &EventTrace {
        self.trace.get_or_insert_with(EventTrace::generate)
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn trace(&self) -> Option<&EventTrace> {
        self.trace.as_ref()
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> TransportResult<Option<T>> {
        match &self.data {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                TransportError::invalid_data(
                    format!("Invalid \"{}\" event data: {e}", self.name),
                    Some(value.clone()),
                )
            }),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uid)
    }
}
