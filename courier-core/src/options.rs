//! 命令发送选项与传输配置
//!
//! - `WaitDelay`：等待重试的退避间隔，只允许固定的几个毫秒值；
//! - `CommandOptions`：单次发送的配置，线上形态为 `{ timeout?, waitMax?, waitDelay?, waitTimeout? }`；
//! - `TransportSettings`：传输实例级别的默认值。
//!
//! 默认值在发送时统一注入（`with_defaults`），序列化前可再剥离与默认值相同的字段
//! （`strip_defaults`），保持线上选项最小化。
//!
use crate::error::TransportError;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// 默认最大等待次数
pub const DEFAULT_WAIT_MAX_COUNT: u32 = 3;
/// 默认等待间隔
pub const DEFAULT_WAIT_DELAY: WaitDelay = WaitDelay::Normal;

/// 等待重试的退避间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum WaitDelay {
    ExtraFast,
    SuperFast,
    Fast,
    Normal,
    Slow,
    SuperSlow,
    ExtraSlow,
}

impl WaitDelay {
    pub const ALL: [WaitDelay; 7] = [
        WaitDelay::ExtraFast,
        WaitDelay::SuperFast,
        WaitDelay::Fast,
        WaitDelay::Normal,
        WaitDelay::Slow,
        WaitDelay::SuperSlow,
        WaitDelay::ExtraSlow,
    ];

    pub const fn as_millis(self) -> u64 {
        match self {
            WaitDelay::ExtraFast => 100,
            WaitDelay::SuperFast => 500,
            WaitDelay::Fast => 1_000,
            WaitDelay::Normal => 3_000,
            WaitDelay::Slow => 5_000,
            WaitDelay::SuperSlow => 10_000,
            WaitDelay::ExtraSlow => 30_000,
        }
    }

    pub const fn as_duration(self) -> Duration {
        Duration::from_millis(self.as_millis())
    }
}

impl From<WaitDelay> for u64 {
    fn from(value: WaitDelay) -> Self {
        value.as_millis()
    }
}

impl TryFrom<u64> for WaitDelay {
    type Error = TransportError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        WaitDelay::ALL
            .into_iter()
            .find(|item| item.as_millis() == value)
            .ok_or_else(|| TransportError::UnreachableStatement(format!("wait delay {value}")))
    }
}

/// 传输实例级别的默认配置
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// 发送方放弃等待前的毫秒数
    #[builder(default = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,
    #[builder(default = DEFAULT_WAIT_DELAY)]
    pub default_wait_delay: WaitDelay,
    #[builder(default = DEFAULT_WAIT_MAX_COUNT)]
    pub default_wait_max_count: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_MS,
            default_wait_delay: DEFAULT_WAIT_DELAY,
            default_wait_max_count: DEFAULT_WAIT_MAX_COUNT,
        }
    }
}

/// 单次发送的选项
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOptions {
    /// 超时（毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// 最大等待次数
    #[serde(default, rename = "waitMax", skip_serializing_if = "Option::is_none")]
    pub wait_max_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_delay: Option<WaitDelay>,
    /// 等待重试的总预算（毫秒），未设置时取本次命令的超时
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<u64>,
}

impl CommandOptions {
    /// 注入默认值
    pub fn with_defaults(mut self, settings: &TransportSettings) -> Self {
        self.timeout.get_or_insert(settings.timeout);
        self.wait_delay.get_or_insert(settings.default_wait_delay);
        self.wait_max_count
            .get_or_insert(settings.default_wait_max_count);
        self
    }

    /// 剥离与默认值相同的字段
    pub fn strip_defaults(mut self, settings: &TransportSettings) -> Self {
        if self.timeout == Some(settings.timeout) {
            self.timeout = None;
        }
        if self.wait_delay == Some(settings.default_wait_delay) {
            self.wait_delay = None;
        }
        if self.wait_max_count == Some(settings.default_wait_max_count) {
            self.wait_max_count = None;
        }
        if self.wait_timeout.is_some() && self.wait_timeout == self.timeout.or(Some(settings.timeout))
        {
            self.wait_timeout = None;
        }
        self
    }

    pub fn timeout(&self, settings: &TransportSettings) -> Duration {
        Duration::from_millis(self.timeout.unwrap_or(settings.timeout))
    }

    pub fn wait_delay(&self, settings: &TransportSettings) -> WaitDelay {
        self.wait_delay.unwrap_or(settings.default_wait_delay)
    }

    pub fn wait_max_count(&self, settings: &TransportSettings) -> u32 {
        self.wait_max_count
            .unwrap_or(settings.default_wait_max_count)
    }

    pub fn wait_timeout(&self, settings: &TransportSettings) -> Duration {
        match self.wait_timeout {
            Some(value) => Duration::from_millis(value),
            None => self.timeout(settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wait_delay_is_serialized_as_millis() {
        assert_eq!(serde_json::to_value(WaitDelay::ExtraSlow).unwrap(), json!(30000));
        assert_eq!(
            serde_json::from_value::<WaitDelay>(json!(100)).unwrap(),
            WaitDelay::ExtraFast
        );
        assert!(serde_json::from_value::<WaitDelay>(json!(42)).is_err());
    }

    #[test]
    fn defaults_are_injected_then_stripped() {
        let settings = TransportSettings::default();
        let options = CommandOptions::builder()
            .wait_delay(WaitDelay::Fast)
            .build()
            .with_defaults(&settings);

        assert_eq!(options.timeout, Some(DEFAULT_TIMEOUT_MS));
        assert_eq!(options.wait_max_count, Some(DEFAULT_WAIT_MAX_COUNT));
        assert_eq!(options.wait_delay, Some(WaitDelay::Fast));

        let stripped = options.strip_defaults(&settings);
        assert_eq!(
            serde_json::to_value(&stripped).unwrap(),
            json!({ "waitDelay": 1000 })
        );
    }

    #[test]
    fn wire_shape_uses_wait_max() {
        let options: CommandOptions =
            serde_json::from_value(json!({ "timeout": 500, "waitMax": 2 })).unwrap();
        assert_eq!(options.wait_max_count, Some(2));
        assert_eq!(options.timeout, Some(500));
    }

    #[test]
    fn wait_budget_falls_back_to_timeout() {
        let settings = TransportSettings::builder().timeout(1_000).build();
        let options = CommandOptions::default();
        assert_eq!(options.wait_timeout(&settings), Duration::from_millis(1_000));

        let options = CommandOptions::builder().timeout(200).wait_timeout(5_000).build();
        assert_eq!(options.wait_timeout(&settings), Duration::from_millis(5_000));
        assert_eq!(options.timeout(&settings), Duration::from_millis(200));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: TransportSettings = serde_json::from_value(json!({ "timeout": 10 })).unwrap();
        assert_eq!(settings.timeout, 10);
        assert_eq!(settings.default_wait_delay, WaitDelay::Normal);
        assert_eq!(settings.default_wait_max_count, 3);
    }
}
