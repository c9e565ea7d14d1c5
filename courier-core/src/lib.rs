//! 命令/应答传输核心的数据契约（courier-core）
//!
//! 提供传输层两端共享的模型与工具：
//! - 命令（`command`）与事件（`event`）模型
//! - 发送选项与传输配置（`options`）：超时、等待退避
//! - 统一错误（`error`）与请求载荷校验（`validate`）
//! - 日志类型与渲染（`log`）
//! - 命令签名（`crypto`）：Ed25519
//!
//! 本 crate 不包含任何运行时或通道实现，传输引擎见 `courier-transport`，
//! HTTP 通道见 `courier-http`。
//!
pub mod command;
pub mod crypto;
pub mod error;
pub mod event;
pub mod log;
pub mod options;
pub mod validate;

pub use command::{Command, CommandKind};
pub use error::{
    CryptoError, CryptoResult, ErrorCode, ExtendedError, TransportError, TransportResult,
};
pub use event::{Event, EventTrace};
pub use log::LogType;
pub use options::{CommandOptions, TransportSettings, WaitDelay};
pub use validate::{Validate, ValidationError};
