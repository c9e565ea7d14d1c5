//! 命令/应答传输引擎（courier-transport）
//!
//! 在可插拔的物理通道之上提供统一的异步命令执行契约：
//! - 引擎（`engine`）：待应答/在途请求簿记、超时与过期、等待退避状态机、事件分发；
//! - 通道（`channel`）：传输钩子，由具体通道实现并注入引擎；
//! - 进程内通道（`local`）；
//! - 命令处理器（`handler`）与事件处理器（`event_handler`）。
//!
//! 典型用法：
//! 1. `Transport::local(settings)` 创建传输；
//! 2. 实现 `CommandHandler`，通过 `spawn_command_handler` 注册到传输上；
//! 3. 调用方通过 `send_listen` 发送异步命令并等待应答。
//!
pub mod channel;
pub mod engine;
pub mod event_handler;
pub mod handler;
pub mod lifecycle;
pub mod local;
pub mod promise;
pub mod request;

pub use courier_core::{CommandOptions, TransportSettings, WaitDelay};

pub use channel::Channel;
pub use engine::Transport;
pub use event_handler::{EventHandler, spawn_event_handler};
pub use handler::{CommandHandler, HandlerHandle, spawn_command_handler};
pub use lifecycle::{CommandLifecycle, CommandStatus};
pub use local::LocalChannel;
pub use promise::CommandFuture;
pub use request::CommandRequest;
