//! 传输通道（Channel）
//!
//! 引擎只负责簿记与状态机，命令与事件如何真正到达对端由通道决定。
//! 具体通道（进程内、HTTP 等）实现以下传输钩子，并注入到 `Transport`。
//!
use crate::engine::Transport;
use crate::request::CommandRequest;
use async_trait::async_trait;
use courier_core::{Command, CommandOptions, Event, TransportResult};

#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// 通道名称（用于日志）
    fn name(&self) -> &str;

    /// 发送命令；返回错误时，若命令需要应答，错误将作为应答交给调用方
    async fn execute_request(
        &self,
        transport: &Transport,
        command: &Command,
        options: &CommandOptions,
        is_need_reply: bool,
    ) -> TransportResult<()>;

    /// 回送已写入应答的异步命令，默认交给本端的待应答记录
    async fn execute_response(
        &self,
        transport: &Transport,
        command: &Command,
        _request: &CommandRequest,
    ) -> TransportResult<()> {
        transport.response_received(command);
        Ok(())
    }

    /// 发送事件
    async fn execute_event(&self, transport: &Transport, event: &Event) -> TransportResult<()>;

    /// 是否支持接收命令与事件（`listen` / `dispatch` / `get_dispatcher`）
    fn supports_receiving(&self) -> bool {
        true
    }
}
