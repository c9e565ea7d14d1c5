//! 进程内通道（LocalChannel）
//!
//! 发送与投递发生在同一进程内：命令直接按名称推送给本地监听者，
//! 异步命令结束后立即作为本端应答处理；事件直接推送给同名分发器。
//! 该通道没有网络失败，只会因没有监听者、请求过期或处理器出错而失败。
//!
use crate::channel::Channel;
use crate::engine::Transport;
use async_trait::async_trait;
use courier_core::log::LogType;
use courier_core::{Command, CommandOptions, Event, TransportResult, TransportSettings};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalChannel;

impl LocalChannel {
    pub const NAME: &'static str = "local";
}

#[async_trait]
impl Channel for LocalChannel {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute_request(
        &self,
        transport: &Transport,
        command: &Command,
        options: &CommandOptions,
        is_need_reply: bool,
    ) -> TransportResult<()> {
        transport.log_command(command, LogType::RequestReceived);
        transport.register_request(command, options, is_need_reply);
        transport.response_dispatch(command.clone()).await;
        Ok(())
    }

    async fn execute_event(&self, transport: &Transport, event: &Event) -> TransportResult<()> {
        transport.event_received(event);
        Ok(())
    }
}

impl Transport {
    /// 创建进程内传输
    pub fn local(settings: TransportSettings) -> Self {
        Transport::new(Arc::new(LocalChannel), settings)
    }
}
