//! 事件处理器（EventHandler）
//!
//! 订阅一个事件名的分发器，经过可覆盖的 `filter` 后执行 `execute(data, event)`；
//! 同一处理器内事件按到达顺序依次处理，失败只记录日志。
//!
use crate::engine::Transport;
use crate::handler::HandlerHandle;
use async_trait::async_trait;
use courier_core::{Event, TransportError};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    type Data: DeserializeOwned + Send;

    /// 订阅的事件名
    fn name(&self) -> &str;

    fn filter(&self, _event: &Event) -> bool {
        true
    }

    async fn execute(&self, data: Option<Self::Data>, event: &Event) -> anyhow::Result<()>;
}

/// 启动事件处理器，返回可用于关闭/等待的句柄
pub fn spawn_event_handler<H: EventHandler>(
    transport: &Transport,
    handler: Arc<H>,
) -> Result<HandlerHandle, TransportError> {
    let mut stream = transport.get_dispatcher(handler.name())?;
    let token = CancellationToken::new();

    let task = {
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    maybe_event = stream.next() => {
                        let Some(event) = maybe_event else { break };
                        if !handler.filter(&event) {
                            continue;
                        }
                        handle_event(handler.as_ref(), &event).await;
                    }
                }
            }
        })
    };

    Ok(HandlerHandle {
        transport: transport.clone(),
        listener: None,
        token,
        tasks: vec![task],
    })
}

async fn handle_event<H: EventHandler>(handler: &H, event: &Event) {
    let result = match event.data_as::<H::Data>() {
        Ok(data) => handler.execute(data, event).await,
        Err(error) => Err(error.into()),
    };
    if let Err(error) = result {
        error!(event = %event, error = %format!("{error:#}"), "Event handler failed");
    }
}
