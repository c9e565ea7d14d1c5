//! 命令处理器（CommandHandler）
//!
//! 处理器在启动时为一个命令名注册监听，对每个入站命令依次执行：
//! `check_request` → `execute` → `check_response` → `complete`。
//! 执行中的错误在处理器边界被拦截：等待信号转为 `wait`，其余错误归一化后作为失败应答。
//!
use crate::engine::Transport;
use async_trait::async_trait;
use courier_core::{Command, ExtendedError, TransportError};
use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    type Request: DeserializeOwned + Send;
    type Response: Serialize + Send;

    /// 监听的命令名
    fn name(&self) -> &str;

    fn check_request(&self, request: Self::Request) -> anyhow::Result<Self::Request> {
        Ok(request)
    }

    async fn execute(
        &self,
        request: Self::Request,
        command: &Command,
    ) -> anyhow::Result<Self::Response>;

    fn check_response(&self, response: Self::Response) -> anyhow::Result<Self::Response> {
        Ok(response)
    }
}

/// 启动命令处理器，返回可用于关闭/等待的句柄
///
/// 每个入站命令在独立任务中处理，不同命令之间没有顺序保证。
pub fn spawn_command_handler<H: CommandHandler>(
    transport: &Transport,
    handler: Arc<H>,
) -> Result<HandlerHandle, TransportError> {
    let name = handler.name().to_string();
    let mut stream = transport.listen(name.clone())?;
    let token = CancellationToken::new();

    let task = {
        let transport = transport.clone();
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    maybe_command = stream.next() => {
                        let Some(command) = maybe_command else { break };
                        let transport = transport.clone();
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            handle_command(&transport, handler.as_ref(), command).await;
                        });
                    }
                }
            }
        })
    };

    Ok(HandlerHandle {
        transport: transport.clone(),
        listener: Some(name),
        token,
        tasks: vec![task],
    })
}

async fn handle_command<H: CommandHandler>(transport: &Transport, handler: &H, command: Command) {
    let request = match command.request_as::<H::Request>() {
        Ok(request) => request,
        Err(error) => {
            warn!(command = %command, error = %error, "Unable to decode command request");
            transport.complete(command, Err(error)).await;
            return;
        }
    };

    let result = async {
        let request = handler.check_request(request)?;
        let response = handler.execute(request, &command).await?;
        let response = handler.check_response(response)?;
        Ok::<_, anyhow::Error>(serde_json::to_value(response)?)
    }
    .await;

    match result {
        Ok(value) => transport.complete(command, Ok(value)).await,
        Err(error) => handle_error(transport, command, error).await,
    }
}

async fn handle_error(transport: &Transport, command: Command, error: anyhow::Error) {
    if is_wait_error(&error) {
        if let Err(error) = transport.wait(command).await {
            warn!(error = %error, "Unable to wait command");
        }
        return;
    }

    let error = ExtendedError::create(&error);
    let name = command.to_string();
    transport
        .complete(command, Err(TransportError::from(error.clone())))
        .await;
    error!(
        command = %name,
        error = %error,
        stack = error.stack.as_deref().unwrap_or_default(),
        "Command handler failed"
    );
}

/// 等待信号：`TransportError::Wait` 或携带等待错误码的结构化错误
pub fn is_wait_error(error: &anyhow::Error) -> bool {
    if let Some(error) = error.downcast_ref::<TransportError>() {
        return error.is_wait();
    }
    if let Some(error) = error.downcast_ref::<ExtendedError>() {
        return TransportError::from(error.clone()).is_wait();
    }
    false
}

/// 处理器运行句柄：用于关闭与等待任务结束
///
/// 关闭时同时取消命令监听，此后同名命令可以再次监听。
pub struct HandlerHandle {
    pub(crate) transport: Transport,
    pub(crate) listener: Option<String>,
    pub(crate) token: CancellationToken,
    pub(crate) tasks: Vec<JoinHandle<()>>,
}

impl HandlerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
        if let Some(name) = &self.listener {
            self.transport.unlisten(name);
        }
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for HandlerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
