//! 发送端的待应答记录
//!
//! 每个发出的异步命令对应一条记录，持有命令本身与一个 oneshot 发送端；
//! 调用方拿到的是可克隆的共享 future，同一命令 ID 的重复发送共享同一个 future。
//! 记录结束时取消自身的令牌，超时定时器随之退出。
//!
use courier_core::{Command, TransportError, TransportResult};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// 等待命令应答的 future
pub type CommandFuture = Shared<BoxFuture<'static, TransportResult<Value>>>;

pub(crate) struct CommandPromise {
    pub(crate) command: Command,
    /// 每次发送唯一，用于区分复用同一命令 ID 的先后两次发送
    pub(crate) seq: u64,
    pub(crate) token: CancellationToken,
    sender: oneshot::Sender<TransportResult<Value>>,
    future: CommandFuture,
}

impl CommandPromise {
    pub(crate) fn new(command: Command, seq: u64, token: CancellationToken) -> Self {
        let (sender, receiver) = oneshot::channel();
        let future = async move {
            match receiver.await {
                Ok(result) => result,
                // 传输被销毁时发送端被丢弃，调用方的 future 保持挂起
                Err(_) => std::future::pending().await,
            }
        }
        .boxed()
        .shared();

        Self {
            command,
            seq,
            token,
            sender,
            future,
        }
    }

    pub(crate) fn future(&self) -> CommandFuture {
        self.future.clone()
    }

    pub(crate) fn resolve(self, result: TransportResult<Value>) -> bool {
        self.token.cancel();
        self.sender.send(result).is_ok()
    }
}

/// 立即失败的 future
pub(crate) fn rejected(error: TransportError) -> CommandFuture {
    futures_util::future::ready(Err(error)).boxed().shared()
}
