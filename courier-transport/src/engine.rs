//! 传输引擎（Transport）
//!
//! 统一维护命令/事件的全部簿记，具体传输交给注入的 `Channel`：
//! - `promises`：发送端待应答记录（按命令 ID）；
//! - `requests`：接收端在途请求记录（按命令 ID）；
//! - `listeners`：命令监听（按命令名，每个名称至多一个）；
//! - `dispatchers`：事件分发（按事件名，首次订阅时创建）。
//!
//! 对同一命令 ID，正常应答、超时与等待超出三者中只有最先发生的一个会改变调用方 future 的状态：
//! 各路径都以从 `promises` 中移除记录为准，移除失败即为空操作。
//!
use crate::channel::Channel;
use crate::lifecycle::{CommandLifecycle, CommandStatus};
use crate::promise::{self, CommandFuture, CommandPromise};
use crate::request::CommandRequest;
use courier_core::log::{self, CommandLogFilter, EventLogFilter, LogType};
use courier_core::{
    Command, CommandOptions, Event, ExtendedError, TransportError, TransportResult,
    TransportSettings,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use futures_util::future::ready;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// 每个事件分发器的广播缓冲容量
pub const DISPATCHER_CAPACITY: usize = 256;
const LIFECYCLE_CAPACITY: usize = 1024;

/// 传输引擎，克隆后共享同一份状态
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

struct Inner {
    channel: Arc<dyn Channel>,
    settings: TransportSettings,
    requests: DashMap<String, CommandRequest>,
    promises: DashMap<String, CommandPromise>,
    listeners: DashMap<String, mpsc::UnboundedSender<Command>>,
    dispatchers: DashMap<String, broadcast::Sender<Event>>,
    lifecycle: broadcast::Sender<CommandLifecycle>,
    command_filters: RwLock<Vec<CommandLogFilter>>,
    event_filters: RwLock<Vec<EventLogFilter>>,
    token: CancellationToken,
    sequence: AtomicU64,
    destroyed: AtomicBool,
}

impl Transport {
    pub fn new(channel: Arc<dyn Channel>, settings: TransportSettings) -> Self {
        let (lifecycle, _rx) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                channel,
                settings,
                requests: DashMap::new(),
                promises: DashMap::new(),
                listeners: DashMap::new(),
                dispatchers: DashMap::new(),
                lifecycle,
                command_filters: RwLock::new(Vec::new()),
                event_filters: RwLock::new(Vec::new()),
                token: CancellationToken::new(),
                sequence: AtomicU64::new(0),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.inner.settings
    }

    pub fn channel_name(&self) -> &str {
        self.inner.channel.name()
    }

    // ---------------------------------------------------------------------
    // 发送端
    // ---------------------------------------------------------------------

    /// 只发送，不等待应答
    pub async fn send(
        &self,
        command: Command,
        options: Option<CommandOptions>,
    ) -> TransportResult<()> {
        self.ensure_alive()?;
        let options = self.command_options(options);
        self.command_request(&command, &options, false).await
    }

    /// 发送异步命令并返回等待应答的 future
    ///
    /// 同一命令 ID 重复调用时返回同一个 future，且只发送一次。
    /// 发送在新的 tokio 任务中进行，必须在 tokio 运行时内调用。
    pub fn send_listen(&self, command: Command, options: Option<CommandOptions>) -> CommandFuture {
        if let Err(error) = self.ensure_alive() {
            return promise::rejected(error);
        }
        if !command.is_async() {
            return promise::rejected(TransportError::validation(format!(
                "Command \"{command}\" doesn't expect a reply"
            )));
        }

        let future = match self.inner.promises.entry(command.id().to_string()) {
            Entry::Occupied(entry) => return entry.get().future(),
            Entry::Vacant(entry) => {
                let seq = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
                let token = self.inner.token.child_token();
                entry
                    .insert(CommandPromise::new(command.clone(), seq, token))
                    .future()
            }
        };

        let options = self.command_options(options);
        let transport = self.clone();
        tokio::spawn(async move {
            // 错误已经作为应答交给调用方
            let _ = transport.command_request(&command, &options, true).await;
        });
        future
    }

    /// 发送异步命令并将应答反序列化为具体类型
    pub async fn send_listen_as<T: DeserializeOwned>(
        &self,
        command: Command,
        options: Option<CommandOptions>,
    ) -> TransportResult<T> {
        let name = command.name().to_string();
        let value = self.send_listen(command, options).await?;
        serde_json::from_value(value).map_err(|e| {
            TransportError::invalid_data(format!("Invalid \"{name}\" command response: {e}"), None)
        })
    }

    async fn command_request(
        &self,
        command: &Command,
        options: &CommandOptions,
        is_need_reply: bool,
    ) -> TransportResult<()> {
        let is_tracked = command.is_async() && is_need_reply;
        if is_tracked {
            self.spawn_timeout(command, options.timeout(&self.inner.settings));
            self.notify(CommandLifecycle::new(CommandStatus::Started, command));
        }

        let log_type = if is_need_reply {
            LogType::RequestSended
        } else {
            LogType::RequestNoReply
        };
        self.log_command(command, log_type);

        let Err(error) = self
            .inner
            .channel
            .execute_request(self, command, options, is_need_reply)
            .await
        else {
            return Ok(());
        };

        if !is_tracked {
            warn!(command = %command, error = %error, "Unable to send command");
            return Err(error);
        }

        let mut command = command.clone();
        command.response(Err(error.clone()));
        self.log_command(&command, LogType::ResponseReceived);
        self.command_processed(&command, Err(error.clone()));
        Err(error)
    }

    fn spawn_timeout(&self, command: &Command, timeout: Duration) {
        // 记录已经结束时不需要定时器
        let Some((seq, token)) = self
            .inner
            .promises
            .get(command.id())
            .map(|item| (item.seq, item.token.clone()))
        else {
            return;
        };
        let transport = self.clone();
        let id = command.id().to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => transport.command_timeout(&id, seq),
            }
        });
    }

    fn command_timeout(&self, id: &str, seq: u64) {
        let Some((_, promise)) = self.inner.promises.remove_if(id, |_, item| item.seq == seq)
        else {
            return;
        };
        let mut command = promise.command.clone();
        let error = TransportError::Timeout {
            name: command.name().to_string(),
            id: command.id().to_string(),
        };
        command.response(Err(error.clone()));
        self.log_command(&command, LogType::ResponseTimeout);
        self.settle(promise, &command, Err(error));
    }

    /// 本端收到异步命令的应答，交给对应的待应答记录
    pub fn response_received(&self, command: &Command) {
        if !self.inner.promises.contains_key(command.id()) {
            warn!(
                command = %command,
                "Unable to find command promise: probably command was already completed"
            );
            return;
        }

        let result = match command.error() {
            Some(error) => {
                let mut error = error.clone();
                error.stack = None;
                Err(TransportError::from(error))
            }
            None => Ok(command.data().cloned().unwrap_or(Value::Null)),
        };
        self.log_command(command, LogType::ResponseReceived);
        self.command_processed(command, result);
    }

    fn command_processed(&self, command: &Command, result: TransportResult<Value>) {
        let Some((_, promise)) = self.inner.promises.remove(command.id()) else {
            return;
        };
        self.settle(promise, command, result);
    }

    fn settle(&self, promise: CommandPromise, command: &Command, result: TransportResult<Value>) {
        let notification = match &result {
            Ok(_) => CommandLifecycle::new(CommandStatus::Complete, command),
            Err(error) => CommandLifecycle::failed(command, error.to_extended()),
        };
        promise.resolve(result);
        self.notify(notification);
        self.notify(CommandLifecycle::new(CommandStatus::Finished, command));
    }

    // ---------------------------------------------------------------------
    // 接收端
    // ---------------------------------------------------------------------

    /// 为入站命令创建在途请求记录
    pub fn register_request(&self, command: &Command, options: &CommandOptions, is_need_reply: bool) {
        let request = CommandRequest::new(options, &self.inner.settings, is_need_reply);
        self.inner
            .requests
            .insert(command.id().to_string(), request);
    }

    /// 将入站命令推送给监听者；没有监听者时以 `NoListener` 结束命令
    pub async fn response_dispatch(&self, command: Command) {
        let listener = self
            .inner
            .listeners
            .get(command.name())
            .map(|item| item.value().clone());

        let command = match listener {
            Some(sender) => match sender.send(command) {
                Ok(()) => return,
                Err(mpsc::error::SendError(command)) => command,
            },
            None => command,
        };

        self.log_command(&command, LogType::RequestNoListener);
        let error = TransportError::NoListener {
            name: command.name().to_string(),
        };
        self.complete(command, Err(error)).await;
    }

    /// 结束入站命令
    ///
    /// 记录不存在（已结束）时为空操作；不需要应答时只记录日志；已过期时丢弃应答。
    pub async fn complete(&self, mut command: Command, result: TransportResult<Value>) {
        let Some((_, request)) = self.inner.requests.remove(command.id()) else {
            debug!(
                command = %command,
                "Unable to find command request: probably command was already completed"
            );
            return;
        };

        if !request.is_need_reply {
            self.log_command(&command, LogType::ResponseNoReply);
            if let Err(error) = &result {
                self.log_command(&command, LogType::ResponseNoReplyError);
                self.log_verbose(
                    Some(&error.to_extended().to_value()),
                    LogType::ResponseNoReplyError,
                );
            }
            return;
        }

        if request.is_expired() {
            self.log_command(&command, LogType::ResponseExpired);
            return;
        }
        if !command.is_async() {
            return;
        }

        command.response(result);
        self.command_response(&command, &request).await;
    }

    async fn command_response(&self, command: &Command, request: &CommandRequest) {
        self.log_command(command, LogType::ResponseSended);
        if let Err(error) = self
            .inner
            .channel
            .execute_response(self, command, request)
            .await
        {
            warn!(command = %command, error = %error, "Unable to send command response");
        }
    }

    /// 处理器暂时无法应答：退避后重新投递给同一监听者
    ///
    /// 次数或时间预算耗尽时以 `WaitExceeded` 结束命令。
    pub async fn wait(&self, command: Command) -> TransportResult<()> {
        self.ensure_alive()?;

        let delay = {
            let Some(mut request) = self.inner.requests.get_mut(command.id()) else {
                return Err(ExtendedError::from_message(format!(
                    "Unable to find request for \"{command}\" command"
                ))
                .into());
            };
            if request.is_wait_exceeded() {
                None
            } else {
                request.wait_count += 1;
                Some(request.wait_delay)
            }
        };

        let Some(delay) = delay else {
            self.log_command(&command, LogType::ResponseWaitExceeded);
            let error = TransportError::WaitExceeded {
                name: command.name().to_string(),
                id: command.id().to_string(),
            };
            self.complete(command, Err(error)).await;
            return Ok(());
        };

        self.log_command(&command, LogType::ResponseWait);
        let transport = self.clone();
        let token = self.inner.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay.as_duration()) => transport.wait_elapsed(command).await,
            }
        });
        Ok(())
    }

    async fn wait_elapsed(&self, command: Command) {
        let is_expired = match self.inner.requests.get(command.id()) {
            Some(request) => request.is_expired(),
            None => return,
        };
        if is_expired {
            self.inner.requests.remove(command.id());
            self.log_command(&command, LogType::RequestExpired);
            return;
        }
        self.log_command(&command, LogType::RequestReceived);
        self.response_dispatch(command).await;
    }

    /// 监听某个命令名，每个名称只能监听一次
    pub fn listen(&self, name: impl Into<String>) -> TransportResult<BoxStream<'static, Command>> {
        self.ensure_alive()?;
        self.ensure_receiving()?;

        let name = name.into();
        let receiver = match self.inner.listeners.entry(name.clone()) {
            Entry::Occupied(_) => return Err(TransportError::AlreadyListening { name }),
            Entry::Vacant(entry) => {
                let (sender, receiver) = mpsc::unbounded_channel();
                entry.insert(sender);
                receiver
            }
        };
        debug!(command = %name, "Start listening \"{name}\" command");
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    /// 取消监听，此后同名命令可以再次监听
    pub fn unlisten(&self, name: &str) -> bool {
        let removed = self.inner.listeners.remove(name).is_some();
        if removed {
            debug!(command = %name, "Stop listening \"{name}\" command");
        }
        removed
    }

    // ---------------------------------------------------------------------
    // 事件
    // ---------------------------------------------------------------------

    /// 发布事件；尚无订阅者的事件不会被缓存
    pub async fn dispatch(&self, mut event: Event) -> TransportResult<()> {
        self.ensure_alive()?;
        self.ensure_receiving()?;

        event.ensure_trace();
        self.log_event(&event, LogType::EventSended);
        if let Err(error) = self.inner.channel.execute_event(self, &event).await {
            warn!(event = %event, error = %error, "Unable to send event");
            return Err(error);
        }
        Ok(())
    }

    /// 订阅某个事件名，分发器在首次订阅时创建
    pub fn get_dispatcher(&self, name: &str) -> TransportResult<BoxStream<'static, Event>> {
        self.ensure_alive()?;
        self.ensure_receiving()?;

        let receiver = self
            .inner
            .dispatchers
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(DISPATCHER_CAPACITY).0)
            .subscribe();

        let name = name.to_string();
        let stream = BroadcastStream::new(receiver).filter_map(move |item| {
            ready(match item {
                Ok(event) => Some(event),
                Err(error) => {
                    warn!(event = %name, error = %error, "Event dispatcher lagged");
                    None
                }
            })
        });
        Ok(stream.boxed())
    }

    /// 本端收到事件，推送给对应的分发器
    pub fn event_received(&self, event: &Event) {
        let sender = self
            .inner
            .dispatchers
            .get(event.name())
            .map(|item| item.value().clone());

        match sender {
            Some(sender) if sender.receiver_count() > 0 => {
                self.log_event(event, LogType::EventReceived);
                let _ = sender.send(event.clone());
            }
            _ => self.log_event(event, LogType::EventReceivedNoListener),
        }
    }

    // ---------------------------------------------------------------------
    // 生命周期
    // ---------------------------------------------------------------------

    /// 异步命令的生命周期通知流，传输销毁后结束
    pub fn lifecycle(&self) -> BoxStream<'static, CommandLifecycle> {
        let receiver = self.inner.lifecycle.subscribe();
        BroadcastStream::new(receiver)
            .filter_map(|item| ready(item.ok()))
            .take_until(self.inner.token.clone().cancelled_owned())
            .boxed()
    }

    fn notify(&self, item: CommandLifecycle) {
        // 无订阅者时发送失败，忽略
        let _ = self.inner.lifecycle.send(item);
    }

    /// 销毁传输：清空全部簿记并停止所有定时任务
    ///
    /// 仍在等待的调用方 future 不会被结束。
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.token.cancel();
        self.inner.requests.clear();
        self.inner.listeners.clear();
        self.inner.dispatchers.clear();
        self.inner.promises.clear();
        self.inner
            .command_filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner
            .event_filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!(channel = %self.channel_name(), "Transport destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // 只读视图
    // ---------------------------------------------------------------------

    pub fn pending_requests(&self) -> Vec<String> {
        self.inner.requests.iter().map(|e| e.key().clone()).collect()
    }

    pub fn pending_promises(&self) -> Vec<String> {
        self.inner.promises.iter().map(|e| e.key().clone()).collect()
    }

    pub fn listener_names(&self) -> Vec<String> {
        self.inner.listeners.iter().map(|e| e.key().clone()).collect()
    }

    pub fn request(&self, id: &str) -> Option<CommandRequest> {
        self.inner.requests.get(id).map(|e| e.value().clone())
    }

    // ---------------------------------------------------------------------
    // 日志
    // ---------------------------------------------------------------------

    pub fn add_command_log_filter<F>(&self, filter: F)
    where
        F: Fn(&Command, LogType) -> bool + Send + Sync + 'static,
    {
        self.inner
            .command_filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(filter));
    }

    pub fn add_event_log_filter<F>(&self, filter: F)
    where
        F: Fn(&Event, LogType) -> bool + Send + Sync + 'static,
    {
        self.inner
            .event_filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(filter));
    }

    /// 输出一条命令状态迁移日志（需通过全部过滤器）
    pub fn log_command(&self, command: &Command, log_type: LogType) {
        let accepted = self
            .inner
            .command_filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .all(|filter| filter(command, log_type));
        if !accepted {
            return;
        }

        debug!(
            command = %command.name(),
            id = %command.id(),
            log_type = %log_type,
            "{}",
            log::command_to_string(command, log_type)
        );

        match log_type {
            LogType::RequestSended | LogType::RequestReceived | LogType::RequestNoReply => {
                self.log_verbose(Some(command.request()), log_type);
            }
            LogType::ResponseSended | LogType::ResponseReceived | LogType::ResponseNoReply => {
                if !command.is_async() {
                    return;
                }
                match command.error() {
                    Some(error) => self.log_verbose(Some(&error.to_value()), log_type),
                    None => self.log_verbose(command.data(), log_type),
                }
            }
            _ => {}
        }
    }

    /// 输出一条事件日志（需通过全部过滤器）
    pub fn log_event(&self, event: &Event, log_type: LogType) {
        let accepted = self
            .inner
            .event_filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .all(|filter| filter(event, log_type));
        if !accepted {
            return;
        }

        debug!(
            event = %event.name(),
            uid = %event.uid(),
            log_type = %log_type,
            "{}",
            log::event_to_string(event, log_type)
        );
        self.log_verbose(event.data(), log_type);
    }

    fn log_verbose(&self, data: Option<&Value>, log_type: LogType) {
        if !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }
        if let Some(text) = log::verbose(data, log_type) {
            trace!("{text}");
        }
    }

    // ---------------------------------------------------------------------
    // 内部
    // ---------------------------------------------------------------------

    fn command_options(&self, options: Option<CommandOptions>) -> CommandOptions {
        options.unwrap_or_default().with_defaults(&self.inner.settings)
    }

    fn ensure_alive(&self) -> TransportResult<()> {
        if self.is_destroyed() {
            return Err(TransportError::Destroyed);
        }
        Ok(())
    }

    fn ensure_receiving(&self) -> TransportResult<()> {
        if !self.inner.channel.supports_receiving() {
            return Err(TransportError::NotImplemented(format!(
                "\"{}\" channel doesn't receive commands or events",
                self.channel_name()
            )));
        }
        Ok(())
    }
}
