//! HTTP 通道（HttpChannel）
//!
//! 命令由 HTTP 客户端发送，响应体即为应答；无法连接时以 `NoConnection` 结束，
//! 其余客户端失败与结构化错误响应体在通道边界归一化，
//! 调用方只会看到 `ExtendedError`。该通道只支持请求/应答，不支持监听命令与事件。
//!
use crate::client::{HttpClient, ReqwestHttpClient};
use crate::error::parse_http_error;
use crate::request::{HttpRequest, prepare_request};
use crate::settings::HttpSettings;
use async_trait::async_trait;
use courier_core::log::LogType;
use courier_core::{
    Command, CommandOptions, Event, ExtendedError, TransportError, TransportResult,
};
use courier_transport::{Channel, Transport};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

pub struct HttpChannel {
    client: Arc<dyn HttpClient>,
    settings: RwLock<HttpSettings>,
}

impl HttpChannel {
    pub const NAME: &'static str = "http";

    pub fn new(client: Arc<dyn HttpClient>, settings: HttpSettings) -> Self {
        Self {
            client,
            settings: RwLock::new(settings),
        }
    }

    pub fn settings(&self) -> HttpSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<F: FnOnce(&mut HttpSettings)>(&self, f: F) {
        f(&mut self.settings.write().unwrap_or_else(PoisonError::into_inner));
    }
}

#[async_trait]
impl Channel for HttpChannel {
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
        let settings = self.settings();
        let request = prepare_request(command, options, &settings)?;
        transport.register_request(command, options, is_need_reply);

        let result = match self.client.request(&settings, &request).await {
            Ok(data) if ExtendedError::is_shape(&data) => {
                Err(TransportError::from(ExtendedError::from_value(&data)))
            }
            Ok(data) => {
                transport.log_command(command, LogType::RequestReceived);
                Ok(data)
            }
            Err(error) if error.is_connect => Err(TransportError::NoConnection {
                name: command.name().to_string(),
                id: command.id().to_string(),
            }),
            Err(error) => Err(TransportError::from(parse_http_error(&error))),
        };
        transport.complete(command.clone(), result).await;
        Ok(())
    }

    async fn execute_event(&self, _transport: &Transport, event: &Event) -> TransportResult<()> {
        Err(TransportError::NotImplemented(format!(
            "\"{}\" channel doesn't dispatch \"{}\" event",
            Self::NAME,
            event.name()
        )))
    }

    fn supports_receiving(&self) -> bool {
        false
    }
}

/// HTTP 传输：引擎 + HTTP 通道
#[derive(Clone)]
pub struct HttpTransport {
    transport: Transport,
    channel: Arc<HttpChannel>,
}

impl HttpTransport {
    /// 使用 `reqwest` 客户端
    pub fn new(settings: HttpSettings) -> Self {
        Self::with_client(Arc::new(ReqwestHttpClient::new()), settings)
    }

    pub fn with_client(client: Arc<dyn HttpClient>, settings: HttpSettings) -> Self {
        let transport_settings = settings.transport.clone();
        let channel = Arc::new(HttpChannel::new(client, settings));
        let transport = Transport::new(channel.clone(), transport_settings);
        Self { transport, channel }
    }

    /// 发送 HTTP 命令并等待应答
    pub async fn call<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        request: HttpRequest,
        options: Option<CommandOptions>,
    ) -> TransportResult<T> {
        let command = Command::new_async(path, &request)?;
        self.transport.send_listen_as(command, options).await
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn settings(&self) -> HttpSettings {
        self.channel.settings()
    }

    pub fn url(&self) -> Option<String> {
        self.channel.settings().base_url
    }

    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.channel.update(|settings| settings.base_url = Some(url));
    }

    pub fn headers(&self) -> BTreeMap<String, String> {
        self.channel.settings().headers
    }

    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        self.channel.update(|settings| {
            settings.headers.insert(name, value);
        });
    }
}
