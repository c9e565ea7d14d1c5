use anyhow::Result as AnyResult;
use async_trait::async_trait;
use courier_core::log::LogType;
use courier_core::{Command, CommandOptions, ErrorCode, Event, TransportError};
use courier_http::{
    HttpClient, HttpClientError, HttpMethod, HttpRequest, HttpSettings, HttpTransport,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Reply = Box<dyn Fn(&HttpRequest) -> Result<Value, HttpClientError> + Send + Sync>;

struct StubClient {
    reply: Reply,
    delay: Duration,
    seen: Mutex<Vec<(Option<String>, HttpRequest)>>,
}

impl StubClient {
    fn new<F>(reply: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<Value, HttpClientError> + Send + Sync + 'static,
    {
        Self::delayed(Duration::ZERO, reply)
    }

    fn delayed<F>(delay: Duration, reply: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<Value, HttpClientError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            reply: Box::new(reply),
            delay,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<(Option<String>, HttpRequest)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for StubClient {
    async fn request(
        &self,
        settings: &HttpSettings,
        request: &HttpRequest,
    ) -> Result<Value, HttpClientError> {
        self.seen
            .lock()
            .unwrap()
            .push((settings.base_url.clone(), request.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.reply)(request)
    }
}

fn settings(method: HttpMethod) -> HttpSettings {
    HttpSettings::builder()
        .base_url("https://api.local")
        .method(method)
        .build()
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    name: String,
}

#[tokio::test(flavor = "multi_thread")]
async fn call_returns_response_body() -> AnyResult<()> {
    let client = StubClient::new(|_| Ok(json!({"id": 7, "name": "Alice"})));
    let http = HttpTransport::with_client(client.clone(), settings(HttpMethod::Post));

    let user: User = http
        .call("user/get", HttpRequest::with_data(&json!({"id": 7}))?, None)
        .await?;
    assert_eq!(
        user,
        User {
            id: 7,
            name: "Alice".into()
        }
    );

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let (base_url, request) = &requests[0];
    assert_eq!(base_url.as_deref(), Some("https://api.local"));
    assert_eq!(request.url.as_deref(), Some("user/get"));
    assert_eq!(request.method, Some(HttpMethod::Post));
    assert_eq!(request.data, Some(json!({"id": 7})));
    assert!(http.transport().pending_requests().is_empty());
    assert!(http.transport().pending_promises().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn get_sends_payload_as_query() -> AnyResult<()> {
    let client = StubClient::new(|_| Ok(json!([])));
    let http = HttpTransport::with_client(client.clone(), settings(HttpMethod::Get));

    let _: Value = http
        .call("user/list", HttpRequest::with_data(&json!({"page": 1}))?, None)
        .await?;

    let (_, request) = &client.requests()[0];
    assert_eq!(request.data, None);
    assert_eq!(request.params, Some(json!({"page": 1})));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn client_failure_is_normalized() -> AnyResult<()> {
    let client = StubClient::new(|_| {
        Err(HttpClientError::status(
            503,
            "Service Unavailable",
            json!({"retry": true}),
        ))
    });
    let http = HttpTransport::with_client(client, settings(HttpMethod::Post));

    let error = http
        .call::<Value>("user/get", HttpRequest::default(), None)
        .await
        .unwrap_err();
    let error = error.to_extended();
    assert_eq!(error.message, "Service Unavailable");
    assert_eq!(error.code, ErrorCode::Number(503));
    assert_eq!(error.details, Some(json!({"retry": true})));
    assert!(http.transport().pending_requests().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn network_failure_is_bad_request() -> AnyResult<()> {
    let client = StubClient::new(|_| Err(HttpClientError::network("connection refused")));
    let http = HttpTransport::with_client(client, settings(HttpMethod::Post));

    let error = http
        .call::<Value>("user/get", HttpRequest::default(), None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::Number(400));
    assert_eq!(error.to_string(), "connection refused");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connection_is_no_connection() -> AnyResult<()> {
    let client = StubClient::new(|_| Err(HttpClientError::connect("connection refused")));
    let http = HttpTransport::with_client(client, settings(HttpMethod::Post));

    let command = Command::new_async("user/get", &HttpRequest::default())?.with_id("c-1");
    let error = http
        .transport()
        .send_listen(command, None)
        .await
        .unwrap_err();
    assert!(error.is_no_connection());
    assert_eq!(error.to_string(), "user/get (c-1) no connection");
    assert!(http.transport().pending_requests().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn error_shaped_body_rejects() -> AnyResult<()> {
    let client = StubClient::new(|_| {
        Ok(json!({"message": "User not found", "code": "USER_NOT_FOUND", "details": null}))
    });
    let http = HttpTransport::with_client(client, settings(HttpMethod::Post));

    let error = http
        .call::<Value>("user/get", HttpRequest::default(), None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::Text("USER_NOT_FOUND".into()));
    assert_eq!(error.to_string(), "User not found");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_response_times_out() -> AnyResult<()> {
    let client = StubClient::delayed(Duration::from_secs(5), |_| Ok(json!("late")));
    let http = HttpTransport::with_client(client, settings(HttpMethod::Post));
    let responses = Arc::new(Mutex::new(Vec::new()));
    let sink = responses.clone();
    http.transport().add_command_log_filter(move |_, log_type| {
        sink.lock().unwrap().push(log_type);
        true
    });

    let options = CommandOptions::builder().timeout(1000).build();
    let error = http
        .call::<Value>("user/get", HttpRequest::default(), Some(options))
        .await
        .unwrap_err();
    assert!(error.is_timeout());

    tokio::time::sleep(Duration::from_secs(10)).await;
    let log = responses.lock().unwrap().clone();
    assert!(log.contains(&LogType::ResponseTimeout));
    assert!(log.contains(&LogType::ResponseExpired));
    assert!(!log.contains(&LogType::ResponseReceived));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_request_is_rejected_before_sending() -> AnyResult<()> {
    let client = StubClient::new(|_| Ok(Value::Null));
    let http = HttpTransport::with_client(client.clone(), settings(HttpMethod::Post));

    let command = Command::new_async("user/get", &json!("not a request"))?;
    let error = http
        .transport()
        .send_listen(command, None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::from(TransportError::INVALID_DATA_CODE));
    assert!(client.requests().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn events_and_listening_are_not_supported() -> AnyResult<()> {
    let http = HttpTransport::with_client(
        StubClient::new(|_| Ok(Value::Null)),
        settings(HttpMethod::Post),
    );

    assert!(matches!(
        http.transport().dispatch(Event::empty("user.created")).await,
        Err(TransportError::NotImplemented(_))
    ));
    assert!(matches!(
        http.transport().listen("user/get"),
        Err(TransportError::NotImplemented(_))
    ));
    assert!(matches!(
        http.transport().get_dispatcher("user.created"),
        Err(TransportError::NotImplemented(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn url_and_headers_are_mutable() -> AnyResult<()> {
    let client = StubClient::new(|_| Ok(Value::Null));
    let http = HttpTransport::with_client(client.clone(), settings(HttpMethod::Post));

    assert_eq!(http.url().as_deref(), Some("https://api.local"));
    http.set_url("https://staging.local");
    http.set_header("authorization", "Bearer token");
    assert_eq!(http.headers()["authorization"], "Bearer token");

    let _: Value = http.call("ping", HttpRequest::default(), None).await?;
    let (base_url, _) = &client.requests()[0];
    assert_eq!(base_url.as_deref(), Some("https://staging.local"));
    Ok(())
}
