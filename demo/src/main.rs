use async_trait::async_trait;
use courier_core::crypto::{self, Ed25519, Ed25519CryptoManager};
use courier_core::{Command, CommandOptions, Event, TransportError, WaitDelay};
use courier_http::{HttpMethod, HttpRequest, HttpSettings, HttpTransport};
use courier_transport::{
    CommandHandler, EventHandler, Transport, TransportSettings, spawn_command_handler,
    spawn_event_handler,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Deposit {
    account: String,
    amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Balance {
    account: String,
    balance: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Deposited {
    account: String,
    amount: i64,
}

struct DepositHandler {
    transport: Transport,
    balances: Mutex<HashMap<String, i64>>,
    // 前两次调用模拟账户被锁定
    locked: AtomicUsize,
}

#[async_trait]
impl CommandHandler for DepositHandler {
    type Request = Deposit;
    type Response = Balance;

    fn name(&self) -> &str {
        "account.deposit"
    }

    fn check_request(&self, request: Deposit) -> anyhow::Result<Deposit> {
        anyhow::ensure!(request.amount > 0, "amount must be positive");
        Ok(request)
    }

    async fn execute(&self, request: Deposit, _command: &Command) -> anyhow::Result<Balance> {
        let is_locked = self
            .locked
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if is_locked {
            return Err(TransportError::wait("account is locked").into());
        }

        let balance = {
            let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
            let balance = balances.entry(request.account.clone()).or_default();
            *balance += request.amount;
            *balance
        };

        self.transport
            .dispatch(Event::new(
                "account.deposited",
                &Deposited {
                    account: request.account.clone(),
                    amount: request.amount,
                },
            )?)
            .await?;

        Ok(Balance {
            account: request.account,
            balance,
        })
    }
}

struct DepositLog;

#[async_trait]
impl EventHandler for DepositLog {
    type Data = Deposited;

    fn name(&self) -> &str {
        "account.deposited"
    }

    async fn execute(&self, data: Option<Deposited>, event: &Event) -> anyhow::Result<()> {
        if let Some(data) = data {
            println!("event {event}: +{} to {}", data.amount, data.account);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let settings = TransportSettings::builder()
        .timeout(10_000)
        .default_wait_delay(WaitDelay::ExtraFast)
        .build();
    let transport = Transport::local(settings);

    let deposits = spawn_command_handler(
        &transport,
        Arc::new(DepositHandler {
            transport: transport.clone(),
            balances: Mutex::new(HashMap::new()),
            locked: AtomicUsize::new(2),
        }),
    )?;
    let log = spawn_event_handler(&transport, Arc::new(DepositLog))?;

    // 处理器两次发出等待信号，第三次投递时完成
    let command = Command::new_async(
        "account.deposit",
        &serde_json::json!({"account": "alice", "amount": 100}),
    )?;
    let balance: Balance = transport.send_listen_as(command, None).await?;
    println!("deposited: {balance:?}");

    let command = Command::new_async(
        "account.deposit",
        &serde_json::json!({"account": "alice", "amount": -5}),
    )?;
    match transport.send_listen(command, None).await {
        Ok(value) => println!("unexpected: {value}"),
        Err(error) => println!("rejected: {} ({})", error, error.code()),
    }

    let command = Command::new_async("account.close", &serde_json::json!({"account": "alice"}))?;
    if let Err(error) = transport.send_listen(command, None).await {
        println!("rejected: {error}");
    }

    // 命令签名
    let key = Ed25519::keys();
    let command = Command::new_async(
        "account.deposit",
        &serde_json::json!({"account": "bob", "amount": 7}),
    )?;
    let signature = crypto::sign(&command, &Ed25519CryptoManager, &key, None)?;
    let is_valid = crypto::verify(&command, &Ed25519CryptoManager, &signature)?;
    println!("signature {}: valid = {is_valid}", signature.value);

    // HTTP 通道：没有服务时得到归一化后的错误
    let http = HttpTransport::new(
        HttpSettings::builder()
            .base_url("http://127.0.0.1:9")
            .method(HttpMethod::Get)
            .build(),
    );
    let options = CommandOptions::builder().timeout(1_000).build();
    match http
        .call::<Value>("status", HttpRequest::default(), Some(options))
        .await
    {
        Ok(value) => println!("http: {value}"),
        Err(error) => println!("http rejected: {} ({})", error, error.code()),
    }

    deposits.shutdown();
    log.shutdown();
    deposits.join().await;
    log.join().await;
    transport.destroy();
    Ok(())
}
