//! 命令签名
//!
//! 签名覆盖命令名、请求载荷（按键排序后的 JSON）与 nonce：
//! `canonical = name + sorted_json(request) + nonce`。
//! 具体算法由 `CryptoManager` 实现决定，当前提供 Ed25519。
//!
mod ed25519;

pub use ed25519::{Ed25519, Ed25519CryptoManager};

use crate::command::Command;
use crate::error::CryptoResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 分离式签名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub value: String,
    pub public_key: String,
    pub algorithm: String,
    pub nonce: String,
}

/// 非对称密钥对（十六进制编码）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

pub trait CryptoManager: Send + Sync {
    fn algorithm(&self) -> &str;

    /// 对命令签名，返回签名值
    fn sign(&self, command: &Command, nonce: &str, private_key: &str) -> CryptoResult<String>;

    /// 校验签名；签名与内容不匹配时返回 `Ok(false)`，编码错误时返回 `Err`
    fn verify(&self, command: &Command, signature: &Signature) -> CryptoResult<bool>;

    fn canonical_string(&self, command: &Command, nonce: &str) -> String {
        canonical_string(command, nonce)
    }
}

/// 签名原文
pub fn canonical_string(command: &Command, nonce: &str) -> String {
    let request = match command.request() {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => sort_keys(other).to_string(),
    };
    format!("{}{request}{nonce}", command.name())
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// 使用给定的签名器对命令签名，未提供 nonce 时取当前毫秒时间戳
pub fn sign(
    command: &Command,
    manager: &dyn CryptoManager,
    key: &KeyPair,
    nonce: Option<String>,
) -> CryptoResult<Signature> {
    let nonce = nonce.unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
    Ok(Signature {
        value: manager.sign(command, &nonce, &key.private_key)?,
        public_key: key.public_key.clone(),
        algorithm: manager.algorithm().to_string(),
        nonce,
    })
}

pub fn verify(
    command: &Command,
    manager: &dyn CryptoManager,
    signature: &Signature,
) -> CryptoResult<bool> {
    manager.verify(command, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_string_sorts_nested_keys() {
        let command = Command::new_async(
            "bank.transfer",
            &json!({"to": "bob", "amount": 10, "meta": {"z": 1, "a": [{"y": 2, "b": 3}]}}),
        )
        .unwrap();
        assert_eq!(
            canonical_string(&command, "n1"),
            r#"bank.transfer{"amount":10,"meta":{"a":[{"b":3,"y":2}],"z":1},"to":"bob"}n1"#
        );
    }

    #[test]
    fn canonical_string_ignores_command_id() {
        let a = Command::new("ping", &json!({"x": 1})).unwrap();
        let b = a.clone().with_id("other");
        assert_eq!(canonical_string(&a, "n"), canonical_string(&b, "n"));
    }
}
