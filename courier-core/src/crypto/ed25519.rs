use super::{CryptoManager, KeyPair, Signature};
use crate::command::Command;
use crate::error::{CryptoError, CryptoResult};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;

/// Ed25519 原语，密钥、签名与 nonce 均为十六进制字符串
///
/// 私钥为 64 字节（种子 + 公钥）编码，同时接受 32 字节种子。
pub struct Ed25519;

impl Ed25519 {
    pub const ALGORITHM: &'static str = "Ed25519";
    pub const NONCE_LENGTH: usize = 24;

    pub fn keys() -> KeyPair {
        Self::to_key_pair(&SigningKey::generate(&mut OsRng))
    }

    /// 由私钥推导完整密钥对
    pub fn from(private_key: &str) -> CryptoResult<KeyPair> {
        Ok(Self::to_key_pair(&Self::signing_key(private_key)?))
    }

    pub fn nonce() -> String {
        let mut bytes = [0u8; Self::NONCE_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub fn sign(message: &str, private_key: &str) -> CryptoResult<String> {
        let key = Self::signing_key(private_key)?;
        Ok(hex::encode(key.sign(message.as_bytes()).to_bytes()))
    }

    /// 签名不匹配返回 `Ok(false)`
    pub fn verify(message: &str, signature: &str, public_key: &str) -> CryptoResult<bool> {
        let signature = hex::decode(signature)?;
        let signature: [u8; 64] = signature
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::SignatureLength(signature.len()))?;
        let signature = ed25519_dalek::Signature::from_bytes(&signature);
        let key = Self::verifying_key(public_key)?;
        Ok(key.verify(message.as_bytes(), &signature).is_ok())
    }

    fn to_key_pair(key: &SigningKey) -> KeyPair {
        KeyPair {
            public_key: hex::encode(key.verifying_key().to_bytes()),
            private_key: hex::encode(key.to_keypair_bytes()),
        }
    }

    fn signing_key(private_key: &str) -> CryptoResult<SigningKey> {
        let bytes = hex::decode(private_key)?;
        match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                Ok(SigningKey::from_bytes(&seed))
            }
            64 => {
                let mut pair = [0u8; 64];
                pair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&pair).map_err(|e| CryptoError::Key(e.to_string()))
            }
            found => Err(CryptoError::KeyLength {
                expected: "32 or 64",
                found,
            }),
        }
    }

    fn verifying_key(public_key: &str) -> CryptoResult<VerifyingKey> {
        let bytes = hex::decode(public_key)?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::KeyLength {
                expected: "32",
                found: bytes.len(),
            })?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::Key(e.to_string()))
    }
}

/// 基于 Ed25519 的命令签名器
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519CryptoManager;

impl CryptoManager for Ed25519CryptoManager {
    fn algorithm(&self) -> &str {
        Ed25519::ALGORITHM
    }

    fn sign(&self, command: &Command, nonce: &str, private_key: &str) -> CryptoResult<String> {
        Ed25519::sign(&self.canonical_string(command, nonce), private_key)
    }

    fn verify(&self, command: &Command, signature: &Signature) -> CryptoResult<bool> {
        Ed25519::verify(
            &self.canonical_string(command, &signature.nonce),
            &signature.value,
            &signature.public_key,
        )
    }
}
