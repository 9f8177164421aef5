//! Webhook signature verification.
//!
//! Twitch signs `message_id || timestamp || body` with HMAC-SHA256 using the
//! secret supplied when the subscription was created. Kick signs
//! `message_id.timestamp.body` with its RSA key (PKCS#1 v1.5, SHA-256) and
//! publishes the public half.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use tracing::debug;

use crate::error::{NotifierError, Result};

type HmacSha256 = Hmac<Sha256>;

const TWITCH_SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC verifier for Twitch EventSub deliveries
#[derive(Clone)]
pub struct TwitchVerifier {
    secret: String,
}

impl TwitchVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// The shared secret, as handed to Twitch when subscribing
    pub fn secret(&self) -> &str {
        &self.secret
    }

    fn mac(&self, message_id: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(message_id.as_bytes());
        mac.update(timestamp.as_bytes());
        mac.update(body);
        mac
    }

    /// Compute the `sha256=<hex>` header value for a message
    pub fn sign(&self, message_id: &str, timestamp: &str, body: &[u8]) -> String {
        let digest = self.mac(message_id, timestamp, body).finalize().into_bytes();
        format!("{}{}", TWITCH_SIGNATURE_PREFIX, hex::encode(digest))
    }

    /// Check a `sha256=<hex>` signature header in constant time
    pub fn verify(&self, message_id: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
        let Some(hex_digest) = signature.strip_prefix(TWITCH_SIGNATURE_PREFIX) else {
            debug!(platform = "twitch", "Signature header has no sha256= prefix");
            return false;
        };
        let Ok(expected) = hex::decode(hex_digest) else {
            debug!(platform = "twitch", "Signature header is not hex");
            return false;
        };
        self.mac(message_id, timestamp, body)
            .verify_slice(&expected)
            .is_ok()
    }
}

/// RSA verifier for Kick webhook deliveries
#[derive(Debug, Clone)]
pub struct KickVerifier {
    key: VerifyingKey<Sha256>,
}

impl KickVerifier {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self {
            key: VerifyingKey::<Sha256>::new(public_key),
        }
    }

    /// Parse Kick's published key. Accepts SPKI (`BEGIN PUBLIC KEY`) and
    /// PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| NotifierError::verification(format!("Invalid Kick public key: {}", e)))?;
        Ok(Self::new(key))
    }

    /// Check a base64 signature over `message_id.timestamp.body`
    pub fn verify(&self, message_id: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
        let Ok(raw) = STANDARD.decode(signature.trim()) else {
            debug!(platform = "kick", "Signature header is not base64");
            return false;
        };
        let Ok(signature) = Signature::try_from(raw.as_slice()) else {
            return false;
        };
        let message = signed_payload(message_id, timestamp, body);
        self.key.verify(&message, &signature).is_ok()
    }
}

/// Bytes Kick signs for a delivery
pub fn signed_payload(message_id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(message_id.len() + timestamp.len() + body.len() + 2);
    message.extend_from_slice(message_id.as_bytes());
    message.push(b'.');
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    message
}

#[cfg(test)]
pub(crate) mod test_keys {
    use super::*;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;
    use std::sync::OnceLock;

    /// One key pair shared by all tests; generation is slow
    pub fn private_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
    }

    pub fn public_key_pem() -> String {
        private_key()
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap()
    }

    /// Sign like Kick does and return the base64 header value
    pub fn kick_sign(message_id: &str, timestamp: &str, body: &[u8]) -> String {
        let signing_key = SigningKey::<Sha256>::new(private_key().clone());
        let signature = signing_key.sign(&signed_payload(message_id, timestamp, body));
        STANDARD.encode(signature.to_vec())
    }
}
