//! Pending PKCE authorization flows.
//!
//! Each flow is keyed by its random `state` value and holds the code verifier
//! until the OAuth callback consumes it. Entries are removed after a fixed
//! timeout whether or not the callback ever arrives.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How long a started authorization flow stays usable
pub const PKCE_STATE_TTL: Duration = Duration::from_secs(10 * 60);

const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
const VERIFIER_LEN: usize = 64;

/// Values needed to send the user to the authorize endpoint
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh state, verifier and S256 challenge
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code_verifier: String = (0..VERIFIER_LEN)
            .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
            .collect();
        let state = Alphanumeric.sample_string(&mut rng, 32);
        let code_challenge = s256_challenge(&code_verifier);

        Self {
            state,
            code_verifier,
            code_challenge,
        }
    }
}

/// `BASE64URL(SHA256(verifier))` without padding
pub fn s256_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

struct PendingAuth {
    code_verifier: String,
    started: Instant,
}

/// Shared map of in-flight authorization flows
#[derive(Clone)]
pub struct PkceStateStore {
    entries: Arc<DashMap<String, PendingAuth>>,
    ttl: Duration,
}

impl Default for PkceStateStore {
    fn default() -> Self {
        Self::new(PKCE_STATE_TTL)
    }
}

impl PkceStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Start a flow: remember the verifier and schedule its expiry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin(&self) -> PkceChallenge {
        let challenge = PkceChallenge::generate();
        self.entries.insert(
            challenge.state.clone(),
            PendingAuth {
                code_verifier: challenge.code_verifier.clone(),
                started: Instant::now(),
            },
        );

        let entries = Arc::clone(&self.entries);
        let state = challenge.state.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if entries.remove(&state).is_some() {
                debug!("Expired unused PKCE state");
            }
        });

        challenge
    }

    /// Take the verifier for a state. Succeeds at most once per state and
    /// never after the timeout.
    pub fn consume(&self, state: &str) -> Option<String> {
        let (_, pending) = self.entries.remove(state)?;
        if pending.started.elapsed() >= self.ttl {
            return None;
        }
        Some(pending.code_verifier)
    }

    /// Number of flows still pending
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
