//! Config schema: transport, responders, crypto, relay timing, dashboard,
//! and storage sections.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, SecretString},
    serde::Deserialize,
};

/// Root configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UstozConfig {
    pub telegram: TelegramConfig,
    pub responders: RespondersConfig,
    pub crypto: CryptoConfig,
    pub relay: RelayConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token.
    pub token: Option<SecretString>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RespondersConfig {
    /// Chat ids of the responders (teachers). Every new question goes to all.
    pub ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// 32-byte key as 64 hex characters.
    pub key: Option<SecretString>,
}

/// Timing and capacity of the relay state machine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub cooldown_secs: u64,
    pub session_ttl_secs: u64,
    pub claim_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub question_ttl_secs: u64,
    pub max_questions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            session_ttl_secs: 600,
            claim_ttl_secs: 600,
            sweep_interval_secs: 600,
            question_ttl_secs: 86_400,
            max_questions: 1_000,
        }
    }
}

/// Dashboard HTTP/WebSocket surface.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
    /// Bearer token required by the dashboard API. Unset means open.
    pub token: Option<SecretString>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file for the sqlite backend. Defaults to `<data dir>/ustoz.db`.
    pub path: Option<PathBuf>,
}

impl UstozConfig {
    /// Everything that would stop the relay from starting, in one list.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        match &self.telegram.token {
            Some(token) if !token.expose_secret().trim().is_empty() => {},
            _ => problems.push("telegram.token is not set (BOT_TOKEN)".to_string()),
        }

        if self.responders.ids.is_empty() {
            problems.push("responders.ids is empty (ADMIN_CHAT_IDS)".to_string());
        }

        match &self.crypto.key {
            None => problems.push("crypto.key is not set (ENCRYPTION_KEY)".to_string()),
            Some(key) if !is_hex_key(key.expose_secret()) => problems
                .push("crypto.key must be 64 hex characters (32 bytes)".to_string()),
            Some(_) => {},
        }

        if self.relay.max_questions == 0 {
            problems.push("relay.max_questions must be at least 1".to_string());
        }
        if self.relay.sweep_interval_secs == 0 {
            problems.push("relay.sweep_interval_secs must be at least 1".to_string());
        }

        problems
    }

    /// Fail with every problem listed when the config is unusable.
    pub fn validate(&self) -> anyhow::Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            return Ok(());
        }
        anyhow::bail!("invalid configuration:\n  - {}", problems.join("\n  - "))
    }
}

fn is_hex_key(key: &str) -> bool {
    let key = key.trim();
    key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit())
}
