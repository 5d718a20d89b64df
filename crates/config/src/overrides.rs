//! Environment variables that take precedence over the config file.

use {anyhow::Context, secrecy::SecretString};

use crate::schema::UstozConfig;

pub const BOT_TOKEN: &str = "BOT_TOKEN";
pub const ADMIN_CHAT_IDS: &str = "ADMIN_CHAT_IDS";
pub const ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";
pub const PORT: &str = "PORT";
pub const DASHBOARD_TOKEN: &str = "USTOZ_DASHBOARD_TOKEN";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut UstozConfig) -> anyhow::Result<()> {
    apply_overrides_with(config, |name| std::env::var(name).ok())
}

/// Apply overrides using `lookup`. Empty values are ignored.
pub fn apply_overrides_with(
    config: &mut UstozConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get(BOT_TOKEN) {
        config.telegram.token = Some(SecretString::new(token));
    }
    if let Some(ids) = get(ADMIN_CHAT_IDS) {
        config.responders.ids = parse_ids(&ids).with_context(|| format!("invalid {ADMIN_CHAT_IDS}"))?;
    }
    if let Some(key) = get(ENCRYPTION_KEY) {
        config.crypto.key = Some(SecretString::new(key.trim().to_string()));
    }
    if let Some(port) = get(PORT) {
        config.gateway.port = port
            .trim()
            .parse()
            .with_context(|| format!("invalid {PORT}: {port}"))?;
    }
    if let Some(token) = get(DASHBOARD_TOKEN) {
        config.gateway.token = Some(SecretString::new(token));
    }
    Ok(())
}

/// Comma-separated chat ids. Blank entries are skipped.
fn parse_ids(raw: &str) -> anyhow::Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .with_context(|| format!("not a chat id: {part}"))
        })
        .collect()
}
