use std::path::Path;

use {
    ustoz_channels::ChannelStatus,
    ustoz_config::{StorageBackend, UstozConfig},
    ustoz_telegram::TelegramBot,
    ustoz_vault::Codec,
};

/// Static checks only: everything that can be judged without the network.
fn offline_report(config: &UstozConfig) -> (Vec<String>, Vec<String>) {
    let mut ok = Vec::new();
    let mut problems = config.problems();

    if let Some(key) = &config.crypto.key {
        match Codec::from_hex_key(key) {
            Ok(_) => ok.push("encryption key accepted".to_string()),
            Err(e) if problems.iter().all(|p| !p.starts_with("crypto.key")) => {
                problems.push(format!("crypto.key: {e}"));
            },
            Err(_) => {},
        }
    }
    if !config.responders.ids.is_empty() {
        let ids: Vec<String> = config.responders.ids.iter().map(i64::to_string).collect();
        ok.push(format!("responders: {}", ids.join(", ")));
    }
    ok.push(match config.storage.backend {
        StorageBackend::Memory => "storage: memory (state is lost on restart)".to_string(),
        StorageBackend::Sqlite => format!(
            "storage: sqlite ({})",
            config
                .storage
                .path
                .as_deref()
                .map_or_else(|| "default path".to_string(), |p| p.display().to_string())
        ),
    });
    ok.push(format!(
        "dashboard: {}:{} ({})",
        config.gateway.bind,
        config.gateway.port,
        if config.gateway.token.is_some() {
            "token required"
        } else {
            "open"
        }
    ));
    (ok, problems)
}

pub async fn run(path: Option<&Path>) -> anyhow::Result<()> {
    let config = match ustoz_config::load(path) {
        Ok(config) => config,
        Err(e) => {
            println!("✗ config: {e:#}");
            anyhow::bail!("configuration could not be loaded");
        },
    };
    println!("✓ config loaded");

    let (ok, mut problems) = offline_report(&config);
    for line in &ok {
        println!("✓ {line}");
    }

    if let Some(token) = &config.telegram.token {
        let health = TelegramBot::new(token).outbound().probe().await?;
        match (health.connected, health.account) {
            (true, account) => println!(
                "✓ telegram: @{}",
                account.unwrap_or_else(|| "unknown".into())
            ),
            (false, _) => problems.push(format!(
                "telegram: {}",
                health.details.unwrap_or_else(|| "not reachable".into())
            )),
        }
    }

    for problem in &problems {
        println!("✗ {problem}");
    }
    if problems.is_empty() {
        println!("all checks passed");
        Ok(())
    } else {
        anyhow::bail!("{} problem(s) found", problems.len())
    }
}
