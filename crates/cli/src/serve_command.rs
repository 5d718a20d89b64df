use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    tokio::task::{JoinError, JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
    ustoz_channels::{ChannelStatus, Relay},
    ustoz_common::ResponderId,
    ustoz_config::{RelayConfig, StorageBackend, StorageConfig, UstozConfig},
    ustoz_gateway::{auth::resolve_auth, server::start_gateway, state::GatewayState},
    ustoz_routing::{RouterSettings, SessionRouter, SystemClock},
    ustoz_sessions::{MemoryStore, RelayStore, SqliteStore},
    ustoz_telegram::TelegramBot,
    ustoz_vault::Codec,
};

pub fn router_settings(relay: &RelayConfig) -> RouterSettings {
    RouterSettings {
        cooldown: Duration::from_secs(relay.cooldown_secs),
        session_ttl: Duration::from_secs(relay.session_ttl_secs),
        claim_ttl: Duration::from_secs(relay.claim_ttl_secs),
        question_ttl: Duration::from_secs(relay.question_ttl_secs),
        max_questions: relay.max_questions,
        sweep_interval: Duration::from_secs(relay.sweep_interval_secs),
    }
}

pub async fn open_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn RelayStore>> {
    match storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        },
        StorageBackend::Sqlite => {
            let path = storage
                .path
                .clone()
                .unwrap_or_else(|| ustoz_config::data_dir().join("ustoz.db"));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let store = SqliteStore::connect(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            info!(path = %path.display(), "using sqlite store");
            Ok(Arc::new(store))
        },
    }
}

fn joined(result: Result<anyhow::Result<()>, JoinError>) -> anyhow::Result<()> {
    result.context("gateway task panicked")?
}

/// Wire everything together and run until Ctrl-C or until the gateway or
/// the polling loop stops.
pub async fn run(config: UstozConfig) -> anyhow::Result<()> {
    config.validate()?;
    let UstozConfig {
        telegram,
        responders,
        crypto,
        relay,
        gateway,
        storage,
    } = config;

    let key = crypto.key.context("crypto.key is not set")?;
    let codec = Arc::new(Codec::from_hex_key(&key).context("invalid encryption key")?);
    let token = telegram.token.context("telegram.token is not set")?;

    let store = open_store(&storage).await?;
    let router = Arc::new(SessionRouter::new(
        store,
        codec,
        responders.ids.iter().copied().map(ResponderId),
        router_settings(&relay),
        Arc::new(SystemClock),
    ));

    let shutdown = CancellationToken::new();
    let sweeper = router.spawn_sweeper(shutdown.child_token());

    let bot = TelegramBot::new(&token);
    let outbound = bot.outbound();
    match outbound.probe().await {
        Ok(health) if health.connected => {
            info!(account = ?health.account, "telegram bot authenticated");
        },
        Ok(health) => warn!(details = ?health.details, "telegram bot not reachable yet"),
        Err(e) => warn!(error = %e, "telegram probe failed"),
    }
    let relay = Arc::new(Relay::new(Arc::clone(&router), Arc::new(outbound)));

    let state = GatewayState::new(Arc::clone(&relay), resolve_auth(gateway.token), shutdown.clone());
    let server = tokio::spawn(async move {
        start_gateway(state, &gateway.bind, gateway.port).await
    });

    let polling = tokio::spawn({
        let cancel = shutdown.clone();
        async move { bot.run(relay, cancel).await }
    });

    info!(responders = responders.ids.len(), "relay running; press Ctrl-C to stop");
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")
    };
    supervise(server, polling, sweeper, shutdown, ctrl_c).await
}

/// Why the serve loop stopped.
enum Exit {
    Requested,
    GatewayStopped(anyhow::Result<()>),
    PollingStopped,
}

/// Wait for a stop request or for either long-running task to end on its
/// own, then cancel everything and join. Only a requested stop is a success.
async fn supervise(
    mut server: JoinHandle<anyhow::Result<()>>,
    mut polling: JoinHandle<()>,
    sweeper: JoinHandle<()>,
    shutdown: CancellationToken,
    stop: impl Future<Output = anyhow::Result<()>>,
) -> anyhow::Result<()> {
    let exit = tokio::select! {
        signal = stop => {
            signal?;
            info!("shutdown requested");
            Exit::Requested
        },
        result = &mut server => Exit::GatewayStopped(joined(result)),
        result = &mut polling => {
            if let Err(e) = result {
                warn!(error = %e, "telegram task ended abnormally");
            }
            Exit::PollingStopped
        },
    };

    shutdown.cancel();
    if !matches!(exit, Exit::PollingStopped) {
        if let Err(e) = polling.await {
            warn!(error = %e, "telegram task ended abnormally");
        }
    }
    if let Err(e) = sweeper.await {
        warn!(error = %e, "sweeper task ended abnormally");
    }

    match exit {
        Exit::Requested => {
            joined(server.await)?;
            info!("ustoz stopped");
            Ok(())
        },
        Exit::GatewayStopped(result) => {
            result?;
            anyhow::bail!("gateway stopped unexpectedly")
        },
        Exit::PollingStopped => {
            joined(server.await)?;
            anyhow::bail!("telegram polling stopped unexpectedly")
        },
    }
}
