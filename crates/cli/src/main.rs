mod doctor_command;
mod serve_command;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "ustoz", about = "Ustoz: anonymous question relay between students and teachers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to load instead of discovering one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only look for `ustoz.{toml,yaml,yml,json}` in this directory.
    #[arg(long, global = true, conflicts_with = "config")]
    config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot, the dashboard API and the expiry sweeper.
    Serve {
        /// Override `gateway.bind`.
        #[arg(long)]
        bind: Option<String>,
        /// Override `gateway.port` (and `PORT`).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a fresh encryption key (64 hex characters).
    Keygen,
    /// Load and validate the configuration, then check the bot token.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(dir) = &cli.config_dir {
        ustoz_config::set_config_dir(dir.clone());
    }

    match cli.command {
        Commands::Serve { bind, port } => {
            info!(version = env!("CARGO_PKG_VERSION"), "ustoz starting");
            let mut config = ustoz_config::load(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            serve_command::run(config).await
        },
        Commands::Keygen => {
            println!("{}", ustoz_vault::Codec::generate_hex_key());
            Ok(())
        },
        Commands::Doctor => doctor_command::run(cli.config.as_deref()).await,
    }
}
