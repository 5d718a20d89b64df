//! Configuration: file discovery, `${VAR}` substitution, environment
//! overrides, and validation.

pub mod env_subst;
pub mod loader;
pub mod overrides;
pub mod schema;

pub use {
    loader::{
        config_dir, data_dir, discover_and_load, load, load_config, set_config_dir,
    },
    overrides::apply_env_overrides,
    schema::{
        CryptoConfig, GatewayConfig, RelayConfig, RespondersConfig, StorageBackend, StorageConfig,
        TelegramConfig, UstozConfig,
    },
};
