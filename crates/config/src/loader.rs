use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use {
    anyhow::Context,
    tracing::{debug, info},
};

use crate::{env_subst::substitute_env, overrides::apply_env_overrides, schema::UstozConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["ustoz.toml", "ustoz.yaml", "ustoz.yml", "ustoz.json"];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, config discovery only looks in
/// this directory (project-local and user-global paths are skipped).
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format), substituting
/// `${VAR}` placeholders first. Environment overrides are not applied.
pub fn load_config(path: &Path) -> anyhow::Result<UstozConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path).with_context(|| format!("failed to parse {}", path.display()))
}

/// Discover the config file and load it.
///
/// Search order:
/// 1. `./ustoz.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/ustoz/ustoz.{toml,yaml,yml,json}` (user-global)
///
/// No file at all yields the defaults; a file that cannot be parsed is an
/// error rather than a silent fallback.
pub fn discover_and_load() -> anyhow::Result<UstozConfig> {
    match find_config_file() {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(UstozConfig::default())
        },
    }
}

/// Load from `path` (or discover one), then apply environment overrides.
pub fn load(path: Option<&Path>) -> anyhow::Result<UstozConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => discover_and_load()?,
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// First config file in `dir`, in [`CONFIG_FILENAMES`] order.
fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Find the first config file in standard locations.
///
/// When a config dir override is set, only that directory is searched.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return find_in(&dir);
    }
    find_in(Path::new(".")).or_else(|| user_config_dir().as_deref().and_then(find_in))
}

/// Returns the config directory: override, or `~/.config/ustoz/`.
pub fn config_dir() -> Option<PathBuf> {
    config_dir_override().or_else(user_config_dir)
}

fn user_config_dir() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config").join("ustoz"))
}

/// Returns the data directory: `~/.ustoz/`.
pub fn data_dir() -> PathBuf {
    home_dir()
        .map(|h| h.join(".ustoz"))
        .unwrap_or_else(|| PathBuf::from(".ustoz"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<UstozConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
