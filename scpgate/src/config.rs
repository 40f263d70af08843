use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use scpgate_common::helpers::fs::secure_file;
use scpgate_common::{ScpgateConfig, ScpgateConfigStore};
use tracing::*;

pub fn load_config(path: &Path, secure: bool) -> Result<ScpgateConfig> {
    if secure {
        secure_file(path).context("Could not secure config")?;
    }

    let store: ScpgateConfigStore = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix("SCPGATE"))
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;
    let store = store.validate()?;

    let config = ScpgateConfig {
        store,
        paths_relative_to: path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    info!(
        "Using config: {path:?} (shared: {}, users: {}, password store: {})",
        config.store.shared_dir,
        config.store.users_dir,
        config
            .store
            .passwd_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_owned()),
    );
    Ok(config)
}

/// Reads only `log_file`, so file logging can start before the rest of the
/// config is validated and any problem with it gets logged there too.
pub fn configured_log_file(path: &Path) -> Option<PathBuf> {
    Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(Environment::with_prefix("SCPGATE"))
        .build()
        .ok()?
        .get::<Option<PathBuf>>("log_file")
        .ok()
        .flatten()
        .filter(|log_file| log_file.is_absolute())
}
