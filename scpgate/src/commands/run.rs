use std::path::Path;

use anyhow::{bail, Context, Result};
use scpgate_common::helpers::fs::is_empty_directory;
use scpgate_common::ScpgateConfig;
use scpgate_core::Services;
use scpgate_protocol_scp::{SCPProtocolServer, PROTOCOL_NAME};
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "scpgate");

    let config = load_config(&cli.config, true)?;
    check_user_sources(&config)?;

    let address = *config.store.listen;
    let (services, mut fatal_errors) = Services::new(config.clone());
    let server = SCPProtocolServer::new(&services)?.run(address);

    if console::user_attended() {
        info!("--------------------------------------------");
        info!("scpgate is now running.");
        info!("Accepting {PROTOCOL_NAME} connections on {}", config.store.listen);
        info!("--------------------------------------------");
    }

    drop(config);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
        result = server => {
            if let Err(error) = result {
                error!(?error, "{PROTOCOL_NAME} server error");
                std::process::exit(1);
            }
        }
        Some(error) = fatal_errors.recv() => {
            error!(%error, "Stopping after a fatal error");
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Refuses to start when no user could ever log in, or when the parent of
/// the user directories is missing.
fn check_user_sources(config: &ScpgateConfig) -> Result<()> {
    let has_password_store = config
        .store
        .passwd_file
        .as_ref()
        .is_some_and(|path| path.is_file());
    let has_key_stores = !is_empty_directory(&config.store.keys_dir)
        .with_context(|| format!("Could not read keys_dir {}", config.store.keys_dir))?;

    if !has_password_store && !has_key_stores {
        bail!("No password store and no key stores found");
    }

    if !Path::new(&config.store.users_dir).is_dir() {
        bail!("users_dir {} does not exist", config.store.users_dir);
    }
    Ok(())
}
