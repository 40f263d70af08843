use std::fs::{create_dir_all, File};

use anyhow::Result;
use rand::Rng;
use russh::keys::ssh_key::private::Ed25519Keypair;
use russh::keys::{encode_pkcs8_pem, load_secret_key, PrivateKey};
use scpgate_common::helpers::fs::{secure_directory, secure_file};
use scpgate_common::helpers::rng::get_crypto_rng;
use scpgate_common::ScpgateConfig;
use tracing::*;

const HOST_KEY_NAME: &str = "host-ed25519";

pub fn generate_host_keys(config: &ScpgateConfig) -> Result<()> {
    let path = config.host_keys_path();
    create_dir_all(&path)?;
    secure_directory(&path)?;

    let key_path = path.join(HOST_KEY_NAME);
    if !key_path.exists() {
        info!("Generating Ed25519 host key");
        let seed = get_crypto_rng().gen::<[u8; 32]>();
        let key = PrivateKey::from(Ed25519Keypair::from_seed(&seed));
        let f = File::create(&key_path)?;
        encode_pkcs8_pem(&key, f)?;
    }
    secure_file(&key_path)?;

    Ok(())
}

pub fn load_host_keys(config: &ScpgateConfig) -> Result<Vec<PrivateKey>, russh::keys::Error> {
    let key_path = config.host_keys_path().join(HOST_KEY_NAME);
    Ok(vec![load_secret_key(key_path, None)?])
}
