use anyhow::{bail, Result};
use data_encoding::HEXLOWER;
use rand::Rng;
use sha2::{Digest, Sha512};

use super::rng::get_crypto_rng;

pub const PLAINTEXT_SCHEME: &str = "$0$";
pub const SHA512_SCHEME: &str = "$6$";

/// Produces `$6$<salt>$<hex sha512(salt || password)>` with a fresh salt.
pub fn hash_password(password: &str) -> String {
    hash_password_with_salt(password, &generate_salt())
}

pub fn hash_password_with_salt(password: &str, salt: &str) -> String {
    format!("{SHA512_SCHEME}{salt}${}", salted_digest(salt, password))
}

pub fn plaintext_password(password: &str) -> String {
    format!("{PLAINTEXT_SCHEME}{password}")
}

pub fn verify_password_hash(password: &str, hash: &str) -> Result<bool> {
    if let Some(stored) = hash.strip_prefix(PLAINTEXT_SCHEME) {
        return Ok(constant_time_eq(stored.as_bytes(), password.as_bytes()));
    }
    let Some(rest) = hash.strip_prefix(SHA512_SCHEME) else {
        bail!("unsupported password hash scheme");
    };
    let Some((salt, digest)) = rest.split_once('$') else {
        bail!("malformed password hash");
    };
    Ok(constant_time_eq(
        salted_digest(salt, password).as_bytes(),
        digest.as_bytes(),
    ))
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    HEXLOWER.encode(&hasher.finalize())
}

fn generate_salt() -> String {
    HEXLOWER.encode(&get_crypto_rng().gen::<[u8; 8]>())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
