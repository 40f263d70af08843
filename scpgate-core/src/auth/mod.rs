mod key_store;
mod password_store;

pub use key_store::KeyStore;
pub use password_store::PasswordStore;
use russh::keys::PublicKey;
use scpgate_common::{AuthError, Permission, ScpgateConfig, ScpgateError, Secret};
use tracing::*;

#[derive(Debug, Clone)]
pub enum AuthCredential {
    Password(Secret<String>),
    PublicKey(PublicKey),
}

impl AuthCredential {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PublicKey(_) => "publickey",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Accepted { permission: Permission },
    Rejected(AuthError),
}

/// Routes credentials to the password store or the per-user key stores.
pub struct Authenticator {
    passwords: Option<PasswordStore>,
    keys: KeyStore,
}

impl Authenticator {
    pub fn new(config: &ScpgateConfig) -> Self {
        Authenticator {
            passwords: config.store.passwd_file.clone().map(PasswordStore::new),
            keys: KeyStore::new(&config.store.keys_dir),
        }
    }

    /// `Err` means the credential stores themselves are unusable.
    pub async fn authenticate(
        &self,
        username: &str,
        credential: &AuthCredential,
    ) -> Result<AuthResult, ScpgateError> {
        let result = match credential {
            AuthCredential::Password(password) => match self.passwords {
                Some(ref store) => store.authenticate(username, password).await?,
                None => {
                    debug!("Password authentication without a password store");
                    AuthResult::Rejected(AuthError::InvalidCredentials)
                }
            },
            AuthCredential::PublicKey(key) => self.keys.authenticate(username, key).await,
        };

        match result {
            AuthResult::Accepted { ref permission } => info!(
                event_type = "authentication",
                status = "accepted",
                credential = credential.kind(),
                permission = %permission.encode(),
                "Authenticated"
            ),
            AuthResult::Rejected(reason) => info!(
                event_type = "authentication",
                status = "rejected",
                credential = credential.kind(),
                %reason,
                "Authentication failed"
            ),
        }
        Ok(result)
    }
}
