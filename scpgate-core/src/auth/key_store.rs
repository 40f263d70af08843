use std::path::{Path, PathBuf};

use russh::keys::PublicKey;
use scpgate_common::{AuthError, Permission};
use tracing::*;

use super::AuthResult;

/// Directory of per-user `authorized_keys`-style files. Each key's comment
/// holds `privileges:directory:max_upload_size:recursive`.
///
/// Every line must be a key entry: a single unparseable line (blank and `#`
/// lines included) or comment-less entry fails the whole lookup.
pub struct KeyStore {
    directory: PathBuf,
}

impl KeyStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        KeyStore {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub async fn authenticate(&self, username: &str, key: &PublicKey) -> AuthResult {
        const REJECTED: AuthResult = AuthResult::Rejected(AuthError::NoValidKey);

        if !is_valid_key_store_name(username) {
            warn!(%username, "Refusing key lookup for unsafe username");
            return REJECTED;
        }

        let path = self.directory.join(username);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(error) => {
                debug!(?path, %error, "No readable key store");
                return REJECTED;
            }
        };

        for (index, line) in content.lines().enumerate() {
            let entry = match PublicKey::from_openssh(line.trim()) {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(?path, line = index + 1, %error, "Unparseable key store entry");
                    return REJECTED;
                }
            };

            if entry.comment().is_empty() {
                warn!(?path, line = index + 1, "Key store entry has no permissions");
                return REJECTED;
            }

            if entry.key_data() != key.key_data() {
                continue;
            }

            return match Permission::decode_key_comment(entry.comment()) {
                Ok(permission) => AuthResult::Accepted { permission },
                Err(error) => {
                    warn!(?path, line = index + 1, %error, "Malformed key permissions");
                    REJECTED
                }
            };
        }

        REJECTED
    }
}

/// Key stores are named after the user, so the name must stay inside the
/// key directory.
fn is_valid_key_store_name(username: &str) -> bool {
    !username.is_empty()
        && !username.starts_with('.')
        && !username.contains(['/', '\\', '\0'])
}
