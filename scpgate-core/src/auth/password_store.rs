use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use scpgate_common::helpers::hash::{hash_password_with_salt, verify_password_hash};
use scpgate_common::{AuthError, Permission, ScpgateError, Secret};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::*;

use super::AuthResult;

const RECORD_FIELDS: usize = 7;

/// Verified against for unknown users, so they cost the same single digest
/// as a known user with a wrong password.
static UNKNOWN_USER_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password_with_salt("", "scpgate"));

/// Line-oriented `username:hash:privileges:directory:size:recursive:permanence`
/// file. Temporary records are deleted on their first successful use.
pub struct PasswordStore {
    path: PathBuf,
    // Serializes check-and-delete of temporary records within this process.
    lock: Mutex<()>,
}

struct Record<'a> {
    line_index: usize,
    hash: &'a str,
    permission_fields: Vec<&'a str>,
}

impl PasswordStore {
    pub fn new(path: PathBuf) -> Self {
        PasswordStore {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<AuthResult, ScpgateError> {
        let _guard = self.lock.lock().await;

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ScpgateError::CredentialStore {
                path: self.path.clone(),
                source,
            })?;

        let Some(record) = find_record(&content, username) else {
            let _ = verify_password_hash(password.expose_secret(), &UNKNOWN_USER_HASH);
            return Ok(AuthResult::Rejected(AuthError::InvalidCredentials));
        };

        match verify_password_hash(password.expose_secret(), record.hash) {
            Ok(true) => (),
            Ok(false) => return Ok(AuthResult::Rejected(AuthError::InvalidCredentials)),
            Err(error) => {
                warn!(%username, %error, "Unusable password hash in credential store");
                return Ok(AuthResult::Rejected(AuthError::InvalidCredentials));
            }
        }

        let permission = match Permission::from_fields(&record.permission_fields) {
            Ok(permission) => permission,
            Err(error) => {
                warn!(%username, %error, "Malformed permissions in credential store");
                return Ok(AuthResult::Rejected(AuthError::InvalidCredentials));
            }
        };

        if permission.temporary {
            let remaining = without_line(&content, record.line_index);
            replace_file(&self.path, remaining).await?;
            info!(%username, "Temporary credential consumed");
        }

        Ok(AuthResult::Accepted { permission })
    }
}

fn find_record<'a>(content: &'a str, username: &str) -> Option<Record<'a>> {
    content
        .split_inclusive('\n')
        .enumerate()
        .find_map(|(line_index, line)| {
            let line = line.trim_end_matches(['\n', '\r']);
            if line.starts_with('#') {
                return None;
            }
            let fields = line.split(':').collect::<Vec<_>>();
            if fields.len() != RECORD_FIELDS || fields[0] != username {
                return None;
            }
            Some(Record {
                line_index,
                hash: fields[1],
                permission_fields: fields[2..].to_vec(),
            })
        })
}

fn without_line(content: &str, line_index: usize) -> String {
    content
        .split_inclusive('\n')
        .enumerate()
        .filter(|(index, _)| *index != line_index)
        .map(|(_, line)| line)
        .collect()
}

/// Writes a sibling temp file and renames it over `path`, keeping the
/// original file mode.
async fn replace_file(path: &Path, content: String) -> Result<(), ScpgateError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let directory = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let permissions = std::fs::metadata(&target)?.permissions();
        let mut file = NamedTempFile::new_in(directory)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        std::fs::set_permissions(file.path(), permissions)?;
        file.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(ScpgateError::other)?
    .map_err(|source| ScpgateError::CredentialStore {
        path: path.to_path_buf(),
        source,
    })
}
