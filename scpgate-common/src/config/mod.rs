mod defaults;

use std::path::{Path, PathBuf};

use defaults::*;
use serde::Deserialize;

use crate::permission::with_trailing_separator;
use crate::{ListenEndpoint, ScpgateError};

/// Deserialized form of the YAML config file.
#[derive(Debug, Deserialize, Clone)]
pub struct ScpgateConfigStore {
    #[serde(default = "_default_listen")]
    pub listen: ListenEndpoint,

    /// Root for sessions whose permission carries no directory.
    pub shared_dir: String,

    /// Parent of the per-user directories created by `create-user`.
    pub users_dir: String,

    /// Holds one key-store file per user, named after the user.
    pub keys_dir: String,

    #[serde(default)]
    pub passwd_file: Option<PathBuf>,

    #[serde(default = "_default_host_keys_path")]
    pub host_keys: String,

    #[serde(default = "_default_scp_path")]
    pub scp_path: PathBuf,

    /// Post-upload hook argv; the uploaded path is appended.
    #[serde(default = "_default_empty_vec")]
    pub hook: Vec<String>,

    /// Appended to alongside the console log.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl ScpgateConfigStore {
    /// Checks that every path is absolute and adds trailing separators to
    /// the directories so they can be prefixed onto file names.
    pub fn validate(mut self) -> Result<Self, ScpgateError> {
        for (name, value) in [
            ("shared_dir", &mut self.shared_dir),
            ("users_dir", &mut self.users_dir),
            ("keys_dir", &mut self.keys_dir),
        ] {
            if !value.starts_with('/') {
                return Err(ScpgateError::Config(format!(
                    "{name} must be an absolute path, got {value:?}"
                )));
            }
            *value = with_trailing_separator(value);
        }

        if !self.scp_path.is_absolute() {
            return Err(ScpgateError::Config(format!(
                "scp_path must be an absolute path, got {:?}",
                self.scp_path
            )));
        }

        if let Some(ref passwd_file) = self.passwd_file {
            if !passwd_file.is_absolute() {
                return Err(ScpgateError::Config(format!(
                    "passwd_file must be an absolute path, got {passwd_file:?}"
                )));
            }
        }

        if let Some(ref log_file) = self.log_file {
            if !log_file.is_absolute() {
                return Err(ScpgateError::Config(format!(
                    "log_file must be an absolute path, got {log_file:?}"
                )));
            }
        }

        if self.hook.first().is_some_and(|program| program.is_empty()) {
            return Err(ScpgateError::Config("hook program is empty".to_owned()));
        }

        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct ScpgateConfig {
    pub store: ScpgateConfigStore,
    pub paths_relative_to: PathBuf,
}

impl ScpgateConfig {
    pub fn host_keys_path(&self) -> PathBuf {
        self.paths_relative_to.join(&self.store.host_keys)
    }

    pub fn key_store_path(&self, username: &str) -> PathBuf {
        Path::new(&self.store.keys_dir).join(username)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> ScpgateConfigStore {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let store = parse(
            "shared_dir: /srv/shared\nusers_dir: /srv/users\nkeys_dir: /etc/scpgate/keys\n",
        )
        .validate()
        .unwrap();

        assert_eq!(store.listen.port(), 2022);
        assert_eq!(store.shared_dir, "/srv/shared/");
        assert_eq!(store.users_dir, "/srv/users/");
        assert_eq!(store.keys_dir, "/etc/scpgate/keys/");
        assert_eq!(store.scp_path, PathBuf::from("/usr/bin/scp"));
        assert_eq!(store.passwd_file, None);
        assert!(store.hook.is_empty());
        assert_eq!(store.log_file, None);
    }

    #[test]
    fn test_full() {
        let store = parse(
            r#"
listen: 127.0.0.1:2200
shared_dir: /srv/shared/
users_dir: /srv/users/
keys_dir: /etc/scpgate/keys/
passwd_file: /etc/scpgate/passwd
scp_path: /opt/bin/scp
hook:
  - /usr/local/bin/scan
  - --quiet
log_file: /var/log/scpgate.log
"#,
        )
        .validate()
        .unwrap();

        assert_eq!(store.listen.to_string(), "127.0.0.1:2200");
        assert_eq!(
            store.passwd_file,
            Some(PathBuf::from("/etc/scpgate/passwd"))
        );
        assert_eq!(store.hook, vec!["/usr/local/bin/scan", "--quiet"]);
        assert_eq!(store.log_file, Some(PathBuf::from("/var/log/scpgate.log")));
    }

    #[test]
    fn test_relative_paths_rejected() {
        let result = parse("shared_dir: shared\nusers_dir: /srv/users\nkeys_dir: /keys\n").validate();
        assert!(matches!(result, Err(ScpgateError::Config(_))));

        let result = parse(
            "shared_dir: /s\nusers_dir: /u\nkeys_dir: /k\npasswd_file: passwd\n",
        )
        .validate();
        assert!(matches!(result, Err(ScpgateError::Config(_))));

        let result =
            parse("shared_dir: /s\nusers_dir: /u\nkeys_dir: /k\nlog_file: scpgate.log\n").validate();
        assert!(matches!(result, Err(ScpgateError::Config(_))));
    }
}
