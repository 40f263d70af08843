use std::fs::{DirBuilder, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use scpgate_common::helpers::fs::secure_directory;
use scpgate_common::helpers::hash::{hash_password, plaintext_password};
use scpgate_common::helpers::rng::{random_string, ALPHANUMERIC, LOWERCASE};
use scpgate_common::{normalize_directory, Access, Permission, ScpgateConfig};
use tracing::*;

use super::common::read_password;
use crate::config::load_config;

const RANDOM_USERNAME_LENGTH: usize = 8;
const RANDOM_PASSWORD_LENGTH: usize = 12;

#[derive(clap::Args, Debug, Default)]
pub(crate) struct CreateUserArgs {
    /// Random when omitted
    #[arg(long)]
    username: Option<String>,

    /// Prompted for when omitted, a blank answer generates one
    #[arg(long)]
    password: Option<String>,

    /// Allow uploads
    #[arg(long)]
    upload: bool,

    /// Allow downloads
    #[arg(long)]
    download: bool,

    /// Store the password as plain text
    #[arg(long)]
    plaintext: bool,

    /// Keep the credential after the first login
    #[arg(long)]
    permanent: bool,

    /// Session directory (default: <users_dir>/<username>)
    #[arg(long, conflicts_with = "no_user_dir")]
    dir: Option<String>,

    /// Use the shared directory instead of a personal one
    #[arg(long)]
    no_user_dir: bool,

    #[arg(long)]
    recursive_upload: bool,

    #[arg(long)]
    recursive_download: bool,

    /// Upload size limit in bytes, with an optional K, M, G or T suffix
    #[arg(long, default_value = "0", value_parser = parse_size)]
    max_upload_size: u64,

    /// Write a key store template instead of a password record
    #[arg(long)]
    key: bool,

    /// Password store to append to (default: passwd_file from the config)
    #[arg(long)]
    passwd_file: Option<PathBuf>,
}

pub(crate) async fn command(cli: &crate::Cli, args: &CreateUserArgs) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    create_user(&config, args)
}

fn create_user(config: &ScpgateConfig, args: &CreateUserArgs) -> Result<()> {
    if !args.upload && !args.download {
        bail!("At least one of --upload and --download is required");
    }

    let username = match args.username {
        Some(ref username) => {
            if !is_valid_username(username) {
                bail!("Invalid username {username:?}");
            }
            username.clone()
        }
        None => random_string(LOWERCASE, RANDOM_USERNAME_LENGTH),
    };

    let directory = match (args.dir.as_deref(), args.no_user_dir) {
        (Some(dir), _) => normalize_directory(dir)?,
        (None, true) => String::new(),
        (None, false) => format!("{}{username}/", config.store.users_dir),
    };

    let permission = Permission {
        privileges: Access {
            read: args.download,
            write: args.upload,
        },
        recursive: Access {
            read: args.recursive_download,
            write: args.recursive_upload,
        },
        directory,
        max_upload_size: args.max_upload_size,
        temporary: !args.permanent,
    };

    if args.key {
        create_user_directory(&permission.directory)?;
        write_key_template(config, &username, &permission)?;
        info!(%username, "Key store template created, add the user's public keys to it");
        return Ok(());
    }

    let passwd_file = args
        .passwd_file
        .clone()
        .or_else(|| config.store.passwd_file.clone())
        .context("No password store configured, set passwd_file or pass --passwd-file")?;

    let (password, generated) = match args.password {
        Some(ref password) => (password.clone(), false),
        None => {
            let password = read_password("Enter password (blank to randomize)", true)?;
            if password.is_empty() {
                (random_string(ALPHANUMERIC, RANDOM_PASSWORD_LENGTH), true)
            } else {
                (password, false)
            }
        }
    };

    if password.contains(['\n', '\r']) {
        bail!("Passwords cannot contain line breaks");
    }
    let hash = if args.plaintext {
        if password.contains(':') {
            bail!("Colons are not allowed in plain text passwords");
        }
        plaintext_password(&password)
    } else {
        hash_password(&password)
    };

    create_user_directory(&permission.directory)?;
    append_record(
        &passwd_file,
        &username,
        &format!("{username}:{hash}:{}\n", permission.encode()),
    )?;

    if generated {
        println!("User: {username} Pass: {password}");
    } else {
        if args.username.is_none() {
            println!("User: {username}");
        }
        info!(%username, passwd_file = ?passwd_file, "User added");
    }
    Ok(())
}

/// Parses `1048576`, `512K`, `10MB`, `2g` and so on. Units are powers of 1024.
fn parse_size(value: &str) -> Result<u64, String> {
    let value = value.trim();
    if let Ok(size) = value.parse::<u64>() {
        return Ok(size);
    }

    let upper = value.to_ascii_uppercase();
    let digits_end = upper
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(upper.len());
    let (number, unit) = upper.split_at(digits_end);

    let multiplier: u64 = match unit {
        "B" => 1,
        "K" | "KB" => 1 << 10,
        "M" | "MB" => 1 << 20,
        "G" | "GB" => 1 << 30,
        "T" | "TB" => 1 << 40,
        _ => return Err(format!("unknown size unit in {value:?}")),
    };
    let number = number
        .parse::<u64>()
        .map_err(|_| format!("invalid size {value:?}"))?;
    if number == 0 {
        return Err(format!("invalid size {value:?}"));
    }
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size {value:?} is too large"))
}

/// Usernames double as key store file names and password store keys.
fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && !username.starts_with('.')
        && !username.starts_with('#')
        && !username.contains([':', '/', '\\', '\0'])
        && !username.chars().any(char::is_whitespace)
}

fn create_user_directory(directory: &str) -> Result<()> {
    if directory.is_empty() {
        return Ok(());
    }
    match DirBuilder::new().mode(0o750).create(directory) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::AlreadyExists => {
            warn!(%directory, "User directory already exists");
            Ok(())
        }
        Err(error) => {
            Err(error).with_context(|| format!("Unable to create user directory {directory}"))
        }
    }
}

/// Appends a record, refusing to shadow an existing one since logins use the
/// first matching line.
fn append_record(passwd_file: &Path, username: &str, record: &str) -> Result<()> {
    let existing = match std::fs::read_to_string(passwd_file) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => String::new(),
        Err(error) => {
            return Err(error).with_context(|| format!("Could not read {passwd_file:?}"))
        }
    };
    if existing
        .lines()
        .any(|line| line.split(':').next() == Some(username))
    {
        bail!("User {username} already exists in {passwd_file:?}");
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(passwd_file)
        .with_context(|| format!("Could not open {passwd_file:?}"))?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.write_all(record.as_bytes())?;
    Ok(())
}

/// Key logins for the user fail until the placeholder line is replaced by
/// a real key line carrying the same comment.
fn write_key_template(
    config: &ScpgateConfig,
    username: &str,
    permission: &Permission,
) -> Result<()> {
    let keys_dir = Path::new(&config.store.keys_dir);
    if !keys_dir.is_dir() {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(keys_dir)
            .with_context(|| format!("Could not create {keys_dir:?}"))?;
        secure_directory(keys_dir)?;
    }

    let path = config.key_store_path(username);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(&path)
        .with_context(|| format!("Could not open {path:?}"))?;
    writeln!(
        file,
        "# <key-type> <base64-key> {}",
        permission.encode_key_comment()
    )?;
    info!(?path, "Wrote key store template");
    Ok(())
}
