//! Exec request validation.
//!
//! Turns the raw command line of an exec request into an `scp` invocation
//! confined to the session directory. Checks run in a fixed order and the
//! first failing one decides the reported reason.

use scpgate_common::{Permission, ValidationError};

use super::types::{ScpInvocation, TransferDirection};

pub const SCP_COMMAND: &str = "scp";

const DISALLOWED_CHARACTERS: &[char] = &[';', '&', '|', '>', '<', '~', '`'];

/// `default_root` stands in for an empty permission directory and must end
/// with `/`.
pub fn validate_command(
    command: &str,
    permission: &Permission,
    default_root: &str,
) -> Result<ScpInvocation, ValidationError> {
    let tokens = command.split(' ').collect::<Vec<_>>();

    if tokens[0] != SCP_COMMAND {
        return Err(ValidationError::NotScp);
    }
    if tokens.len() < 2 {
        return Err(ValidationError::TooFewArgs);
    }
    if command.contains(DISALLOWED_CHARACTERS) {
        return Err(ValidationError::DisallowedCharacter);
    }

    let (path, flags) = match tokens[1..].split_last() {
        Some((path, flags)) => (*path, flags),
        None => return Err(ValidationError::TooFewArgs),
    };

    if path.starts_with('/') {
        return Err(ValidationError::AbsolutePathArgument);
    }
    if command.contains("..") {
        return Err(ValidationError::PathTraversal);
    }

    let mut direction = None;
    let mut recursive = false;
    for flag in flags {
        let requested = match *flag {
            "-r" => {
                recursive = true;
                continue;
            }
            "-p" | "-d" | "--" => continue,
            "-t" => {
                if !permission.privileges.write {
                    return Err(ValidationError::UploadNotPermitted);
                }
                TransferDirection::Upload
            }
            "-f" => {
                if !permission.privileges.read {
                    return Err(ValidationError::DownloadNotPermitted);
                }
                TransferDirection::Download
            }
            _ => return Err(ValidationError::FlagNotSupported),
        };
        if direction.is_some_and(|d| d != requested) {
            return Err(ValidationError::FlagNotSupported);
        }
        direction = Some(requested);
    }

    let Some(direction) = direction else {
        return Err(ValidationError::FlagNotSupported);
    };

    if recursive {
        match direction {
            TransferDirection::Download if !permission.recursive.read => {
                return Err(ValidationError::RecursiveDownloadNotPermitted)
            }
            TransferDirection::Upload if !permission.recursive.write => {
                return Err(ValidationError::RecursiveUploadNotPermitted)
            }
            _ => (),
        }
    }

    let root = if permission.directory.is_empty() {
        default_root
    } else {
        &permission.directory
    };
    let target = format!("{root}{path}");

    let mut args = flags.iter().map(|flag| flag.to_string()).collect::<Vec<_>>();
    args.push(target.clone());

    Ok(ScpInvocation {
        direction,
        recursive,
        args,
        target,
    })
}
