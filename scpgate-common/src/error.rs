use std::error::Error;
use std::num::ParseIntError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ScpgateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store {path:?} is unavailable: {source}")]
    CredentialStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Permission(#[from] PermissionParseError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl ScpgateError {
    pub fn other<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Other(Box::new(err))
    }

    /// Errors after which the server cannot keep authenticating anyone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CredentialStore { .. })
    }
}

/// Reported to the peer only as a generic authentication failure.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no valid key")]
    NoValidKey,
}

/// Command rejections. The `Display` text is sent to the peer verbatim.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Only scp allowed")]
    NotScp,
    #[error("Too few arguments to scp")]
    TooFewArgs,
    #[error("Disallowed characters in command")]
    DisallowedCharacter,
    #[error("Only relative paths allowed")]
    AbsolutePathArgument,
    #[error("Path traversal not allowed")]
    PathTraversal,
    #[error("Unsupported scp flag in command")]
    FlagNotSupported,
    #[error("This user does not have upload privileges")]
    UploadNotPermitted,
    #[error("This user does not have download privileges")]
    DownloadNotPermitted,
    #[error("No recursive downloads allowed")]
    RecursiveDownloadNotPermitted,
    #[error("No recursive uploads allowed")]
    RecursiveUploadNotPermitted,
}

#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("failed to start {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for the transfer process: {0}")]
    Wait(#[source] std::io::Error),
    #[error("failed to run hook {program:?}: {source}")]
    Hook {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("hook {program:?} exited with {status}")]
    HookStatus { program: String, status: String },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PermissionParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid access flags {0:?}")]
    InvalidAccess(String),
    #[error("directory {0:?} is not absolute")]
    RelativeDirectory(String),
    #[error("invalid upload size: {0}")]
    InvalidSize(#[from] ParseIntError),
    #[error("invalid permanence flag {0:?}")]
    InvalidPermanence(String),
}
