//! SCP protocol types.

use std::path::PathBuf;

/// Direction relative to the gateway: `Upload` flows from the peer into
/// the local `scp -t` process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Upload,
    Download,
}

/// A validated `scp` exec request, ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScpInvocation {
    pub direction: TransferDirection,
    pub recursive: bool,
    /// Arguments for the local binary, the confined target last.
    pub args: Vec<String>,
    /// The session directory joined with the requested relative path.
    pub target: String,
}

/// SCP protocol header line, without the trailing newline. Names are kept
/// as the raw bytes the peer sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScpHeader {
    /// File header: C<mode> <size> <name>
    File { mode: u32, size: u64, name: Vec<u8> },
    /// Directory header: D<mode> <size> <name>
    Directory { mode: u32, name: Vec<u8> },
    /// End of directory: E
    EndDirectory,
    /// Timestamps: T<mtime> 0 <atime> 0
    Times(String),
    /// Warning: \x01<message>
    Warning(String),
    /// Error: \x02<message>
    Error(String),
}

/// Emitted once for every upload that was fully consumed, including
/// uploads discarded for exceeding the size limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub path: PathBuf,
    pub size: u64,
    pub suppressed: bool,
}
