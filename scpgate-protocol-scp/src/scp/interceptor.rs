//! Streaming SCP frame tracker.
//!
//! Sits on one stream between the channel and the local `scp` process,
//! follows the header/data framing, enforces the upload size limit and
//! reports finished uploads.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;
use tracing::*;

use super::parser::ScpParser;
use super::types::{CompletedTransfer, ScpHeader, TransferDirection};

/// Longest header line that is buffered before it is passed through as is.
pub const MAX_HEADER_LENGTH: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a header line.
    Idle,
    /// Forwarding file data.
    InData,
    /// Consuming file data of an oversized upload without forwarding it.
    Suppressing,
}

/// Per-stream framing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFrame {
    pub phase: Phase,
    pub directory_stack: Vec<OsString>,
    pub current_file: OsString,
    pub expected_size: u64,
    pub bytes_seen: u64,
}

impl Default for TransferFrame {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            directory_stack: vec![],
            current_file: OsString::new(),
            expected_size: 0,
            bytes_seen: 0,
        }
    }
}

impl TransferFrame {
    // Data plus the trailing status byte.
    fn payload_len(&self) -> u64 {
        self.expected_size.saturating_add(1)
    }
}

/// Where the files named in headers end up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferRoot {
    /// An existing directory; names are created inside it.
    Directory(PathBuf),
    /// A path that is not a directory: a single file is written to it, and
    /// the first directory of a recursive upload is created under its name.
    Target(PathBuf),
}

impl TransferRoot {
    pub async fn resolve(direction: TransferDirection, target: &str) -> Self {
        let target = PathBuf::from(target);
        match direction {
            TransferDirection::Upload => {
                match tokio::fs::metadata(&target).await {
                    Ok(metadata) if metadata.is_dir() => Self::Directory(target),
                    _ => Self::Target(target),
                }
            }
            // A source is announced by its own name
            TransferDirection::Download => Self::Directory(
                target
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("/")),
            ),
        }
    }
}

pub struct ScpInterceptor {
    direction: TransferDirection,
    stream: &'static str,
    root: TransferRoot,
    max_upload_size: u64,
    events: Option<mpsc::UnboundedSender<CompletedTransfer>>,
    parser: ScpParser,
    frame: TransferFrame,
    header: BytesMut,
}

impl ScpInterceptor {
    pub fn new(direction: TransferDirection, stream: &'static str, root: TransferRoot) -> Self {
        Self {
            direction,
            stream,
            root,
            max_upload_size: 0,
            events: None,
            parser: ScpParser::new(),
            frame: TransferFrame::default(),
            header: BytesMut::new(),
        }
    }

    /// Only applies to uploads. `0` disables the limit.
    pub fn with_size_limit(mut self, max_upload_size: u64) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<CompletedTransfer>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn frame(&self) -> &TransferFrame {
        &self.frame
    }

    /// Feeds one chunk of the stream and returns the bytes to pass on.
    pub fn process(&mut self, mut data: &[u8]) -> Bytes {
        let mut output = BytesMut::with_capacity(data.len());
        while !data.is_empty() {
            data = match self.frame.phase {
                Phase::Idle => self.consume_header(data, &mut output),
                Phase::InData | Phase::Suppressing => self.consume_payload(data, &mut output),
            };
        }
        output.freeze()
    }

    fn consume_header<'a>(&mut self, data: &'a [u8], output: &mut BytesMut) -> &'a [u8] {
        if self.header.is_empty() && data[0] == 0 {
            // Acknowledgement
            output.put_u8(0);
            return &data[1..];
        }

        match data.iter().position(|b| *b == b'\n') {
            Some(end) => {
                self.header.extend_from_slice(&data[..=end]);
                let line = self.header.split().freeze();
                self.handle_header(&line, output);
                &data[end + 1..]
            }
            None => {
                self.header.extend_from_slice(data);
                if self.header.len() > MAX_HEADER_LENGTH {
                    warn!(
                        stream = self.stream,
                        length = self.header.len(),
                        "Header line too long, passing it through"
                    );
                    output.extend_from_slice(&self.header.split());
                }
                &[]
            }
        }
    }

    fn handle_header(&mut self, line: &[u8], output: &mut BytesMut) {
        match self.parser.parse_header(line) {
            Some(ScpHeader::File { size, name, .. }) if is_valid_name(&name) => {
                self.frame.current_file = OsStr::from_bytes(&name).to_owned();
                self.frame.expected_size = size;
                self.frame.bytes_seen = 0;

                if self.exceeds_size_limit(size) {
                    if let Some(rewritten) = self.parser.suppress_file_size(line) {
                        info!(
                            stream = self.stream,
                            path = ?self.transfer_path(),
                            size,
                            limit = self.max_upload_size,
                            "Upload exceeds the size limit, discarding its content"
                        );
                        output.extend_from_slice(&rewritten);
                        self.frame.phase = Phase::Suppressing;
                        return;
                    }
                }

                debug!(stream = self.stream, path = ?self.transfer_path(), size, "File transfer started");
                self.frame.phase = Phase::InData;
            }
            Some(ScpHeader::Directory { name, .. }) if is_valid_name(&name) => {
                self.frame
                    .directory_stack
                    .push(OsStr::from_bytes(&name).to_owned());
                debug!(stream = self.stream, directory = ?self.frame.directory_stack, "Entering directory");
            }
            Some(ScpHeader::EndDirectory) => {
                if self.frame.directory_stack.pop().is_none() {
                    warn!(stream = self.stream, "Directory end without a matching start, staying at the root");
                }
            }
            Some(ScpHeader::Times(_)) => (),
            Some(ScpHeader::Warning(message)) => {
                warn!(stream = self.stream, %message, "SCP warning");
            }
            Some(ScpHeader::Error(message)) => {
                warn!(stream = self.stream, %message, "SCP error");
            }
            _ => {
                warn!(
                    stream = self.stream,
                    line = %String::from_utf8_lossy(line).trim_end(),
                    "Unexpected SCP header"
                );
            }
        }
        output.extend_from_slice(line);
    }

    fn consume_payload<'a>(&mut self, data: &'a [u8], output: &mut BytesMut) -> &'a [u8] {
        let remaining = self.frame.payload_len() - self.frame.bytes_seen;
        let take = remaining.min(data.len() as u64) as usize;
        let (chunk, rest) = data.split_at(take);
        self.frame.bytes_seen += take as u64;

        let complete = self.frame.bytes_seen == self.frame.payload_len();
        match self.frame.phase {
            Phase::InData => output.extend_from_slice(chunk),
            // Terminates the emptied file
            Phase::Suppressing if complete => output.put_u8(0),
            _ => (),
        }

        if complete {
            self.complete();
        }
        rest
    }

    fn complete(&mut self) {
        let suppressed = self.frame.phase == Phase::Suppressing;
        let path = self.transfer_path();
        let size = self.frame.expected_size;

        match self.direction {
            TransferDirection::Upload => {
                info!(stream = self.stream, ?path, size, suppressed, "Upload complete");
                if let Some(ref events) = self.events {
                    let _ = events.send(CompletedTransfer {
                        path,
                        size,
                        suppressed,
                    });
                }
            }
            TransferDirection::Download => {
                info!(stream = self.stream, ?path, size, "Download complete");
            }
        }

        self.frame.phase = Phase::Idle;
        self.frame.current_file.clear();
        self.frame.expected_size = 0;
        self.frame.bytes_seen = 0;
    }

    fn exceeds_size_limit(&self, size: u64) -> bool {
        self.direction == TransferDirection::Upload
            && self.max_upload_size > 0
            && size > self.max_upload_size
    }

    fn transfer_path(&self) -> PathBuf {
        let stack = &self.frame.directory_stack;
        let mut path = match self.root {
            TransferRoot::Directory(ref directory) => {
                let mut path = directory.clone();
                path.extend(stack);
                path
            }
            TransferRoot::Target(ref target) => {
                if stack.is_empty() {
                    return target.clone();
                }
                let mut path = target.clone();
                path.extend(&stack[1..]);
                path
            }
        };
        path.push(&self.frame.current_file);
        path
    }
}

/// Names in headers must be a single path component. Any other byte,
/// including invalid UTF-8, is accepted like `scp -t` does.
fn is_valid_name(name: &[u8]) -> bool {
    !name.is_empty() && name != b"." && name != b".." && !name.contains(&b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(root: TransferRoot, limit: u64) -> (ScpInterceptor, mpsc::UnboundedReceiver<CompletedTransfer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let interceptor = ScpInterceptor::new(TransferDirection::Upload, "stdin", root)
            .with_size_limit(limit)
            .with_events(tx);
        (interceptor, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<CompletedTransfer>) -> Vec<CompletedTransfer> {
        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn uploads_dir() -> TransferRoot {
        TransferRoot::Directory("/srv/uploads".into())
    }

    #[test]
    fn test_single_file_passthrough() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 0);

        let mut stream = b"C0644 5 hello.txt\n".to_vec();
        stream.extend_from_slice(b"hello\0");

        assert_eq!(&interceptor.process(&stream)[..], &stream[..]);
        assert_eq!(interceptor.frame(), &TransferFrame::default());
        assert_eq!(
            drain(&mut rx),
            vec![CompletedTransfer {
                path: "/srv/uploads/hello.txt".into(),
                size: 5,
                suppressed: false,
            }]
        );
    }

    #[test]
    fn test_state_survives_chunk_boundaries() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 0);

        let mut stream = b"C0644 10 a.bin\n0123456789\0C0600 0 empty\n\0".to_vec();
        stream.extend_from_slice(b"C0644 3 b.bin\nxyz\0");

        let mut forwarded = vec![];
        for chunk in stream.chunks(3) {
            forwarded.extend_from_slice(&interceptor.process(chunk));
        }

        assert_eq!(forwarded, stream);
        let paths = drain(&mut rx)
            .into_iter()
            .map(|e| e.path)
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/srv/uploads/a.bin"),
                PathBuf::from("/srv/uploads/empty"),
                PathBuf::from("/srv/uploads/b.bin"),
            ]
        );
    }

    #[test]
    fn test_oversized_upload_is_suppressed() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 1_000_000);

        assert_eq!(
            &interceptor.process(b"C0644 5000000 big.bin\n")[..],
            b"C0644 0 big.bin\n"
        );
        assert_eq!(interceptor.frame().phase, Phase::Suppressing);

        let mut forwarded = vec![];
        let payload = vec![0x5a; 5_000_000];
        for chunk in payload.chunks(32 * 1024) {
            forwarded.extend_from_slice(&interceptor.process(chunk));
        }
        assert!(forwarded.is_empty());
        assert!(drain(&mut rx).is_empty());

        forwarded.extend_from_slice(&interceptor.process(b"\0"));
        assert_eq!(forwarded, b"\0");
        assert_eq!(interceptor.frame().phase, Phase::Idle);
        assert_eq!(
            drain(&mut rx),
            vec![CompletedTransfer {
                path: "/srv/uploads/big.bin".into(),
                size: 5_000_000,
                suppressed: true,
            }]
        );
    }

    #[test]
    fn test_non_utf8_names_are_tracked() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 1_000_000);

        assert_eq!(
            &interceptor.process(b"D0755 0 d\xe9j\xe0\nC0644 5000000 big\xff.bin\n")[..],
            b"D0755 0 d\xe9j\xe0\nC0644 0 big\xff.bin\n"
        );
        assert_eq!(interceptor.frame().phase, Phase::Suppressing);

        let mut forwarded = vec![];
        let payload = vec![0x5a; 5_000_001];
        for chunk in payload.chunks(64 * 1024) {
            forwarded.extend_from_slice(&interceptor.process(chunk));
        }
        assert_eq!(forwarded, b"\0");

        let mut expected = PathBuf::from("/srv/uploads");
        expected.push(OsStr::from_bytes(b"d\xe9j\xe0"));
        expected.push(OsStr::from_bytes(b"big\xff.bin"));
        assert_eq!(
            drain(&mut rx),
            vec![CompletedTransfer {
                path: expected,
                size: 5_000_000,
                suppressed: true,
            }]
        );
    }

    #[test]
    fn test_limit_allows_exact_size() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 4);

        let stream = b"C0644 4 ok\nabcd\0C0644 5 no\nabcde\0";
        let forwarded = interceptor.process(stream);

        assert_eq!(&forwarded[..], b"C0644 4 ok\nabcd\0C0644 0 no\n\0");
        let suppressed = drain(&mut rx)
            .into_iter()
            .map(|e| e.suppressed)
            .collect::<Vec<_>>();
        assert_eq!(suppressed, vec![false, true]);
    }

    #[test]
    fn test_recursive_upload_into_directory() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 0);

        let stream = b"D0755 0 photos\nC0644 1 a.jpg\na\0D0755 0 2024\nC0644 1 b.jpg\nb\0E\nE\nC0644 1 top\nt\0";
        assert_eq!(&interceptor.process(stream)[..], &stream[..]);

        let paths = drain(&mut rx)
            .into_iter()
            .map(|e| e.path)
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/srv/uploads/photos/a.jpg"),
                PathBuf::from("/srv/uploads/photos/2024/b.jpg"),
                PathBuf::from("/srv/uploads/top"),
            ]
        );
    }

    #[test]
    fn test_upload_to_new_name() {
        let (mut interceptor, mut rx) = upload(TransferRoot::Target("/srv/uploads/renamed".into()), 0);
        interceptor.process(b"C0644 1 original.txt\nx\0");

        let (mut recursive, mut recursive_rx) =
            upload(TransferRoot::Target("/srv/uploads/backup".into()), 0);
        recursive.process(b"D0755 0 photos\nD0755 0 2024\nC0644 1 b.jpg\nb\0E\nE\n");

        assert_eq!(drain(&mut rx)[0].path, PathBuf::from("/srv/uploads/renamed"));
        assert_eq!(
            drain(&mut recursive_rx)[0].path,
            PathBuf::from("/srv/uploads/backup/2024/b.jpg")
        );
    }

    #[test]
    fn test_directory_underflow_clamps_at_root() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 0);

        let stream = b"E\nE\nD0755 0 docs\nC0644 1 x\nx\0";
        assert_eq!(&interceptor.process(stream)[..], &stream[..]);
        assert_eq!(
            interceptor.frame().directory_stack,
            vec![OsString::from("docs")]
        );
        assert_eq!(drain(&mut rx)[0].path, PathBuf::from("/srv/uploads/docs/x"));
    }

    #[test]
    fn test_unexpected_lines_pass_through() {
        let (mut interceptor, mut rx) = upload(uploads_dir(), 1);

        let stream = b"garbage line\nC0644 9 ../escape\nD0755 0 ..\n\x01scp: warning\nT1 0 1 0\n";
        assert_eq!(&interceptor.process(stream)[..], &stream[..]);
        assert_eq!(interceptor.frame(), &TransferFrame::default());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_download_never_suppresses() {
        let mut interceptor = ScpInterceptor::new(
            TransferDirection::Download,
            "stdout",
            TransferRoot::Directory("/srv/shared".into()),
        )
        .with_size_limit(1);

        let stream = b"C0644 5 report.txt\nhello\0";
        assert_eq!(&interceptor.process(stream)[..], &stream[..]);
        assert_eq!(interceptor.frame().phase, Phase::Idle);
    }

    #[test]
    fn test_oversized_header_is_flushed() {
        let (mut interceptor, _rx) = upload(uploads_dir(), 0);

        let line = vec![b'x'; MAX_HEADER_LENGTH + 1];
        assert_eq!(interceptor.process(&line).len(), MAX_HEADER_LENGTH + 1);
        assert_eq!(&interceptor.process(b"\n")[..], b"\n");
    }

    #[tokio::test]
    async fn test_resolve_root() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().to_str().unwrap();
        let missing = dir.path().join("new.txt");

        assert_eq!(
            TransferRoot::resolve(TransferDirection::Upload, existing).await,
            TransferRoot::Directory(dir.path().to_path_buf())
        );
        assert_eq!(
            TransferRoot::resolve(TransferDirection::Upload, missing.to_str().unwrap()).await,
            TransferRoot::Target(missing.clone())
        );
        assert_eq!(
            TransferRoot::resolve(TransferDirection::Download, missing.to_str().unwrap()).await,
            TransferRoot::Directory(dir.path().to_path_buf())
        );
    }
}
