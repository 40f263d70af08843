use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use russh::keys::ssh_encoding::Decode;
use russh::ChannelId;
use scpgate_common::{ListenEndpoint, ScpgateConfig, ScpgateConfigStore};
use scpgate_core::Services;

use super::channel_writer::{ChannelWriter, RequestReplies};

pub fn channel_id(id: u32) -> ChannelId {
    ChannelId::decode(&mut &id.to_be_bytes()[..]).unwrap()
}

/// Services rooted in `dir`, running `scp_path` for transfers.
pub fn services(dir: &Path, scp_path: &str, hook: Vec<String>) -> Services {
    let root = format!("{}/", dir.display());
    let config = ScpgateConfig {
        store: ScpgateConfigStore {
            listen: ListenEndpoint::resolve(":2022").unwrap(),
            shared_dir: root.clone(),
            users_dir: root.clone(),
            keys_dir: format!("{root}keys/"),
            passwd_file: None,
            host_keys: "keys".into(),
            scp_path: scp_path.into(),
            hook,
            log_file: None,
        },
        paths_relative_to: dir.to_path_buf(),
    };
    Services::new(config).0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Success,
    Failure,
    Data(Vec<u8>),
    ExtendedData(u32, Vec<u8>),
    ExitStatus(u32),
    Eof,
    Close,
}

/// Collects everything written by background tasks.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    replies: Arc<Mutex<Vec<(ChannelId, Reply)>>>,
}

impl RecordingWriter {
    pub fn replies(&self) -> Vec<(ChannelId, Reply)> {
        self.replies.lock().unwrap().clone()
    }

    fn push(&self, channel: ChannelId, reply: Reply) {
        self.replies.lock().unwrap().push((channel, reply));
    }
}

impl ChannelWriter for RecordingWriter {
    fn data(&self, channel: ChannelId, data: Bytes) -> impl Future<Output = Result<(), ()>> + Send {
        self.push(channel, Reply::Data(data.to_vec()));
        async { Ok(()) }
    }

    fn extended_data(
        &self,
        channel: ChannelId,
        code: u32,
        data: Bytes,
    ) -> impl Future<Output = Result<(), ()>> + Send {
        self.push(channel, Reply::ExtendedData(code, data.to_vec()));
        async { Ok(()) }
    }

    fn exit_status(&self, channel: ChannelId, status: u32) -> impl Future<Output = ()> + Send {
        self.push(channel, Reply::ExitStatus(status));
        async {}
    }

    fn eof(&self, channel: ChannelId) -> impl Future<Output = ()> + Send {
        self.push(channel, Reply::Eof);
        async {}
    }

    fn close(&self, channel: ChannelId) -> impl Future<Output = ()> + Send {
        self.push(channel, Reply::Close);
        async {}
    }
}

/// Stands in for the russh session inside handler callbacks.
#[derive(Default)]
pub struct RecordingSession {
    pub replies: Vec<(ChannelId, Reply)>,
    pub writer: RecordingWriter,
}

impl RecordingSession {
    pub fn take(&mut self) -> Vec<Reply> {
        self.replies.drain(..).map(|(_, reply)| reply).collect()
    }
}

impl RequestReplies for RecordingSession {
    type Writer = RecordingWriter;

    fn success(&mut self, channel: ChannelId) {
        self.replies.push((channel, Reply::Success));
    }

    fn failure(&mut self, channel: ChannelId) {
        self.replies.push((channel, Reply::Failure));
    }

    fn write(&mut self, channel: ChannelId, data: &[u8]) {
        self.replies.push((channel, Reply::Data(data.to_vec())));
    }

    fn exit_status(&mut self, channel: ChannelId, status: u32) {
        self.replies.push((channel, Reply::ExitStatus(status)));
    }

    fn eof(&mut self, channel: ChannelId) {
        self.replies.push((channel, Reply::Eof));
    }

    fn close(&mut self, channel: ChannelId) {
        self.replies.push((channel, Reply::Close));
    }

    fn writer(&self) -> RecordingWriter {
        self.writer.clone()
    }
}
