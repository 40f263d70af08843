use std::future::Future;

use bytes::Bytes;
use russh::server::{Handle, Session};
use russh::ChannelId;

/// Writes to a channel from tasks running outside the handler callbacks.
pub trait ChannelWriter: Clone + Send + Sync + 'static {
    /// `Err` once the channel is gone.
    fn data(&self, channel: ChannelId, data: Bytes) -> impl Future<Output = Result<(), ()>> + Send;

    fn extended_data(
        &self,
        channel: ChannelId,
        code: u32,
        data: Bytes,
    ) -> impl Future<Output = Result<(), ()>> + Send;

    fn exit_status(&self, channel: ChannelId, status: u32) -> impl Future<Output = ()> + Send;

    fn eof(&self, channel: ChannelId) -> impl Future<Output = ()> + Send;

    fn close(&self, channel: ChannelId) -> impl Future<Output = ()> + Send;
}

impl ChannelWriter for Handle {
    fn data(&self, channel: ChannelId, data: Bytes) -> impl Future<Output = Result<(), ()>> + Send {
        async move { Handle::data(self, channel, data).await.map_err(|_| ()) }
    }

    fn extended_data(
        &self,
        channel: ChannelId,
        code: u32,
        data: Bytes,
    ) -> impl Future<Output = Result<(), ()>> + Send {
        async move {
            Handle::extended_data(self, channel, code, data)
                .await
                .map_err(|_| ())
        }
    }

    fn exit_status(&self, channel: ChannelId, status: u32) -> impl Future<Output = ()> + Send {
        async move {
            let _ = self.exit_status_request(channel, status).await;
        }
    }

    fn eof(&self, channel: ChannelId) -> impl Future<Output = ()> + Send {
        async move {
            let _ = Handle::eof(self, channel).await;
        }
    }

    fn close(&self, channel: ChannelId) -> impl Future<Output = ()> + Send {
        async move {
            let _ = Handle::close(self, channel).await;
        }
    }
}

/// Replies sent while a handler callback holds the session.
pub trait RequestReplies {
    type Writer: ChannelWriter;

    fn success(&mut self, channel: ChannelId);
    /// Only answers when the peer asked for a reply.
    fn failure(&mut self, channel: ChannelId);
    fn write(&mut self, channel: ChannelId, data: &[u8]);
    fn exit_status(&mut self, channel: ChannelId, status: u32);
    fn eof(&mut self, channel: ChannelId);
    fn close(&mut self, channel: ChannelId);
    fn writer(&self) -> Self::Writer;
}

impl RequestReplies for Session {
    type Writer = Handle;

    fn success(&mut self, channel: ChannelId) {
        let _ = self.channel_success(channel);
    }

    fn failure(&mut self, channel: ChannelId) {
        let _ = self.channel_failure(channel);
    }

    fn write(&mut self, channel: ChannelId, data: &[u8]) {
        let _ = Session::data(self, channel, Bytes::copy_from_slice(data));
    }

    fn exit_status(&mut self, channel: ChannelId, status: u32) {
        let _ = self.exit_status_request(channel, status);
    }

    fn eof(&mut self, channel: ChannelId) {
        let _ = Session::eof(self, channel);
    }

    fn close(&mut self, channel: ChannelId) {
        let _ = Session::close(self, channel);
    }

    fn writer(&self) -> Handle {
        self.handle()
    }
}
