use std::io;
use std::process::Stdio;

use bytes::Bytes;
use russh::ChannelId;
use scpgate_common::TransferError;
use scpgate_core::Services;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::*;

use super::channel_writer::ChannelWriter;
use crate::common::ServerChannelId;
use crate::scp::{
    CompletedTransfer, ScpInterceptor, ScpInvocation, TransferDirection, TransferRoot,
};

const READ_BUFFER_SIZE: usize = 32 * 1024;
const STDERR_EXTENDED_DATA: u32 = 1;

/// One validated `scp` run bound to a channel.
pub struct ScpExecution<W: ChannelWriter> {
    pub channel: ServerChannelId,
    pub writer: W,
    pub invocation: ScpInvocation,
    pub max_upload_size: u64,
    pub input: mpsc::UnboundedReceiver<Bytes>,
    pub services: Services,
}

impl<W: ChannelWriter> ScpExecution<W> {
    pub async fn run(mut self) {
        let channel = self.channel.0;

        let (events, mut events_rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(async move {
            let mut uploads = vec![];
            while let Some(event) = events_rx.recv().await {
                uploads.push(event);
            }
            uploads
        });

        let exit_status = match self.transfer(events).await {
            Ok(exit_status) => exit_status,
            Err(error) => {
                error!(%error, "scp failed");
                1
            }
        };
        info!(
            event_type = "file_transfer",
            status = "finished",
            channel = %self.channel,
            exit_status,
            "scp exited"
        );

        self.writer.exit_status(channel, exit_status).await;
        self.writer.eof(channel).await;
        self.writer.close(channel).await;

        let uploads = match collector.await {
            Ok(uploads) => uploads,
            Err(error) => {
                error!(%error, "Upload collector failed");
                return;
            }
        };
        self.run_hooks(uploads).await;
    }

    async fn transfer(
        &mut self,
        events: mpsc::UnboundedSender<CompletedTransfer>,
    ) -> Result<u32, TransferError> {
        let program = &self.services.config.store.scp_path;
        let mut child = Command::new(program)
            .args(&self.invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransferError::Spawn {
                program: program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(TransferError::Spawn {
                program: program.clone(),
                source: io::Error::other("stdio was not captured"),
            });
        };

        let direction = self.invocation.direction;
        let root = TransferRoot::resolve(direction, &self.invocation.target).await;

        // Only the upload stream is rewritten, everything else is tracked for the log
        let mut input_interceptor = match direction {
            TransferDirection::Upload => {
                ScpInterceptor::new(TransferDirection::Upload, "stdin", root.clone())
                    .with_size_limit(self.max_upload_size)
                    .with_events(events)
            }
            TransferDirection::Download => {
                ScpInterceptor::new(TransferDirection::Download, "stdin", root.clone())
            }
        };

        let stdout_task = tokio::spawn(
            pump_output(
                self.writer.clone(),
                self.channel.0,
                stdout,
                ScpInterceptor::new(TransferDirection::Download, "stdout", root.clone()),
                None,
            )
            .in_current_span(),
        );
        let stderr_task = tokio::spawn(
            pump_output(
                self.writer.clone(),
                self.channel.0,
                stderr,
                ScpInterceptor::new(TransferDirection::Download, "stderr", root),
                Some(STDERR_EXTENDED_DATA),
            )
            .in_current_span(),
        );

        let mut stdin = Some(stdin);
        let status = loop {
            tokio::select! {
                data = self.input.recv(), if stdin.is_some() => match data {
                    Some(data) => {
                        let data = input_interceptor.process(&data);
                        if let Some(ref mut pipe) = stdin {
                            if let Err(error) = pipe.write_all(&data).await {
                                debug!(%error, "scp stopped reading its input");
                                stdin = None;
                            }
                        }
                    }
                    None => {
                        debug!("Peer closed its input");
                        stdin = None;
                    }
                },
                status = child.wait() => break status.map_err(TransferError::Wait)?,
            }
        };
        drop(input_interceptor);

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        Ok(status.code().map(|code| code as u32).unwrap_or(1))
    }

    async fn run_hooks(&self, uploads: Vec<CompletedTransfer>) {
        let Some(ref hooks) = self.services.hooks else {
            return;
        };
        for upload in uploads {
            debug!(path = ?upload.path, suppressed = upload.suppressed, "Running hook for upload");
            if let Err(error) = hooks.run(&upload.path).await {
                warn!(%error, path = ?upload.path, "Post-upload hook failed");
            }
        }
    }
}

/// Forwards one subprocess stream to the channel. Once the channel is gone
/// the stream is still read to the end so the subprocess never blocks.
async fn pump_output<W, R>(
    writer: W,
    channel: ChannelId,
    mut reader: R,
    mut interceptor: ScpInterceptor,
    extended: Option<u32>,
) where
    W: ChannelWriter,
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0; READ_BUFFER_SIZE];
    let mut channel_open = true;
    loop {
        let n = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(error) => {
                warn!(%error, "Failed to read scp output");
                break;
            }
        };

        let data = interceptor.process(&buffer[..n]);
        if !channel_open || data.is_empty() {
            continue;
        }

        let result = match extended {
            Some(code) => writer.extended_data(channel, code, data).await,
            None => writer.data(channel, data).await,
        };
        if result.is_err() {
            debug!("Channel closed, discarding further output");
            channel_open = false;
        }
    }
}
