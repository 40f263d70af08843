use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use russh::server::Auth;
use scpgate_common::{Permission, Secret};
use scpgate_core::{AuthCredential, AuthResult, Services};
use tokio::sync::mpsc;
use tracing::*;
use uuid::Uuid;

use super::channel_writer::RequestReplies;
use super::exec::ScpExecution;
use crate::common::ServerChannelId;
use crate::scp::validate_command;

const UNSUPPORTED_REQUEST: &[u8] = b"Unsupported request type\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Authenticated,
    ChannelOpen,
    Executing,
    Closed,
}

enum ChannelState {
    Open,
    /// `input` feeds the running `scp`; taken on EOF.
    Executing {
        input: Option<mpsc::UnboundedSender<Bytes>>,
    },
}

pub struct ServerSession {
    pub id: Uuid,
    remote_address: SocketAddr,
    services: Services,
    username: Option<String>,
    permission: Option<Permission>,
    state: ConnectionState,
    channels: HashMap<ServerChannelId, ChannelState>,
}

impl ServerSession {
    pub fn new(remote_address: SocketAddr, services: Services) -> Self {
        let id = Uuid::new_v4();
        let this = Self {
            id,
            remote_address,
            services,
            username: None,
            permission: None,
            state: ConnectionState::Connected,
            channels: HashMap::new(),
        };
        info!(parent: &this.make_logging_span(), "New connection");
        this
    }

    pub fn make_logging_span(&self) -> tracing::Span {
        let client_ip = self.remote_address.ip().to_string();
        match self.username {
            Some(ref username) => {
                info_span!("SCP", session=%self.id, session_username=%username, %client_ip)
            }
            None => info_span!("SCP", session=%self.id, %client_ip),
        }
    }

    pub async fn _auth_password(&mut self, username: String, password: Secret<String>) -> Auth {
        info!(%username, "Password auth");
        self.try_auth(username, AuthCredential::Password(password))
            .await
    }

    pub async fn _auth_publickey(
        &mut self,
        username: String,
        key: russh::keys::PublicKey,
    ) -> Auth {
        info!(%username, algorithm = %key.algorithm(), "Public key auth");
        self.try_auth(username, AuthCredential::PublicKey(key)).await
    }

    async fn try_auth(&mut self, username: String, credential: AuthCredential) -> Auth {
        match self
            .services
            .authenticator
            .authenticate(&username, &credential)
            .await
        {
            Ok(AuthResult::Accepted { permission }) => {
                self.username = Some(username);
                self.permission = Some(permission);
                self.state = ConnectionState::Authenticated;
                Auth::Accept
            }
            Ok(AuthResult::Rejected(_)) => Auth::reject(),
            Err(error) => {
                if error.is_fatal() {
                    self.services.report_fatal(error);
                } else {
                    error!(%error, "Failed to verify credentials");
                }
                Auth::Reject {
                    proceed_with_methods: None,
                    partial_success: false,
                }
            }
        }
    }

    pub async fn _channel_open_session(&mut self, channel: ServerChannelId) -> bool {
        if self.permission.is_none() {
            warn!(%channel, "Session channel requested before authentication");
            return false;
        }
        debug!(%channel, "Opening session channel");
        self.channels.insert(channel, ChannelState::Open);
        if self.state == ConnectionState::Authenticated {
            self.state = ConnectionState::ChannelOpen;
        }
        true
    }

    /// Logs and refuses a channel type or global request other than `session`.
    pub fn refuse(&self, kind: &str, detail: &str) -> bool {
        warn!(
            event_type = "access_control",
            status = "denied",
            request = kind,
            %detail,
            "Refused request"
        );
        false
    }

    pub async fn _channel_env_request(
        &mut self,
        channel: ServerChannelId,
        name: &str,
        value: &str,
        session: &mut impl RequestReplies,
    ) {
        debug!(%channel, %name, %value, "Environment");
        session.success(channel.0);
    }

    pub async fn _channel_exec_request(
        &mut self,
        channel: ServerChannelId,
        data: &[u8],
        session: &mut impl RequestReplies,
    ) {
        if !matches!(self.channels.get(&channel), Some(ChannelState::Open)) {
            return self.reject_request(channel, "exec", session);
        }
        let Some(ref permission) = self.permission else {
            return self.reject_request(channel, "exec", session);
        };

        let command = String::from_utf8_lossy(data);
        debug!(%channel, %command, "Requested exec");

        let invocation =
            match validate_command(&command, permission, &self.services.config.store.shared_dir) {
                Ok(invocation) => invocation,
                Err(reason) => {
                    info!(
                        event_type = "access_control",
                        status = "denied",
                        %channel,
                        %command,
                        remote_address = %self.remote_address,
                        %reason,
                        "Exec request rejected"
                    );
                    session.success(channel.0);
                    session.write(channel.0, format!("{reason}\r\n").as_bytes());
                    session.exit_status(channel.0, 1);
                    session.eof(channel.0);
                    session.close(channel.0);
                    self.channels.remove(&channel);
                    return;
                }
            };

        info!(
            event_type = "file_transfer",
            status = "started",
            %channel,
            direction = ?invocation.direction,
            recursive = invocation.recursive,
            target = %invocation.target,
            "Starting scp"
        );

        let (input, input_rx) = mpsc::unbounded_channel();
        self.channels.insert(
            channel,
            ChannelState::Executing {
                input: Some(input),
            },
        );
        self.state = ConnectionState::Executing;
        session.success(channel.0);

        let execution = ScpExecution {
            channel,
            writer: session.writer(),
            invocation,
            max_upload_size: permission.max_upload_size,
            input: input_rx,
            services: self.services.clone(),
        };
        tokio::spawn(execution.run().instrument(Span::current()));
    }

    /// Answers requests that make no sense for an scp-only channel.
    pub fn reject_request(
        &self,
        channel: ServerChannelId,
        request: &str,
        session: &mut impl RequestReplies,
    ) {
        warn!(
            event_type = "access_control",
            status = "denied",
            %channel,
            request,
            "Unsupported channel request"
        );
        if self.channels.contains_key(&channel) {
            session.write(channel.0, UNSUPPORTED_REQUEST);
        }
        session.failure(channel.0);
    }

    pub async fn _data(&mut self, channel: ServerChannelId, data: Bytes) {
        match self.channels.get(&channel) {
            Some(ChannelState::Executing {
                input: Some(ref input),
            }) => {
                let _ = input.send(data);
            }
            _ => {
                trace!(%channel, len = data.len(), "Dropping data for a channel without scp");
            }
        }
    }

    pub async fn _channel_eof(&mut self, channel: ServerChannelId) {
        debug!(%channel, "EOF");
        if let Some(ChannelState::Executing { ref mut input }) = self.channels.get_mut(&channel) {
            input.take();
        }
    }

    pub async fn _channel_close(&mut self, channel: ServerChannelId) {
        debug!(%channel, "Closing channel");
        self.channels.remove(&channel);
        if self.channels.is_empty() && self.state != ConnectionState::Connected {
            self.state = ConnectionState::Closed;
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        info!(parent: &self.make_logging_span(), state = ?self.state, "Closed connection");
    }
}
