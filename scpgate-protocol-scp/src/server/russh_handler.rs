use bytes::Bytes;
use russh::keys::PublicKey;
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId, Pty, Sig};
use scpgate_common::Secret;
use tracing::*;

use super::session::ServerSession;
use crate::common::ServerChannelId;

pub struct ServerHandler {
    pub session: ServerSession,
}

impl russh::server::Handler for ServerHandler {
    type Error = anyhow::Error;

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let span = self.session.make_logging_span();
        Ok(self
            .session
            ._channel_open_session(ServerChannelId(channel.id()))
            .instrument(span)
            .await)
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        _channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let _span = self.session.make_logging_span().entered();
        Ok(self.session.refuse(
            "direct-tcpip",
            &format!("{host_to_connect}:{port_to_connect}"),
        ))
    }

    async fn channel_open_x11(
        &mut self,
        _channel: Channel<Msg>,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let _span = self.session.make_logging_span().entered();
        Ok(self.session.refuse(
            "x11",
            &format!("{originator_address}:{originator_port}"),
        ))
    }

    async fn tcpip_forward(
        &mut self,
        address: &str,
        port: &mut u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let _span = self.session.make_logging_span().entered();
        Ok(self.session.refuse("tcpip-forward", &format!("{address}:{port}")))
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let span = self.session.make_logging_span();
        Ok(self
            .session
            ._auth_password(user.to_owned(), Secret::new(password.to_owned()))
            .instrument(span)
            .await)
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        let span = self.session.make_logging_span();
        Ok(self
            .session
            ._auth_publickey(user.to_owned(), public_key.clone())
            .instrument(span)
            .await)
    }

    async fn env_request(
        &mut self,
        channel: ChannelId,
        variable_name: &str,
        variable_value: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let span = self.session.make_logging_span();
        self.session
            ._channel_env_request(
                ServerChannelId(channel),
                variable_name,
                variable_value,
                session,
            )
            .instrument(span)
            .await;
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let span = self.session.make_logging_span();
        self.session
            ._channel_exec_request(ServerChannelId(channel), data, session)
            .instrument(span)
            .await;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _span = self.session.make_logging_span().entered();
        self.session
            .reject_request(ServerChannelId(channel), "pty-req", session);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _span = self.session.make_logging_span().entered();
        self.session
            .reject_request(ServerChannelId(channel), "shell", session);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _span = self.session.make_logging_span().entered();
        debug!(subsystem = %name, "Subsystem requested");
        self.session
            .reject_request(ServerChannelId(channel), "subsystem", session);
        Ok(())
    }

    async fn x11_request(
        &mut self,
        channel: ChannelId,
        _single_connection: bool,
        _x11_auth_protocol: &str,
        _x11_auth_cookie: &str,
        _x11_screen_number: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _span = self.session.make_logging_span().entered();
        self.session
            .reject_request(ServerChannelId(channel), "x11-req", session);
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _span = self.session.make_logging_span().entered();
        self.session
            .reject_request(ServerChannelId(channel), "window-change", session);
        Ok(())
    }

    async fn signal(
        &mut self,
        channel: ChannelId,
        signal: Sig,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _span = self.session.make_logging_span().entered();
        debug!(?signal, "Signal received");
        self.session
            .reject_request(ServerChannelId(channel), "signal", session);
        Ok(())
    }

    // russh answers the returned flag with a request_failure of its own
    async fn agent_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let _span = self.session.make_logging_span().entered();
        self.session
            .reject_request(ServerChannelId(channel), "auth-agent-req", session);
        Ok(false)
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.session
            ._data(ServerChannelId(channel), Bytes::copy_from_slice(data))
            .await;
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let span = self.session.make_logging_span();
        self.session
            ._channel_eof(ServerChannelId(channel))
            .instrument(span)
            .await;
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let span = self.session.make_logging_span();
        self.session
            ._channel_close(ServerChannelId(channel))
            .instrument(span)
            .await;
        Ok(())
    }
}
