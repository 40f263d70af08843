mod channel_writer;
mod exec;
mod russh_handler;
mod session;
#[cfg(test)]
mod test_support;

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use russh::{MethodKind, MethodSet, SshId};
use russh_handler::ServerHandler;
use scpgate_core::Services;
use session::ServerSession;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::*;

use crate::keys::load_host_keys;

pub async fn run_server(services: Services, address: SocketAddr) -> Result<()> {
    let russh_config = {
        let mut methods = MethodSet::empty();
        methods.push(MethodKind::PublicKey);
        methods.push(MethodKind::Password);

        russh::server::Config {
            auth_rejection_time: Duration::from_secs(1),
            auth_rejection_time_initial: Some(Duration::from_secs(0)),
            methods,
            keys: load_host_keys(&services.config).context("loading host keys")?,
            server_id: SshId::Standard(format!(
                "SSH-2.0-scpgate_{}",
                env!("CARGO_PKG_VERSION")
            ).into()),
            ..Default::default()
        }
    };
    let russh_config = Arc::new(russh_config);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding to {address}"))?;
    info!(?address, "Listening");

    loop {
        let (socket, remote_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "Failed to accept incoming connection");
                continue;
            }
        };
        let config = russh_config.clone();
        let session = ServerSession::new(remote_address, services.clone());
        let span = session.make_logging_span();
        let handler = ServerHandler { session };

        tokio::spawn(
            async move {
                if let Err(error) = _run_stream(config, socket, handler).await {
                    debug!(%error, "Session ended with an error");
                }
            }
            .instrument(span),
        );
    }
}

async fn _run_stream<R>(
    config: Arc<russh::server::Config>,
    socket: R,
    handler: ServerHandler,
) -> Result<()>
where
    R: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    russh::server::run_stream(config, socket, handler)
        .await?
        .await?;
    Ok(())
}
