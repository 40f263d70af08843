mod common;
mod keys;
pub mod scp;
mod server;

use std::fmt::Debug;
use std::net::SocketAddr;

use anyhow::Result;
pub use common::*;
pub use keys::*;
use scpgate_core::Services;
pub use server::run_server;

pub static PROTOCOL_NAME: &str = "SCP";

#[derive(Clone)]
pub struct SCPProtocolServer {
    services: Services,
}

impl SCPProtocolServer {
    pub fn new(services: &Services) -> Result<Self> {
        generate_host_keys(&services.config)?;
        Ok(SCPProtocolServer {
            services: services.clone(),
        })
    }

    pub async fn run(self, address: SocketAddr) -> Result<()> {
        run_server(self.services, address).await
    }
}

impl Debug for SCPProtocolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SCPProtocolServer")
    }
}
