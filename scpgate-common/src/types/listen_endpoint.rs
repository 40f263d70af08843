use std::fmt::{Debug, Display};
use std::net::{SocketAddr, ToSocketAddrs};
use std::ops::Deref;

use serde::Deserialize;

#[derive(Clone, PartialEq, Eq)]
pub struct ListenEndpoint(pub SocketAddr);

impl ListenEndpoint {
    /// Accepts `host:port` as well as the bare `:port` form, which binds
    /// every IPv4 interface.
    pub fn resolve(value: &str) -> Result<Self, String> {
        let value = match value.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => value.to_owned(),
        };
        value
            .to_socket_addrs()
            .map_err(|e| format!("failed to resolve {value} into a TCP endpoint: {e:?}"))?
            .next()
            .map(Self)
            .ok_or_else(|| format!("failed to resolve {value} into a TCP endpoint"))
    }
}

impl Deref for ListenEndpoint {
    type Target = SocketAddr;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ListenEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v: String = Deserialize::deserialize::<D>(deserializer)?;
        Self::resolve(&v).map_err(serde::de::Error::custom)
    }
}

impl Debug for ListenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for ListenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}
