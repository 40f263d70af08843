mod listen_endpoint;
mod secret;

pub use listen_endpoint::ListenEndpoint;
pub use secret::Secret;
