mod config;
mod error;
pub mod helpers;
mod permission;
mod types;

pub use config::*;
pub use error::*;
pub use permission::*;
pub use types::*;
