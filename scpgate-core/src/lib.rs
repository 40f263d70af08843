mod auth;
mod hooks;
mod services;

pub use auth::*;
pub use hooks::HookRunner;
pub use services::Services;
