mod interceptor;
mod parser;
mod types;
mod validator;

pub use interceptor::{Phase, ScpInterceptor, TransferFrame, TransferRoot, MAX_HEADER_LENGTH};
pub use parser::ScpParser;
pub use types::*;
pub use validator::{validate_command, SCP_COMMAND};
