use std::sync::Arc;

use scpgate_common::{ScpgateConfig, ScpgateError};
use tokio::sync::mpsc;
use tracing::*;

use crate::{Authenticator, HookRunner};

#[derive(Clone)]
pub struct Services {
    pub config: Arc<ScpgateConfig>,
    pub authenticator: Arc<Authenticator>,
    pub hooks: Option<Arc<HookRunner>>,
    fatal_errors: mpsc::UnboundedSender<ScpgateError>,
}

impl Services {
    /// The receiver yields errors after which the process has to stop.
    pub fn new(config: ScpgateConfig) -> (Self, mpsc::UnboundedReceiver<ScpgateError>) {
        let (fatal_errors, fatal_errors_rx) = mpsc::unbounded_channel();

        let authenticator = Arc::new(Authenticator::new(&config));
        let hooks = HookRunner::new(config.store.hook.clone()).map(Arc::new);

        if hooks.is_none() {
            debug!("No post-upload hook configured");
        }

        (
            Services {
                config: Arc::new(config),
                authenticator,
                hooks,
                fatal_errors,
            },
            fatal_errors_rx,
        )
    }

    pub fn report_fatal(&self, error: ScpgateError) {
        error!(%error, "Fatal error");
        let _ = self.fatal_errors.send(error);
    }
}
