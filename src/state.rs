use std::sync::Arc;

use crate::activation::flash::FlashStore;
use crate::activation::session::SessionSealer;
use crate::activation::Activation;
use crate::config::Config;
use crate::db::Store;
use crate::directory::Directory;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub directory: Arc<dyn Directory>,
    pub mailer: Arc<dyn Mailer>,
    pub sealer: Arc<SessionSealer>,
    pub flashes: Arc<FlashStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        directory: Arc<dyn Directory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let sealer = SessionSealer::new(&config.session_key, config.activation_ttl_secs);
        Self {
            store,
            directory,
            mailer,
            sealer: Arc::new(sealer),
            flashes: Arc::new(FlashStore::default()),
            config: Arc::new(config),
        }
    }

    pub fn activation(&self) -> Activation<'_> {
        Activation {
            store: self.store.as_ref(),
            directory: self.directory.as_ref(),
            mailer: self.mailer.as_ref(),
            flashes: &self.flashes,
            login_redirect: &self.config.site.login_redirect,
        }
    }

    /// Cookies carry `Secure` unless running in development mode.
    pub fn secure_cookies(&self) -> bool {
        !self.config.dev_mode
    }
}
