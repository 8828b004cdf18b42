use std::sync::Arc;

use tracing::error;

use agora_db::Database;
use agora_gateway::dispatcher::Dispatcher;

use crate::notifications::{LocalizedMailChannel, MailTransport};
use crate::registry::RequestRegistry;

pub type AppState = Arc<AppStateInner>;

pub type Mailer = LocalizedMailChannel<Arc<dyn MailTransport>>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub registry: RequestRegistry,
    pub mailer: Mailer,
}

impl AppStateInner {
    /// State with every standard request registered.
    pub fn new(db: Database, jwt_secret: String, dispatcher: Dispatcher, mailer: Mailer) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            dispatcher,
            registry: RequestRegistry::standard(),
            mailer,
        })
    }
}

/// Runs synchronous database work off the async runtime.
pub async fn run_blocking<F, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<anyhow::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        E::from(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}
