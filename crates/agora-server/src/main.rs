mod config;

use std::sync::Arc;

use tracing::info;

use agora_api::notifications::{LocalizedMailChannel, LogTransport, MailTransport, supported_locale};
use agora_api::routes::router;
use agora_api::state::AppStateInner;
use agora_db::Database;
use agora_gateway::dispatcher::Dispatcher;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,agora_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr()?;

    let db = Database::open(&config.db_path)?;
    info!("Database ready at {}", config.db_path.display());

    let transport: Arc<dyn MailTransport> = Arc::new(LogTransport);
    let mailer = LocalizedMailChannel::new(transport, supported_locale(&config.locale));

    let state = AppStateInner::new(db, config.jwt_secret, Dispatcher::new(), mailer);
    let app = router(state);

    info!("Agora server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
