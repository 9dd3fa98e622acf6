mod config;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use forum_api::auth::{AppState, AppStateInner};
use forum_api::routes;
use forum_api::{CredentialStore, SessionManager};
use forum_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum_server=debug,forum_api=debug,forum_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database; this handle is the only way any component reaches the store
    let db = Arc::new(Database::open(&config.db_path)?);

    let sessions = SessionManager::with_ttl(db.clone(), config.session_ttl);
    match sessions.purge_expired(chrono::Utc::now()) {
        Ok(0) => {}
        Ok(n) => info!("Purged {} expired sessions", n),
        Err(e) => warn!("Expired session purge failed: {}", e),
    }

    let app_state: AppState = Arc::new(AppStateInner::new(
        db.clone(),
        CredentialStore::new(db),
        sessions,
        config.cookies,
    ));

    let app = routes::router(app_state).layer(TraceLayer::new_for_http());

    info!(
        "Forum server listening on {} (sessions last {}h)",
        config.addr, config.session_ttl.num_hours()
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
