mod config;
mod db;
mod doc;
mod frame;
mod routes;
mod services;
mod state;
mod store;
mod surface;

use std::sync::Arc;

use crate::store::{DocumentStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env();

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            tracing::info!(max_connections = config.db_max_connections, "postgres document store ready");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set — presentations are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = state::AppState::new(store, config.sync());

    let app = routes::app(state);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "slidedeck listening");
    axum::serve(listener, app).await.expect("server failed");
}
