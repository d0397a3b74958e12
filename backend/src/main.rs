use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod db;
mod error;
mod graphql;
mod middleware;
mod routes;
mod state;
mod store;

#[cfg(test)]
mod business_logic_tests;
#[cfg(test)]
mod test_support;

use commands::notify::{bot_from_config, mailer_from_config, notifier_from_config};
use config::{AppConfig, StoreBackend};
use state::AppState;
use store::{DocumentStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dairy backend...");

    let config = AppConfig::from_env();

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("STORE_BACKEND=memory, records are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => match db::init_pool(&config.database_url).await {
            Ok(pool) => {
                if let Err(e) = db::init_database(&pool).await {
                    tracing::error!("Failed to run migrations: {}", e);
                    return;
                }
                tracing::info!("Database connection established");
                Arc::new(PgStore::new(pool))
            }
            Err(e) => {
                tracing::error!("Failed to connect to database: {}", e);
                return;
            }
        },
    };

    let notifier = Arc::from(notifier_from_config(&config));
    let mailer = Arc::from(mailer_from_config(&config));
    let bot = Arc::from(bot_from_config(&config));
    let port = config.port;
    let app_state = AppState::new(config, store, notifier, mailer, bot);

    if let Err(e) = commands::user::ensure_admin(app_state.store.as_ref(), &app_state.config).await {
        tracing::error!("Failed to seed admin account: {}", e);
    }

    let jobs = commands::schedule::spawn(app_state.clone());

    let app = routes::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    for job in jobs {
        job.abort();
    }
    tracing::info!("shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(_) => ctrl_c.await,
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
