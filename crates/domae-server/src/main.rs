mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(domae_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = domae_db::PoolConfig::from_app_config(&config);
    let pool = domae_db::connect_pool(&pool_config).await?;
    domae_db::run_migrations(&pool).await?;

    let table = domae_core::load_category_table(&config.category_table_path)?;
    let mapper = Arc::new(domae_core::CategoryMapper::new(table));
    let cache = Arc::new(domae_sync::CacheLayer::new());

    let scheduler = Arc::new(
        domae_sync::CollectionScheduler::new(pool.clone(), Arc::clone(&config), mapper, cache)
            .await?,
    );
    scheduler.start().await?;

    let auth = AuthState::from_env(matches!(config.env, domae_core::Environment::Development))?;
    let app = build_app(
        AppState {
            pool,
            scheduler: Arc::clone(&scheduler),
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
