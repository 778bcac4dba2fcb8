use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use procroute::auth::{AnonymousAuth, AuthProvider, JwtAuthProvider};
use procroute::database::{load_catalog, DatabaseManager, MySqlCaller};
use procroute::is_production;
use procroute::route::RouteCompiler;
use procroute::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = procroute::config::config();
    tracing::info!("Starting procroute in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::health_check(&pool).await?;
    let catalog = load_catalog(&pool, &config.routes.prefix).await?;

    let compiler = RouteCompiler::from_config(config).context("failed to build route compiler")?;
    let table = match compiler.compile_catalog(&catalog) {
        Ok(table) => table,
        Err(errors) => {
            for error in errors.iter() {
                tracing::error!("{}", error);
            }
            anyhow::bail!("{}", errors);
        }
    };

    let auth: Arc<dyn AuthProvider> = match &config.security.jwt_secret {
        Some(secret) => Arc::new(JwtAuthProvider::new(secret, config.security.jwt_audience.clone())?),
        None => {
            if is_production!() {
                tracing::warn!("JWT_SECRET is not set; every request is anonymous");
            }
            Arc::new(AnonymousAuth)
        }
    };

    let state = AppState::new(Arc::new(MySqlCaller::new(pool)), auth)
        .with_body_limit(config.server.body_limit_bytes);
    let app = server::app(table, state, config);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("procroute listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server")?;
    Ok(())
}
