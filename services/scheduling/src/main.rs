use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, init_pool, run_migrations},
};
use scheduling::{
    AppState, SessionService,
    clock::SystemClock,
    config::SchedulingConfig,
    middleware::{JwtConfig, JwtVerifier},
    notify::{Notifier, TracingNotifier, WebhookNotifier},
    policy::BookingRules,
    repositories::{PgDirectory, PgSessionStore},
    routes,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting scheduling service");

    let config = SchedulingConfig::from_env()?;
    let jwt_config = JwtConfig::from_env().map_err(anyhow::Error::msg)?;
    let verifier = JwtVerifier::new(&jwt_config)?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool, &MIGRATOR).await?;

    let cache = match RedisConfig::from_env() {
        Some(redis_config) => Some(RedisPool::new(&redis_config)?),
        None => {
            info!("REDIS_URL not set, booked slots are served from the database");
            None
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notification_webhook_url {
        Some(url) => {
            info!("Delivering session notifications to {}", url);
            Arc::new(WebhookNotifier::new(url.clone(), config.retry_policy().timeout)?)
        }
        None => {
            warn!("No notification webhook configured, session events are only logged");
            Arc::new(TracingNotifier)
        }
    };

    let sessions = SessionService::new(
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::new(PgDirectory::new(pool.clone())),
        Arc::new(SystemClock),
        BookingRules::from(&config),
        config.retry_policy(),
    )
    .with_cache(cache, config.booked_slots_ttl())
    .with_notifier(notifier);

    let app_state = AppState {
        sessions: Arc::new(sessions),
        verifier,
        db_pool: Some(pool),
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Scheduling service listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
