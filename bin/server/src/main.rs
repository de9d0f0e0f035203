use chrono::Duration;
use coursegram_platform_access::TokenService;
use coursegram_server::{
    app,
    audit::AuditService,
    auth::{
        AppState,
        db::{PgExpertMemberStore, PgUserStore},
    },
    config::ServerConfig,
    db::PgAuditStore,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(mode = ?config.mode, "Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Assemble application state
    let users = Arc::new(PgUserStore::new(db_pool.clone()));
    let members = Arc::new(PgExpertMemberStore::new(db_pool.clone()));
    let audit = AuditService::new(
        Arc::new(PgAuditStore::new(db_pool.clone())),
        config.audit.strict,
    );
    let tokens = TokenService::new(
        &config.token.secret,
        Duration::minutes(config.token.ttl_minutes),
    );
    let state = Arc::new(AppState::new(
        users,
        members,
        audit,
        tokens,
        config.telegram.clone(),
        config.mode,
    ));

    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    tracing::info!("shutdown signal received");
}
