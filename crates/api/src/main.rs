mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod repos;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;

use std::net::SocketAddr;

use anyhow::Result;
use axum::{Router, http};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    repos::{
        PgBanRepo, PgCommentRepo, PgPostRepo, PgRateLimitRepo, PgStatusRepo, PgUserRepo, PgXpRepo,
        Repos,
    },
    state::AppState,
    stores::{RedisCommentGapStore, RedisElevationStore, RedisSessionStore, Stores},
};

#[derive(Parser)]
#[command(name = "api")]
#[command(about = "Quill API server")]
struct Args {
    /// Run database migrations and exit
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = envy::prefixed("QUILL_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let database = PgPoolOptions::new()
        .max_connections(25)
        .connect(&config.database_url)
        .await?;

    // Run migrations via init container only (--migrate flag)
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&database).await?;
        tracing::info!("Migrations complete");
        return Ok(());
    }

    let redis = redis::Client::open(config.redis_url.as_str())?;

    // Build repositories
    let repos = Repos {
        users: std::sync::Arc::new(PgUserRepo::new(database.clone())),
        posts: std::sync::Arc::new(PgPostRepo::new(database.clone())),
        comments: std::sync::Arc::new(PgCommentRepo::new(database.clone())),
        bans: std::sync::Arc::new(PgBanRepo::new(database.clone())),
        xp: std::sync::Arc::new(PgXpRepo::new(
            database.clone(),
            config.daily_xp_cap,
            config.daily_post_cap,
        )),
        rate_limit: std::sync::Arc::new(PgRateLimitRepo::new(
            database.clone(),
            config.guest_daily_comment_cap,
            config.comment_min_gap_seconds,
        )),
        status: std::sync::Arc::new(PgStatusRepo::new(database)),
    };

    // Build stores
    let stores = Stores {
        sessions: std::sync::Arc::new(RedisSessionStore::new(
            redis.clone(),
            config.session_ttl_hours,
        )),
        elevation: std::sync::Arc::new(RedisElevationStore::new(
            redis.clone(),
            config.op_code.clone(),
            config.elevation_ttl_minutes,
        )),
        comment_gap: std::sync::Arc::new(RedisCommentGapStore::new(
            redis,
            config.comment_min_gap_seconds,
        )),
    };

    let state = AppState {
        config: config.clone(),
        repos,
        stores,
    };

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let app = Router::new()
        .nest("/health", handlers::health::router())
        .nest("/auth", handlers::auth::router())
        .nest("/posts", handlers::posts::router())
        .nest("/posts", handlers::comments::router())
        .nest("/admin", handlers::admin::router())
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    // Peer addresses back the guest identity when no proxy header is set.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
