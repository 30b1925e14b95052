mod admin;
mod auth;
mod backend;
mod config;
mod dashboard;
mod db;
mod display;
mod errors;
mod join;
mod leaderboard;
mod models;
mod notify;
mod routes;
mod state;
mod upload;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::admin::AdminPanel;
use crate::auth::AuthContext;
use crate::backend::mailer::{LogMailer, Mailer, SmtpMailer};
use crate::backend::{PgBackend, S3BlobStore};
use crate::config::Config;
use crate::db::create_pool;
use crate::notify::Notifier;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Review API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize mail delivery for sign-in codes
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!("SMTP mailer configured via {}", smtp.server);
            Arc::new(SmtpMailer::new(
                &smtp.server,
                &smtp.user,
                &smtp.pass,
                &config.from_email,
            )?)
        }
        None => {
            info!("SMTP not configured; sign-in codes will be logged");
            Arc::new(LogMailer)
        }
    };

    let backend = Arc::new(PgBackend::new(
        db,
        mailer,
        config.public_url.clone(),
        chrono::Duration::hours(config.session_ttl_hours),
    ));
    let blobs = Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone()));
    let notifier = Notifier::new();

    let auth = AuthContext::start(
        backend.clone(),
        backend.clone(),
        notifier.clone(),
        config.sign_in_redirect(),
    )
    .await?;

    // Build app state
    let state = AppState {
        store: backend.clone(),
        blobs: blobs.clone(),
        auth: Arc::new(auth),
        admin: AdminPanel::new(backend, blobs, notifier.clone()),
        notifier,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to PUBLIC_URL in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "review-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // Path-style addressing for MinIO
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
