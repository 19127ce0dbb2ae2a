use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;

use booking_buddy::channels::{ServiceStatus, sms_routes};
use booking_buddy::config::{ServiceConfig, StoreLocation};
use booking_buddy::llm::create_provider;
use booking_buddy::pipeline::IntakePipeline;
use booking_buddy::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    eprintln!("📱 BookingBuddy v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   LLM: {} ({})",
        config.llm.backend.as_str(),
        if config.llm.api_key.is_some() {
            config.llm.model.as_str()
        } else {
            "no API key, fallback replies only"
        }
    );
    eprintln!("   Business: {}", config.pipeline.business);

    let llm = create_provider(&config.llm).context("Failed to create LLM provider")?;

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = match &config.store {
        StoreLocation::Local(path) => {
            let backend = LibSqlBackend::new_local(path)
                .await
                .with_context(|| format!("Failed to open database at {}", path.display()))?;
            eprintln!("   Database: {}", path.display());
            Arc::new(backend)
        }
        StoreLocation::Remote { url, auth_token } => {
            let backend = LibSqlBackend::new_remote(url, auth_token.expose_secret())
                .await
                .with_context(|| format!("Failed to connect to database at {url}"))?;
            eprintln!("   Database: {url}");
            Arc::new(backend)
        }
    };

    let status = ServiceStatus::from_config(&config);
    let pipeline = Arc::new(IntakePipeline::new(llm, db, config.pipeline.clone()));
    let app = sms_routes(pipeline, status);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    eprintln!("   SMS webhook: http://{addr}/sms");
    eprintln!("   Health: http://{addr}/health\n");
    tracing::info!(%addr, "SMS server started");

    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}
