use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;

use careerwise::auth::JwtSessions;
use careerwise::cache::{CacheInvalidator, NoopInvalidator, RevalidateClient};
use careerwise::config::ServerConfig;
use careerwise::insights::{GeneratorConfig, LlmInsightGenerator};
use careerwise::llm::create_provider;
use careerwise::profile::{ProfileRouteState, ProfileService, profile_routes};
use careerwise::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;

    eprintln!("🧭 Careerwise v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   API: http://{}/api/profile", config.bind_addr);
    eprintln!("   Database: {}", config.db_path);
    match &config.revalidate_url {
        Some(url) => eprintln!("   Revalidation: {}", url),
        None => eprintln!("   Revalidation: disabled"),
    }
    eprintln!();

    // ── LLM provider ─────────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let generator = Arc::new(LlmInsightGenerator::new(llm, GeneratorConfig::default()));

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&config.db_path), config.txn_budget)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path))?,
    );

    // ── Cache invalidation ───────────────────────────────────────────────
    let cache: Arc<dyn CacheInvalidator> = match config.revalidate_url.clone() {
        Some(url) => Arc::new(RevalidateClient::new(url, config.revalidate_secret.clone())),
        None => Arc::new(NoopInvalidator),
    };

    // ── Service + routes ─────────────────────────────────────────────────
    let service = Arc::new(ProfileService::new(
        store,
        Arc::new(JwtSessions::new()),
        generator,
        cache,
        config.insight_refresh_days,
    ));

    let app = profile_routes(ProfileRouteState { service }).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Server started");
    axum::serve(listener, app).await?;

    Ok(())
}
