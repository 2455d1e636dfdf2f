use anyhow::Context;

use paper_notes::config::NotesConfig;
use paper_notes::http::{cors_layer, router};
use paper_notes::orchestrator::ProgressOrchestrator;
use paper_notes::pipeline::JobDriver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = NotesConfig::from_env(true)?;

    tokio::fs::create_dir_all(&config.uploads.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.uploads.upload_dir))?;

    let driver = JobDriver::from_config(ProgressOrchestrator::new(), &config)?;

    let app = router(driver, config.uploads.clone(), config.api_key_configured())
        .layer(cors_layer(&config.server));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    eprintln!("📝 Paper Notes v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Health:   http://{}/health", addr);
    eprintln!("   Progress: ws://{}/ws/{{session_id}}", addr);
    tracing::info!(addr = %addr, "Server started");

    axum::serve(listener, app).await?;
    Ok(())
}
