use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use ev_readiness::auth::{IdentityProvider, StaticTokenIdentity};
use ev_readiness::config::ServerConfig;
use ev_readiness::error::Result;
use ev_readiness::reference::{ReferenceData, StaticReferenceData};
use ev_readiness::server::{AppContext, app_router};
use ev_readiness::store::{AssessmentStore, LibSqlBackend};

/// Stderr logging, plus a daily rolling file when a log directory is set.
/// The returned guard flushes the file writer and must outlive the server.
fn init_tracing(config: &ServerConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let Some(dir) = &config.log_dir else {
        tracing_subscriber::registry().with(stderr_layer).try_init()?;
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, "ev-readiness.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    Ok(Some(guard))
}

async fn open_store(config: &ServerConfig) -> Result<Arc<dyn AssessmentStore>> {
    let backend = LibSqlBackend::new_local(&config.db_path).await?;
    eprintln!("   Database: {}", config.db_path.display());
    Ok(Arc::new(backend))
}

fn load_reference(config: &ServerConfig) -> Result<Arc<dyn ReferenceData>> {
    let data = match &config.reference_data {
        Some(path) => {
            eprintln!("   Reference data: {}", path.display());
            StaticReferenceData::from_file(path)?
        }
        None => {
            eprintln!("   Reference data: built-in");
            StaticReferenceData::builtin()
        }
    };
    Ok(Arc::new(data))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env().context("reading EV_* configuration")?;
    let _log_guard = init_tracing(&config)?;

    eprintln!("EV Readiness v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listen: http://{}", config.bind_addr);

    let store = open_store(&config)
        .await
        .with_context(|| format!("opening database at {}", config.db_path.display()))?;
    let reference = load_reference(&config).context("loading reference data")?;

    // ── Admin identity ───────────────────────────────────────────────────
    let token_count = config.admin_tokens.len();
    let tokens = StaticTokenIdentity::new(std::mem::take(&mut config.admin_tokens));
    if tokens.is_empty() {
        eprintln!("   Admin API: closed (EV_ADMIN_TOKENS not set)");
    } else {
        eprintln!("   Admin API: {token_count} token(s)");
    }
    let identity: Arc<dyn IdentityProvider> = Arc::new(tokens);

    let app = app_router(AppContext {
        store,
        identity,
        reference,
        reports: config.reports,
        enforce_finish_validation: config.enforce_finish_validation,
        cors_origins: config.cors_origins.take(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
