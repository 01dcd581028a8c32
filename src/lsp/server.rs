use std::path::PathBuf;

use tower_lsp::{LspService, Server};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{LOG_ENV, log_path};
use crate::lsp::backend::Backend;

/// Install a file logger; stdout carries the protocol and stays untouched.
fn init_logging() -> anyhow::Result<WorkerGuard> {
    let path = log_path();
    let dir = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("invalid log path {:?}", path))?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))?;
    Ok(guard)
}

pub async fn run_server(rules_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let _guard = init_logging()?;
    info!("Starting k8s-lsp {}", env!("CARGO_PKG_VERSION"));

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend::new(client, rules_dir));
    Server::new(stdin, stdout, socket).serve(service).await;

    info!("k8s-lsp stopped");
    Ok(())
}
