//! The key-custody worker daemon.
//!
//! Launched as a child process by the controller. stdout carries the
//! wire protocol, so all diagnostics go to stderr via `tracing`.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    // A crash must never write the DEK to disk.
    coffre_crypto_core::disable_core_dumps().context("disabling core dumps")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("building runtime")?;

    runtime.block_on(async {
        coffre_custody::serve(tokio::io::stdin(), tokio::io::stdout())
            .await
            .context("serving custody protocol")
    })
}
