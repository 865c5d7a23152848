// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # BFTX Gateway Node
//!
//! Entry point for the `bftx-node` binary. Parses CLI arguments, initializes
//! logging and metrics, opens the ledger, and serves the query/mutation
//! surface over HTTP.
//!
//! The binary supports four subcommands:
//!
//! - `run`     - start the gateway
//! - `init`    - initialize the data directory and generate keys
//! - `schema`  - print the operation schema in SDL form
//! - `version` - print build version information

mod api;
mod cli;
mod context;
mod decode;
mod dispatch;
mod executor;
mod logging;
mod metrics;
mod schema;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use bftx_protocol::broadcast::LocalBroadcaster;
use bftx_protocol::keystore::LedgerKeys;
use bftx_protocol::Ledger;

use cli::{BftxNodeCli, Commands};
use logging::LogFormat;
use metrics::GatewayMetrics;
use schema::Schema;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BftxNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Schema => print_schema(),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the gateway: ledger, API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_DIRECTIVES,
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting bftx-node"
    );

    // --- Schema ---
    let schema = Arc::new(Schema::build().context("operation schema is inconsistent")?);
    tracing::info!(
        queries = schema.operations(schema::Category::Query).len(),
        mutations = schema.operations(schema::Category::Mutation).len(),
        "schema built"
    );

    // --- Keys ---
    let keys = match LedgerKeys::load(&args.data_dir)
        .with_context(|| format!("failed to read keys from {}", args.data_dir.display()))?
    {
        Some(keys) => keys,
        None => {
            tracing::warn!(
                data_dir = %args.data_dir.display(),
                "no key files found, using ephemeral keys; run `bftx-node init` to persist them"
            );
            LedgerKeys::generate()
        }
    };

    // --- Ledger ---
    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;
    let broadcaster = Arc::new(LocalBroadcaster::new());
    let mut published = broadcaster.subscribe();
    let ledger = Ledger::open(&args.data_dir, keys, broadcaster.clone())
        .with_context(|| format!("failed to open ledger in {}", args.data_dir.display()))?;
    tracing::info!(signer = %ledger.signer(), "ledger ready");

    // --- Metrics ---
    let gateway_metrics =
        Arc::new(GatewayMetrics::new().context("failed to register gateway metrics")?);

    // --- API server ---
    let app_state = api::AppState::new(
        Arc::clone(&schema),
        Arc::new(ledger),
        Arc::clone(&gateway_metrics),
    );
    tracing::debug!(
        schema_refs = Arc::strong_count(app_state.executor.schema()),
        "executor bound to shared schema"
    );
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&gateway_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Broadcast log ---
    let broadcast_log = tokio::spawn(async move {
        loop {
            match published.recv().await {
                Ok(message) => tracing::info!(
                    id = %message.transaction.id,
                    block_height = message.block_height,
                    app_hash = %message.app_hash,
                    "transaction broadcast"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "broadcast log lagging")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // --- Serve ---
    serve(
        api_listener,
        api_router,
        metrics_listener,
        metrics_router,
        shutdown_signal(),
    )
    .await;

    broadcast_log.abort();
    tracing::info!("bftx-node stopped");
    Ok(())
}

/// Runs both servers until `shutdown` resolves. The API server drains its
/// in-flight requests first; the metrics server is stopped after it.
async fn serve<F>(
    api_listener: TcpListener,
    api_router: Router,
    metrics_listener: TcpListener,
    metrics_router: Router,
    shutdown: F,
) where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_metrics, mut metrics_stop) = tokio::sync::watch::channel(false);
    let metrics_server = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_router)
            .with_graceful_shutdown(async move {
                let _ = metrics_stop.changed().await;
            })
            .await
    });

    if let Err(e) = axum::serve(api_listener, api_router)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("API server error: {}", e);
    }
    tracing::info!("API server drained");

    stop_metrics.send_replace(true);
    match metrics_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Metrics server error: {}", e),
        Err(e) => tracing::error!("Metrics server task failed: {}", e),
    }
}

/// Initializes a data directory and generates the signer and cipher keys.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("bftx_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    let keys = LedgerKeys::generate();
    keys.save(data_dir)
        .with_context(|| format!("failed to write keys to {}", data_dir.display()))?;
    let public_key = keys.signer.public_key().to_hex();

    tracing::info!(public_key = %public_key, "ledger keys generated");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!(
        "  Signer key     : {}",
        data_dir.join(bftx_protocol::config::SIGNER_KEY_FILE).display()
    );
    println!(
        "  Cipher key     : {}",
        data_dir.join(bftx_protocol::config::CIPHER_KEY_FILE).display()
    );
    println!("  Public key     : {}", public_key);

    Ok(())
}

/// Prints the operation schema in SDL form.
fn print_schema() -> Result<()> {
    let schema = Schema::build().context("operation schema is inconsistent")?;
    print!("{}", schema.to_sdl());
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("bftx-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", bftx_protocol::config::PROTOCOL_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// Handed to [`serve`] as its shutdown trigger.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the error is logged and that signal is never awaited.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}
