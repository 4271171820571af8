//! depth-mirror entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depth_mirror::api::{create_router, AppState};
use depth_mirror::config::{parse_depth, Config, Instrument, DEFAULT_DEPTH, DEFAULT_SYMBOL};
use depth_mirror::engine::{DepthSynchronizer, MirrorRunner, RunnerSettings, SnapshotLoader, Throttle};
use depth_mirror::error::MirrorError;
use depth_mirror::feed::{BinanceRestClient, DepthStream};
use depth_mirror::metrics;
use depth_mirror::orderbook::SharedBook;
use depth_mirror::render::ConsoleReporter;
use depth_mirror::utils::shutdown_signal;

/// Mirror one Binance order book locally and print its top levels.
#[derive(Parser, Debug)]
#[command(name = "depth-mirror")]
#[command(version)]
struct Args {
    /// Trading symbol, e.g. BTCUSDT.
    #[arg(default_value = DEFAULT_SYMBOL, value_parser = Instrument::new)]
    symbol: Instrument,

    /// Levels per side to print.
    #[arg(default_value_t = DEFAULT_DEPTH, value_parser = parse_depth)]
    depth: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let config = Config::load().map_err(MirrorError::from)?;

    // Initialize logging; stdout is reserved for the book table
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.rust_log));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    config.validate().map_err(MirrorError::InvalidConfig)?;

    // Initialize metrics
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    metrics::init_metrics();
    spawn_metrics_upkeep(prometheus.clone());

    info!(
        symbol = %args.symbol,
        depth = args.depth,
        throttle_ms = config.throttle_interval_ms,
        "Starting depth mirror"
    );

    let book = SharedBook::new(args.symbol.symbol());

    if let Some(port) = config.status_port {
        start_status_server(port, AppState::new(book.clone()).with_metrics(prometheus)).await?;
    }

    let rest = Arc::new(BinanceRestClient::from_config(&config)?);
    let stream = DepthStream::from_config(&config);

    let sync = DepthSynchronizer::new(
        book,
        Throttle::new(config.throttle_interval()),
        config.update_buffer_size,
    );
    let mut runner = MirrorRunner::new(
        SnapshotLoader::new(rest),
        sync,
        RunnerSettings {
            symbol: args.symbol.symbol().to_string(),
            report_depth: args.depth,
            snapshot_depth: config.snapshot_depth(args.depth),
            retry: stream.reconnect_config().clone(),
        },
    );

    let mut subscription = stream.subscribe(&args.symbol.stream_symbol())?;
    let mut reporter = ConsoleReporter::new(args.depth);

    tokio::select! {
        result = runner.run(subscription.events_mut(), &mut reporter) => {
            if let Err(e) = &result {
                error!(error = %e, "Depth mirror stopped");
            }
            result?;
        }
        _ = shutdown_signal() => {
            info!("Shutting down");
        }
    }

    Ok(())
}

/// Binds the status API and serves it in the background.
async fn start_status_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(state);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!(error = %e, "HTTP server failed");
        }
    });

    Ok(())
}

/// Drains histogram buckets so `/metrics` stays bounded.
fn spawn_metrics_upkeep(handle: PrometheusHandle) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            handle.run_upkeep();
        }
    });
}
