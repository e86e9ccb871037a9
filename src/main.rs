//! MEXC depth replica entry point.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mexc_depth_feed::api::{create_router, AppState};
use mexc_depth_feed::config::{Config, MAX_DISPLAY_DEPTH};
use mexc_depth_feed::feed::{FeedSession, SessionManager, SnapshotLoader};
use mexc_depth_feed::market::{build_http_client, lookup_symbol, normalize_symbol, SymbolDirectory, SymbolLookup, MAX_CANDIDATES};
use mexc_depth_feed::metrics;
use mexc_depth_feed::orderbook::BookReplica;
use mexc_depth_feed::render::format_orderbook;
use mexc_depth_feed::utils::shutdown_signal;

/// Local order book replica for MEXC spot depth streams.
#[derive(Parser, Debug)]
#[command(name = "mexc-depth")]
#[command(about = "Keeps a live local replica of MEXC spot order books")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream one symbol and print the book until Ctrl-C.
    Watch {
        /// Symbol, e.g. BTCUSDT or btc/usdt.
        symbol: String,

        /// Rows per side.
        #[arg(short, long)]
        depth: Option<usize>,

        /// Seconds between refreshes.
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run sessions for WATCH_SYMBOLS behind the HTTP API.
    Serve {
        /// HTTP server port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List default symbols, or resolve a query against them.
    Symbols {
        /// Partial symbol to look up.
        query: Option<String>,
    },

    /// Fetch one REST snapshot and print it.
    Snapshot {
        /// Symbol, e.g. BTCUSDT or btc/usdt.
        symbol: String,

        /// Rows per side.
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("mexc_depth_feed=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    match args.command {
        Command::Watch { symbol, depth, interval } => cmd_watch(&symbol, depth, interval).await,
        Command::Serve { port } => cmd_serve(port).await,
        Command::Symbols { query } => cmd_symbols(query.as_deref()).await,
        Command::Snapshot { symbol, depth } => cmd_snapshot(&symbol, depth).await,
        Command::CheckConfig => cmd_check_config(),
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().context("Configuration load failed")?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}

fn display_depth(requested: Option<usize>, config: &Config) -> anyhow::Result<usize> {
    let depth = requested.unwrap_or(config.display_depth);
    if !(1..=MAX_DISPLAY_DEPTH).contains(&depth) {
        anyhow::bail!("depth must be between 1 and {MAX_DISPLAY_DEPTH}, got {depth}");
    }
    Ok(depth)
}

/// Stream one symbol to stdout.
async fn cmd_watch(symbol: &str, depth: Option<usize>, interval: Option<u64>) -> anyhow::Result<()> {
    let config = load_config()?;
    let depth = display_depth(depth, &config)?;
    let interval = interval.unwrap_or(config.refresh_interval_s).max(1);

    metrics::init_metrics();
    let feed = config.feed();
    let http = build_http_client(&feed)?;
    let mut session = FeedSession::new(symbol, feed, http);
    let reader = session.reader();
    session.start(None)?;
    info!(symbol = %session.symbol(), depth, interval_s = interval, "Watching order book");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let view = reader.latest();
                let now = chrono::Local::now().time();
                println!("{}\n", format_orderbook(view.as_deref(), depth, now));
            }
        }
    }

    session.stop().await?;
    Ok(())
}

/// Run sessions behind the HTTP API.
async fn cmd_serve(port: Option<u16>) -> anyhow::Result<()> {
    let config = load_config()?;
    let port = port.unwrap_or(config.port);

    let handle = metrics::install_prometheus().context("Failed to install metrics recorder")?;
    let feed = config.feed();
    let http = build_http_client(&feed)?;

    let mut manager = SessionManager::new(feed, http);
    for symbol in &config.watch_symbols {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            continue;
        }
        if let Err(e) = manager.start(key.clone(), &key, None) {
            warn!(symbol = %key, error = %e, "Skipping symbol");
        }
    }
    info!(sessions = manager.len(), "Sessions started");

    let state = AppState::new(manager, Some(handle), config.display_depth);
    let router = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.sessions.lock().await.shutdown().await;
    info!("All sessions stopped");
    Ok(())
}

/// List or look up default symbols.
async fn cmd_symbols(query: Option<&str>) -> anyhow::Result<()> {
    let config = load_config()?;
    let feed = config.feed();
    let directory = SymbolDirectory::new(build_http_client(&feed)?, &feed.rest_url);
    let symbols = directory.default_symbols().await?;

    let Some(query) = query else {
        println!("{} symbols", symbols.len());
        for symbol in &symbols {
            println!("{symbol}");
        }
        return Ok(());
    };

    match lookup_symbol(&symbols, query, MAX_CANDIDATES) {
        SymbolLookup::Exact(symbol) => println!("{symbol}"),
        SymbolLookup::Candidates(candidates) => {
            println!("Several symbols match {query:?}:");
            for symbol in candidates {
                println!("  {symbol}");
            }
        }
        SymbolLookup::NotFound => anyhow::bail!("no symbol matches {query:?}"),
        SymbolLookup::TooMany(count) => {
            anyhow::bail!("{count} symbols match {query:?}, please be more specific")
        }
    }
    Ok(())
}

/// Fetch and print one snapshot.
async fn cmd_snapshot(symbol: &str, depth: Option<usize>) -> anyhow::Result<()> {
    let config = load_config()?;
    let depth = display_depth(depth, &config)?;
    let feed = config.feed();
    let loader = SnapshotLoader::new(build_http_client(&feed)?, &feed.rest_url);

    let symbol = normalize_symbol(symbol);
    let snapshot = loader.fetch(&symbol, feed.snapshot_limit).await?;
    if let Some(id) = snapshot.last_update_id {
        info!(symbol = %symbol, last_update_id = id, "Snapshot loaded");
    }

    let mut replica = BookReplica::new(symbol);
    replica.load_snapshot(snapshot.asks, snapshot.bids);
    let view = replica.project(depth);
    println!("{}", format_orderbook(view.as_ref(), depth, chrono::Local::now().time()));
    Ok(())
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("MEXC DEPTH - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let feed = config.feed();
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Stream URL: {}", feed.ws_url);
    println!("  REST URL: {}", feed.rest_url);
    println!("  Depth topic: {}", feed.depth_topic("<SYMBOL>"));
    println!("  Snapshot limit: {}", feed.snapshot_limit);
    println!("  Projection depth: {}", feed.projection_depth);
    println!("  Receive timeout: {}s", feed.receive_timeout.as_secs());
    println!("  Reconnect delay: {}s", feed.reconnect_delay.as_secs());
    println!("  Ping interval: {}s", feed.ping_interval.as_secs());
    println!(
        "  Snapshot on reconnect: {}",
        if feed.refresh_snapshot_on_reconnect { "Enabled" } else { "Disabled" }
    );
    println!("  Display depth: {}", config.display_depth);
    println!("  Watch symbols: {}", config.watch_symbols.join(", "));
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}
