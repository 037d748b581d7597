//! sqlscope demo
//!
//! Wraps the in-memory backend with an observer and drives a scripted
//! session through it.
//!
//! # Architecture Overview
//!
//! ```text
//!   scripted session ──▶ client::Database ──▶ ProxyConnector ──▶ memdb
//!                                                  │
//!                                                  ▼
//!                                              Observer
//!                                   (default │ structured │ metrics)
//!                                                  ▲
//!   config file ──▶ ConfigWatcher ──▶ spawn_observer_reload (default only)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use sqlscope::client::Database;
use sqlscope::config::{load_config, spawn_observer_reload, ConfigWatcher, ScopeConfig};
use sqlscope::context::Context;
use sqlscope::driver::{DriverResult, IsolationLevel, TxOptions, Value};
use sqlscope::memdb::{Capabilities, MemDriver};
use sqlscope::observability::{init_logging, init_metrics};
use sqlscope::observer::{
    DefaultObserver, MetricsObserver, Observer, TracingLevels, TracingObserver, TracingSink,
};
use sqlscope::proxy::wrap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ObserverKind {
    /// One human-readable line per operation
    Default,
    /// Leveled tracing events with structured fields
    Structured,
    /// Prometheus counters and histograms
    Metrics,
}

#[derive(Debug, Parser)]
#[command(name = "sqlscope-demo", version, about = "Instrumented in-memory database session")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Follow edits to the configuration file (default observer only)
    #[arg(short, long, requires = "config")]
    watch: bool,

    #[arg(long, value_enum, default_value_t = ObserverKind::Default)]
    observer: ObserverKind,

    /// Backend without any optional capability
    #[arg(long)]
    baseline: bool,

    /// Scripted sessions to run; ignored while watching
    #[arg(long, default_value_t = 1)]
    iterations: u32,

    /// Pause between sessions
    #[arg(long, default_value_t = 2)]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ScopeConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("sqlscope-demo v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled || args.observer == ObserverKind::Metrics {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut default_observer = None;
    let observer: Arc<dyn Observer> = match args.observer {
        ObserverKind::Default => {
            let observer = Arc::new(DefaultObserver::with_config(TracingSink, config.observer.clone()));
            default_observer = Some(observer.clone());
            observer
        }
        ObserverKind::Structured => {
            Arc::new(TracingObserver::new(TracingLevels::from_config(&config.structured)?))
        }
        ObserverKind::Metrics => Arc::new(MetricsObserver::new()),
    };

    let caps = if args.baseline {
        Capabilities::baseline()
    } else {
        Capabilities::full()
    };
    let backend = MemDriver::new(caps);
    let db = Database::new(Arc::new(wrap(observer, backend.connector("demo"))));

    // Keep the watcher alive for the rest of main.
    let _watcher = match (&args.config, default_observer, args.watch) {
        (Some(path), Some(observer), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.with_current(config.clone()).run()?;
            spawn_observer_reload(updates, observer);
            Some(watcher)
        }
        (_, None, true) => {
            tracing::warn!("--watch only affects the default observer");
            None
        }
        _ => None,
    };

    let mut interval = tokio::time::interval(Duration::from_secs(args.interval_secs.max(1)));
    let mut remaining = args.iterations;
    let mut round = 0_u32;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                round += 1;
                if let Err(e) = scripted_session(&db, round) {
                    tracing::error!(error = %e, round, "Scripted session failed");
                }
                if !args.watch {
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    let stats = backend.stats();
    tracing::info!(
        conns = stats.conns_opened,
        stmts = stats.stmts_prepared,
        rows = stats.rows_opened,
        commits = stats.commits,
        "Shutdown complete"
    );
    Ok(())
}

/// Create a table, insert in a transaction, query it and run a prepared exec.
fn scripted_session(db: &Database, round: u32) -> DriverResult<()> {
    let ctx = Context::background().with_timeout(Duration::from_secs(5));
    let mut session = db.connect(&ctx)?;

    let table = format!("people_{round}");
    session.exec(&ctx, &format!("CREATE|{table}|name=text,age=int"), &[])?;

    let tx = session.begin(&ctx, TxOptions::default())?;
    let insert = format!("INSERT|{table}|name=?,age=?");
    session.exec(&ctx, &insert, &[Value::from("ada"), Value::from(36)])?;
    session.exec(&ctx, &insert, &[Value::from("grace"), Value::from(45)])?;
    tx.commit()?;

    let mut rows = session.query(&ctx, &format!("SELECT|{table}|name,age|name=?"), &[Value::from("ada")])?;
    for row in rows.collect_rows()? {
        tracing::debug!(?row, "Row fetched");
    }
    rows.close()?;

    let mut stmt = session.prepare(&ctx, &insert)?;
    stmt.exec(&ctx, &[Value::from("linus"), Value::Null])?;
    stmt.close()?;

    // A baseline backend rejects this; the error is reported and the session goes on.
    let serializable = TxOptions {
        isolation: IsolationLevel::Serializable,
        read_only: false,
    };
    match session.begin(&ctx, serializable) {
        Ok(tx) => tx.rollback()?,
        Err(e) => tracing::warn!(error = %e, "Serializable transaction unavailable"),
    }

    session.close()
}
