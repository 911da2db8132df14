//! # Example: worker_pool
//!
//! Demonstrates single-use worker processes with a hard timeout.
//!
//! Shows how to:
//! - Fetch a worker's output with [`BoundedWorkerPool::run_once`]
//! - Route worker failures into an [`ErrorCollector`] instead of returning them
//! - Bound a slow worker with a per-call timeout
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► run_once(echo, fetch)          ─► Some(output)
//!   ├─► run_once(exit 3, fetch)        ─► None, sink += Fail
//!   ├─► run_once(sleep 5, fetch, 300ms)─► None, sink += Timeout, worker killed
//!   └─► run_once(true, detached)       ─► None, worker reaped
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example worker_pool
//! RUST_LOG=procvisor=debug cargo run --example worker_pool
//! ```

use std::time::Duration;

use procvisor::{BoundedWorkerPool, ErrorCollector, PoolConfig, ProcessCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    println!("=== worker_pool example ===\n");

    // 1. Pool logs (retries, give-ups, stubborn workers) go through tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .without_time()
        .init();

    // 2. Short exit polling keeps the demo snappy
    let cfg = PoolConfig {
        exit_poll_interval: Duration::from_millis(100),
        exit_poll_attempts: 10,
        ..PoolConfig::default()
    };
    let pool = BoundedWorkerPool::new(cfg);
    let sink = ErrorCollector::new();

    // 3. Successful fetch
    let echo = ProcessCommand::new("echo").arg("42");
    if let Some(out) = pool.run_once(&echo, true, None, Some(&sink)).await? {
        println!("echo -> {}", out.stdout_lossy().trim());
    }

    // 4. Failing worker: recorded in the sink
    let failing = ProcessCommand::new("sh").args(["-c", "echo oops >&2; exit 3"]);
    let out = pool.run_once(&failing, true, None, Some(&sink)).await?;
    println!("failing worker output: {out:?}");

    // 5. Slow worker: cut off after 300ms
    let slow = ProcessCommand::new("sleep").arg("5");
    let out = pool
        .run_once(&slow, true, Some(Duration::from_millis(300)), Some(&sink))
        .await?;
    println!("slow worker output: {out:?}");

    // 6. Detached run: nothing to fetch, the worker is still reaped
    pool.run_once(&ProcessCommand::new("true"), false, None, Some(&sink))
        .await?;

    println!("\ncollected {} error(s):", sink.len());
    for e in sink.errors() {
        println!("  [{}] {}", e.as_label(), e.as_message());
    }
    Ok(())
}
