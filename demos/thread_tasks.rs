//! # Example: thread_tasks
//!
//! Demonstrates supervised OS threads with failure capture and cooperative shutdown.
//!
//! Shows how to:
//! - Register thread handles with [`Supervisor::thread`]
//! - Collect failures with [`Supervisor::wait_for_all`]
//! - Stop polling workers with [`Supervisor::terminate_all`]
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► 3 one-shot threads (Thread-2 fails)
//!   │     └─► wait_for_all(5s)
//!   │           ├─► TaskJoined per handle
//!   │           └─► failure logged with the task name
//!   │
//!   └─► 2 polling threads
//!         └─► terminate_all(true)
//!               ├─► flag raised, workers observe should_exit()
//!               ├─► every handle joined
//!               └─► flag reset
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example thread_tasks
//! RUST_LOG=procvisor=debug cargo run --example thread_tasks
//! ```

use std::{sync::Arc, time::Duration};

use procvisor::{Subscribe, Supervisor, TaskContext, TaskError, TaskFn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    println!("=== thread_tasks example ===\n");

    // 1. Route tracing output to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .init();

    // 2. Optional: render runtime events (requires "logging" feature)
    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(procvisor::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();

    let sup = Supervisor::builder().with_subscribers(subs).build();

    // 3. One-shot threads, one of them fails
    let batch: Vec<_> = (1..=3u64)
        .map(|i| {
            sup.thread(
                format!("Thread-{i}"),
                TaskFn::arc("crunch", move |_ctx: TaskContext| {
                    std::thread::sleep(Duration::from_millis(50 * i));
                    if i == 2 {
                        return Err(TaskError::fail(format!("chunk {i} is corrupt")));
                    }
                    println!("[Thread-{i}] done");
                    Ok(())
                }),
            )
        })
        .collect();
    for h in &batch {
        h.start()?;
    }

    let left = sup.wait_for_all(batch.clone(), Duration::from_secs(5)).await;
    println!("\nunjoined: {}", left.len());
    for h in batch.iter().filter(|h| h.has_raised_exception()) {
        println!(
            "{} failed: {}",
            h.name(),
            h.exception_message().unwrap_or_default()
        );
    }

    // 4. Long-running pollers stopped through the shared flag
    let pollers: Vec<_> = (4..=5)
        .map(|i| {
            sup.thread(
                format!("Thread-{i}"),
                TaskFn::arc("poll_queue", move |ctx: TaskContext| {
                    while ctx.sleep(Duration::from_millis(20)) {}
                    println!("[Thread-{i}] asked to exit");
                    Err(TaskError::Canceled)
                }),
            )
        })
        .collect();
    for h in &pollers {
        h.start()?;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stragglers = sup.terminate_all(true).await;
    println!("\nstragglers: {stragglers}");
    println!("flag after shutdown: {}", sup.should_workers_exit());

    // Give LogWriter a moment to drain
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
