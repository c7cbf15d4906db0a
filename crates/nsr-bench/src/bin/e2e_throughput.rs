//! End-to-end request/reply throughput for nsr.
//!
//! Runs a router over the in-process memory transport and measures how many
//! requests concurrent clients complete through the full serve loop.
//!
//! ```bash
//! cargo run --release -p nsr-bench --bin e2e_throughput -- 32
//! ```

use nsr_core::{handler, middleware, Router};
use nsr_protocol::Message;
use nsr_transport::MemoryTransport;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WARMUP_SECS: u64 = 1;
const BENCH_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let num_clients: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(16);

    println!("nsr end-to-end throughput: {} clients", num_clients);
    println!("Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);

    let transport = MemoryTransport::new();
    let mut router = Router::new().with_transport(Arc::new(transport.clone()));
    router.use_middleware(middleware(|next| {
        handler(move |response, request| {
            response.header("x-bench", "1");
            next(response, request)
        })
    }))?;
    router.path(
        "bench.*",
        handler(|response, request| {
            response.write(&request.payload);
            Ok(())
        }),
    )?;
    router.start().await?;

    let completed = Arc::new(AtomicU64::new(0));
    let errors = Arc::new(AtomicU64::new(0));
    let running = Arc::new(AtomicBool::new(true));

    let clients: Vec<_> = (0..num_clients)
        .map(|client_id| {
            let transport = transport.clone();
            let completed = Arc::clone(&completed);
            let errors = Arc::clone(&errors);
            let running = Arc::clone(&running);
            tokio::spawn(async move {
                let subject = format!("bench.client{}", client_id);
                let payload = vec![0u8; 64];
                while running.load(Ordering::Relaxed) {
                    let message = Message::new(subject.clone(), payload.clone());
                    match transport.request(message).await {
                        Ok(reply) if !reply.is_error() => {
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            errors.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    completed.store(0, Ordering::SeqCst);
    errors.store(0, Ordering::SeqCst);
    let start = Instant::now();
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;
    let elapsed = start.elapsed();
    let total = completed.load(Ordering::SeqCst);
    let failed = errors.load(Ordering::SeqCst);

    running.store(false, Ordering::SeqCst);
    for client in clients {
        let _ = client.await;
    }
    router.stop().await?;

    let per_sec = total as f64 / elapsed.as_secs_f64();
    println!();
    println!("Duration:       {:>10.2}s", elapsed.as_secs_f64());
    println!("Requests:       {:>10}", total);
    println!("Errors:         {:>10}", failed);
    println!("Throughput:     {:>10.0} req/s", per_sec);
    println!("Per client:     {:>10.0} req/s", per_sec / num_clients as f64);

    Ok(())
}
