//! Process-wide metrics (component O / §4.13b): a connected-clients gauge
//! and a monotonic message counter, ticked out either as a JSON line or a
//! structured log line.
//!
//! Grounded on the original's `server/metrics.py::MetricsCollector` and
//! `metrics_loop` for the counters and the env-gated output format.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Metrics {
    messages: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: AtomicU64::new(0),
        })
    }

    pub fn increment_messages(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }
}

/// Runs the metrics ticker until `shutdown` fires. A zero interval means the
/// ticker is disabled entirely — the caller should not spawn this task then.
pub async fn run(
    metrics: Arc<Metrics>,
    registry: Arc<cmdchat_services::registry::Registry>,
    interval: Duration,
    json_output: bool,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let clients = registry.session_count();
                let messages = metrics.messages();
                if json_output {
                    println!("{}", serde_json::json!({"clients": clients, "messages": messages}));
                } else {
                    tracing::info!(clients, messages, "metrics tick");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
