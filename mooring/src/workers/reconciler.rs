//! Status reconciliation worker

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::reconcile::Reconcile;

/// Reconciler worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between passes
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// One pass over every reconciler, in order.
pub async fn reconcile_all(reconcilers: &[Arc<dyn Reconcile>]) {
    for reconciler in reconcilers {
        match reconciler.tick().await {
            Ok(report) => debug!(
                kind = reconciler.kind(),
                checked = report.checked,
                updated = report.updated,
                errors = report.errors,
                "Reconciliation pass complete"
            ),
            Err(e) => error!(kind = reconciler.kind(), "Reconciliation pass failed: {}", e),
        }
    }
}

/// Run the reconciler worker. The first pass runs immediately.
pub async fn run<S, F>(
    options: &Options,
    reconcilers: Vec<Arc<dyn Reconcile>>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!(
        interval_secs = options.interval.as_secs(),
        "Reconciler worker starting..."
    );

    loop {
        reconcile_all(&reconcilers).await;

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Reconciler worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
