use std::sync::Arc;

use metrics::counter;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::infra::telemetry::PREFETCH_FAILED_TOTAL;

use super::page::{Page, PageBuilder};

const TARGET: &str = "daoctl::graph::prefetch";

/// Warms the page cache for every neighbor of a freshly built page.
///
/// Work runs on detached tasks; nothing waits for it and failures only show
/// up in logs and the `daoctl_prefetch_failed_total` counter.
pub struct Prefetcher {
    builder: Arc<PageBuilder>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Prefetcher {
    pub fn new(builder: Arc<PageBuilder>, concurrency: usize) -> Self {
        Self {
            builder,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            cancel: CancellationToken::new(),
        }
    }

    /// Launches one task per uncached neighbor and returns how many were launched.
    pub fn spawn(&self, page: &Page) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }

        let mut launched = 0;
        for hash in page.neighbors() {
            if self.builder.cached(hash.as_str()).is_some() {
                continue;
            }

            let builder = Arc::clone(&self.builder);
            let permits = Arc::clone(&self.permits);
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                let work = async {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    match builder.build(hash.as_str()).await {
                        Ok(page) => debug!(
                            target = TARGET,
                            hash = %hash,
                            choices = page.choices.len(),
                            "neighbor page prefetched"
                        ),
                        Err(err) => {
                            counter!(PREFETCH_FAILED_TOTAL).increment(1);
                            warn!(
                                target = TARGET,
                                hash = %hash,
                                error = %err,
                                "neighbor prefetch failed"
                            );
                        }
                    }
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(target = TARGET, hash = %hash, "neighbor prefetch cancelled");
                    }
                    _ = work => {}
                }
            });
            launched += 1;
        }

        debug!(target = TARGET, primary = %page.primary.hash, launched, "prefetch launched");
        launched
    }

    /// Stops outstanding prefetches; later calls to `spawn` do nothing.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
