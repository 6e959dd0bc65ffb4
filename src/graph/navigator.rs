use std::sync::Arc;

use crate::config::PrefetchSettings;

use super::page::{Page, PageBuilder, PageError};
use super::prefetch::Prefetcher;

/// One traversal step: build the page, start warming its neighbors, return.
pub struct Navigator {
    builder: Arc<PageBuilder>,
    prefetcher: Option<Prefetcher>,
}

impl Navigator {
    pub fn new(builder: Arc<PageBuilder>, prefetch: &PrefetchSettings) -> Self {
        let prefetcher = prefetch.enabled.then(|| {
            Prefetcher::new(Arc::clone(&builder), prefetch.concurrency.get() as usize)
        });
        Self {
            builder,
            prefetcher,
        }
    }

    pub fn builder(&self) -> &Arc<PageBuilder> {
        &self.builder
    }

    pub async fn step(&self, key: &str) -> Result<Arc<Page>, PageError> {
        let page = self.builder.build(key).await?;
        if let Some(prefetcher) = &self.prefetcher {
            prefetcher.spawn(&page);
        }
        Ok(page)
    }

    pub fn shutdown(&self) {
        if let Some(prefetcher) = &self.prefetcher {
            prefetcher.shutdown();
        }
    }
}
