use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use super::{ChannelSummary, ContentSource, ItemDetails, ItemSummary};
use crate::error::{DiscoveryError, Result};

/// In-memory content catalogue.
///
/// Used for offline runs and tests. Lookups are exact-match on the query
/// string; unknown keys yield empty results (or not-found for `get_item`).
#[derive(Debug, Default)]
pub struct StaticContentSource {
    item_searches: HashMap<String, Vec<ItemSummary>>,
    channel_searches: HashMap<String, Vec<ChannelSummary>>,
    uploads: HashMap<String, Vec<ItemSummary>>,
    items: HashMap<String, ItemDetails>,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every lookup fails with a transport error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_item_search(mut self, query: &str, results: Vec<ItemSummary>) -> Self {
        self.item_searches.insert(query.to_string(), results);
        self
    }

    pub fn with_channel_search(mut self, query: &str, results: Vec<ChannelSummary>) -> Self {
        self.channel_searches.insert(query.to_string(), results);
        self
    }

    pub fn with_uploads(mut self, channel_id: &str, uploads: Vec<ItemSummary>) -> Self {
        self.uploads.insert(channel_id.to_string(), uploads);
        self
    }

    pub fn with_item(mut self, item: ItemDetails) -> Self {
        self.items.insert(item.item_id.clone(), item);
        self
    }

    /// Total number of lookups served (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(DiscoveryError::ContentSource("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn search_items(&self, query: &str) -> Result<Vec<ItemSummary>> {
        self.record_call()?;
        Ok(self.item_searches.get(query).cloned().unwrap_or_default())
    }

    async fn search_channels(&self, query: &str) -> Result<Vec<ChannelSummary>> {
        self.record_call()?;
        Ok(self.channel_searches.get(query).cloned().unwrap_or_default())
    }

    fn channel_uploads<'a>(&'a self, channel_id: &'a str) -> BoxStream<'a, Result<ItemSummary>> {
        if let Err(e) = self.record_call() {
            return stream::once(async move { Err(e) }).boxed();
        }
        let uploads = self.uploads.get(channel_id).cloned().unwrap_or_default();
        stream::iter(uploads.into_iter().map(Ok)).boxed()
    }

    async fn get_item(&self, item_id: &str) -> Result<ItemDetails> {
        self.record_call()?;
        self.items
            .get(item_id)
            .cloned()
            .ok_or_else(|| DiscoveryError::ContentSource(format!("item not found: {}", item_id)))
    }
}
