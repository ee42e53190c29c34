use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::{ChannelSummary, ContentSource, ItemDetails, ItemSummary};
use crate::error::Result;

/// Content source wrapper with an LRU cache in front of `get_item`.
///
/// Channel peek-ahead and title searches tend to resolve the same items
/// repeatedly; caching their metadata saves a round trip per repeat.
/// Searches and upload listings pass straight through.
pub struct CachedContentSource {
    inner: Arc<dyn ContentSource>,
    items: Mutex<LruCache<String, ItemDetails>>,
}

impl CachedContentSource {
    /// Wrap `inner` with an item cache holding at most `capacity` entries
    /// (a capacity of 0 is treated as 1).
    pub fn new(inner: Arc<dyn ContentSource>, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            items: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, item_id: &str) -> Option<ItemDetails> {
        self.items.lock().ok()?.get(item_id).cloned()
    }

    fn store(&self, item: &ItemDetails) {
        if let Ok(mut cache) = self.items.lock() {
            cache.put(item.item_id.clone(), item.clone());
        }
    }
}

#[async_trait]
impl ContentSource for CachedContentSource {
    async fn search_items(&self, query: &str) -> Result<Vec<ItemSummary>> {
        self.inner.search_items(query).await
    }

    async fn search_channels(&self, query: &str) -> Result<Vec<ChannelSummary>> {
        self.inner.search_channels(query).await
    }

    fn channel_uploads<'a>(&'a self, channel_id: &'a str) -> BoxStream<'a, Result<ItemSummary>> {
        self.inner.channel_uploads(channel_id)
    }

    async fn get_item(&self, item_id: &str) -> Result<ItemDetails> {
        if let Some(hit) = self.cached(item_id) {
            log::debug!("Item cache hit: {}", item_id);
            return Ok(hit);
        }
        let item = self.inner.get_item(item_id).await?;
        self.store(&item);
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticContentSource;

    fn item(id: &str) -> ItemDetails {
        ItemDetails {
            item_id: id.to_string(),
            title: format!("title {}", id),
            description: String::new(),
            tags: vec![],
            channel_id: "c1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_item_is_cached() {
        let inner = Arc::new(StaticContentSource::new().with_item(item("a")));
        let cached = CachedContentSource::new(inner.clone(), 10);

        assert_eq!(cached.get_item("a").await.unwrap().title, "title a");
        assert_eq!(cached.get_item("a").await.unwrap().title, "title a");
        assert_eq!(inner.call_count(), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = Arc::new(StaticContentSource::new());
        let cached = CachedContentSource::new(inner.clone(), 10);

        assert!(cached.get_item("missing").await.is_err());
        assert!(cached.get_item("missing").await.is_err());
        assert_eq!(inner.call_count(), 2);
        assert!(cached.is_empty());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let inner = Arc::new(
            StaticContentSource::new()
                .with_item(item("a"))
                .with_item(item("b")),
        );
        let cached = CachedContentSource::new(inner.clone(), 1);

        cached.get_item("a").await.unwrap();
        cached.get_item("b").await.unwrap();
        cached.get_item("a").await.unwrap();
        assert_eq!(inner.call_count(), 3);
    }
}
