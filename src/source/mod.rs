//! Content source: the external catalogue the engine explores.
//!
//! The engine only consumes the lookups below and never mutates source state.
//! Implementations own their own retries and rate limits.

mod cache;
mod http;
mod memory;

pub use cache::CachedContentSource;
pub use http::HttpContentSource;
pub use memory::StaticContentSource;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An item as it appears in search results and upload listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub item_id: String,
    #[serde(default)]
    pub title: String,
}

/// A channel as it appears in channel search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel_id: String,
    #[serde(default)]
    pub title: String,
}

/// Full metadata for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub channel_id: String,
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Ranked items matching a free-text query.
    async fn search_items(&self, query: &str) -> Result<Vec<ItemSummary>>;

    /// Ranked channels matching a free-text query.
    async fn search_channels(&self, query: &str) -> Result<Vec<ChannelSummary>>;

    /// A channel's uploads, newest first. Unbounded; callers take what they need.
    fn channel_uploads<'a>(&'a self, channel_id: &'a str) -> BoxStream<'a, Result<ItemSummary>>;

    /// Metadata for a single item.
    async fn get_item(&self, item_id: &str) -> Result<ItemDetails>;
}
