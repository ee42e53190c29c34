use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{ChannelSummary, ContentSource, ItemDetails, ItemSummary};
use crate::error::{DiscoveryError, Result};

#[derive(Deserialize)]
struct ItemSearchResponse {
    items: Vec<ItemSummary>,
}

#[derive(Deserialize)]
struct ChannelSearchResponse {
    channels: Vec<ChannelSummary>,
}

#[derive(Deserialize)]
struct UploadsPage {
    items: Vec<ItemSummary>,
    #[serde(default)]
    next_page: Option<String>,
}

/// Cursor for the page after `page`, or None when paging should stop.
///
/// An empty page or a cursor equal to the one just requested ends the listing.
fn next_cursor(current: Option<&str>, page: &UploadsPage) -> Option<String> {
    if page.items.is_empty() {
        return None;
    }
    page.next_page
        .clone()
        .filter(|next| current != Some(next.as_str()))
}

/// JSON content gateway client
///
/// Endpoints, relative to `base_url`:
/// - `GET search/items?q=` and `GET search/channels?q=`
/// - `GET channels/{id}/uploads?limit=&page=` (cursor paged via `next_page`)
/// - `GET items/{id}`
///
/// 429 and 5xx responses are retried with exponential backoff.
pub struct HttpContentSource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    max_retries: usize,
    page_size: usize,
}

impl HttpContentSource {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: usize,
        page_size: usize,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DiscoveryError::Config(format!("Invalid content source url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DiscoveryError::Config(format!(
                "Content source url cannot be a base: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            max_retries,
            page_size: page_size.max(1),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DiscoveryError::Config(format!("Invalid content source url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let mut attempt = 0;
        let mut delay = Duration::from_millis(500);

        loop {
            let mut request = self.client.get(url.clone()).query(query);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| DiscoveryError::ContentSource(format!("Network error: {}", e)))?;
            let status = response.status();

            if status.is_success() {
                return response.json::<T>().await.map_err(|e| {
                    DiscoveryError::ContentSource(format!("Failed to parse response from {}: {}", url.path(), e))
                });
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.max_retries {
                log::warn!(
                    "Retry {}/{} for {} after status {}",
                    attempt + 1,
                    self.max_retries,
                    url.path(),
                    status
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
                continue;
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(DiscoveryError::ContentSource(format!(
                "{} returned {}: {}",
                url.path(),
                status,
                body
            )));
        }
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn search_items(&self, query: &str) -> Result<Vec<ItemSummary>> {
        let response: ItemSearchResponse = self
            .get_json(&["search", "items"], &[("q", query.to_string())])
            .await?;
        Ok(response.items)
    }

    async fn search_channels(&self, query: &str) -> Result<Vec<ChannelSummary>> {
        let response: ChannelSearchResponse = self
            .get_json(&["search", "channels"], &[("q", query.to_string())])
            .await?;
        Ok(response.channels)
    }

    fn channel_uploads<'a>(&'a self, channel_id: &'a str) -> BoxStream<'a, Result<ItemSummary>> {
        // State: Some(cursor) while pages remain, None once exhausted or failed.
        let pages = stream::unfold(Some(None::<String>), move |state| async move {
            let cursor = match state {
                Some(cursor) => cursor,
                None => return None,
            };
            let mut query = vec![("limit", self.page_size.to_string())];
            if let Some(page) = &cursor {
                query.push(("page", page.clone()));
            }
            match self
                .get_json::<UploadsPage>(&["channels", channel_id, "uploads"], &query)
                .await
            {
                Ok(page) => {
                    let next = next_cursor(cursor.as_deref(), &page);
                    if next.is_none() && page.next_page.is_some() {
                        log::warn!(
                            "Channel {} uploads: stopping at stalled cursor {:?}",
                            channel_id,
                            page.next_page
                        );
                    }
                    Some((Ok(page.items), next.map(Some)))
                }
                Err(e) => Some((Err(e), None)),
            }
        });

        pages
            .flat_map(|page| match page {
                Ok(items) => stream::iter(items.into_iter().map(Ok)).left_stream(),
                Err(e) => stream::once(async move { Err(e) }).right_stream(),
            })
            .boxed()
    }

    async fn get_item(&self, item_id: &str) -> Result<ItemDetails> {
        self.get_json(&["items", item_id], &[]).await
    }
}
