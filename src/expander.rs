//! Node expansion: turn one vertex into candidate children via the content source.
//!
//! Every sub-query degrades independently. A failed lookup contributes no
//! children and never aborts the rest of the expansion.

use std::sync::Arc;

use futures_util::StreamExt;

use crate::keywords::{keywords_from_item, keywords_from_titles};
use crate::node::{DiscoveryNode, NodeType};
use crate::source::{ContentSource, ItemSummary};

/// Keywords taken from a keyword node's search-result titles.
const KEYWORD_NODE_KEYWORDS: usize = 3;
/// Keywords taken from a single item's metadata.
const ITEM_NODE_KEYWORDS: usize = 2;
/// Uploads of a channel that are expanded one hop further.
const CHANNEL_PEEK_AHEAD: usize = 2;

pub struct NodeExpander {
    source: Arc<dyn ContentSource>,
    branching_factor: usize,
}

impl NodeExpander {
    pub fn new(source: Arc<dyn ContentSource>, branching_factor: usize) -> Self {
        Self {
            source,
            branching_factor,
        }
    }

    /// Candidate children of `node`, ordered items, then channels, then keywords.
    pub async fn expand(&self, node: &DiscoveryNode) -> Vec<DiscoveryNode> {
        let child_depth = node.depth + 1;
        match node.node_type {
            NodeType::Keyword => self.expand_keyword(&node.content, child_depth).await,
            NodeType::Channel => self.expand_channel(&node.content, child_depth).await,
            NodeType::Item => self.expand_item(&node.content, child_depth).await,
        }
    }

    async fn expand_keyword(&self, keyword: &str, depth: u32) -> Vec<DiscoveryNode> {
        let mut nodes = Vec::new();

        let items = match self.source.search_items(keyword).await {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Item search failed for keyword '{}': {}", keyword, e);
                Vec::new()
            }
        };
        nodes.extend(
            items
                .iter()
                .take(self.branching_factor)
                .map(|item| DiscoveryNode::item(item.item_id.clone(), depth)),
        );

        match self.source.search_channels(keyword).await {
            Ok(channels) => nodes.extend(
                channels
                    .into_iter()
                    .take(self.branching_factor / 2)
                    .map(|channel| DiscoveryNode::channel(channel.channel_id, depth)),
            ),
            Err(e) => log::warn!("Channel search failed for keyword '{}': {}", keyword, e),
        }

        let keywords = keywords_from_titles(items.iter().map(|item| item.title.as_str()));
        nodes.extend(
            keywords
                .into_iter()
                .take(KEYWORD_NODE_KEYWORDS)
                .map(|kw| DiscoveryNode::keyword(kw, depth)),
        );

        nodes
    }

    async fn expand_channel(&self, channel_id: &str, depth: u32) -> Vec<DiscoveryNode> {
        let mut uploads: Vec<ItemSummary> = Vec::new();
        let mut stream = self.source.channel_uploads(channel_id).take(self.branching_factor);
        while let Some(upload) = stream.next().await {
            match upload {
                Ok(item) => uploads.push(item),
                Err(e) => {
                    log::warn!("Upload listing failed for channel {}: {}", channel_id, e);
                    break;
                }
            }
        }
        drop(stream);

        let mut nodes: Vec<DiscoveryNode> = uploads
            .iter()
            .map(|item| DiscoveryNode::item(item.item_id.clone(), depth))
            .collect();

        // Peek one hop further so channel-seeded runs do not stall at a single level.
        for item in uploads.iter().take(CHANNEL_PEEK_AHEAD) {
            let related = self.expand_item(&item.item_id, depth + 1).await;
            nodes.extend(related);
        }

        nodes
    }

    async fn expand_item(&self, item_id: &str, depth: u32) -> Vec<DiscoveryNode> {
        let item = match self.source.get_item(item_id).await {
            Ok(item) => item,
            Err(e) => {
                log::warn!("Item lookup failed for {}: {}", item_id, e);
                return Vec::new();
            }
        };

        let mut nodes = Vec::new();

        match self.source.search_items(&item.title).await {
            Ok(related) => nodes.extend(
                related
                    .into_iter()
                    .take(self.branching_factor / 2)
                    .filter(|r| r.item_id != item_id)
                    .map(|r| DiscoveryNode::item(r.item_id, depth)),
            ),
            Err(e) => log::warn!("Related search failed for item {}: {}", item_id, e),
        }

        if !item.channel_id.is_empty() {
            nodes.push(DiscoveryNode::channel(item.channel_id.clone(), depth));
        }

        nodes.extend(
            keywords_from_item(&item.title, &item.description, &item.tags)
                .into_iter()
                .take(ITEM_NODE_KEYWORDS)
                .map(|kw| DiscoveryNode::keyword(kw, depth)),
        );

        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ChannelSummary, ItemDetails, StaticContentSource};

    fn summary(id: &str, title: &str) -> ItemSummary {
        ItemSummary {
            item_id: id.to_string(),
            title: title.to_string(),
        }
    }

    fn details(id: &str, title: &str, channel: &str) -> ItemDetails {
        ItemDetails {
            item_id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            tags: vec![],
            channel_id: channel.to_string(),
        }
    }

    fn ids(nodes: &[DiscoveryNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_keyword_expansion_order_and_caps() {
        let source = StaticContentSource::new()
            .with_item_search(
                "golang",
                vec![
                    summary("v1", "Golang generics"),
                    summary("v2", "Golang channels"),
                    summary("v3", "Golang modules"),
                    summary("v4", "unused"),
                    summary("v5", "unused"),
                ],
            )
            .with_channel_search(
                "golang",
                vec![
                    ChannelSummary { channel_id: "c1".into(), title: String::new() },
                    ChannelSummary { channel_id: "c2".into(), title: String::new() },
                ],
            );
        let expander = NodeExpander::new(Arc::new(source), 4);

        let children = expander.expand(&DiscoveryNode::keyword("golang", 0)).await;
        assert_eq!(
            ids(&children),
            vec![
                "video_v1", "video_v2", "video_v3", "video_v4",
                "channel_c1", "channel_c2",
                "keyword_golang", "keyword_generics", "keyword_channels",
            ]
        );
        assert!(children.iter().all(|n| n.depth == 1));
    }

    #[tokio::test]
    async fn test_item_expansion_excludes_self() {
        let source = StaticContentSource::new()
            .with_item(ItemDetails {
                description: "Exploring ownership semantics".into(),
                tags: vec!["systems".into()],
                ..details("i1", "Rust ownership", "chan")
            })
            .with_item_search(
                "Rust ownership",
                vec![summary("i1", "Rust ownership"), summary("i2", "Borrowing")],
            );
        let expander = NodeExpander::new(Arc::new(source), 4);

        let children = expander.expand(&DiscoveryNode::item("i1", 2)).await;
        assert_eq!(
            ids(&children),
            vec!["video_i2", "channel_chan", "keyword_rust", "keyword_ownership"]
        );
        assert!(children.iter().all(|n| n.depth == 3));
    }

    #[tokio::test]
    async fn test_channel_peek_ahead_depths() {
        let source = StaticContentSource::new()
            .with_uploads(
                "chan",
                vec![summary("u1", ""), summary("u2", ""), summary("u3", "")],
            )
            .with_item(details("u1", "First upload", "chan"))
            .with_item(details("u2", "Second upload", "other"));
        let expander = NodeExpander::new(Arc::new(source), 3);

        let children = expander.expand(&DiscoveryNode::channel("chan", 0)).await;
        let uploads: Vec<_> = children.iter().filter(|n| n.depth == 1).collect();
        assert_eq!(uploads.len(), 3);
        assert!(uploads.iter().all(|n| n.node_type == NodeType::Item));

        let peeked: Vec<_> = children.iter().filter(|n| n.depth == 2).collect();
        assert!(!peeked.is_empty());
        assert!(peeked.iter().any(|n| n.id == "channel_other"));
        assert!(children.iter().all(|n| n.depth <= 2));
    }

    #[tokio::test]
    async fn test_failing_source_yields_nothing() {
        let expander = NodeExpander::new(Arc::new(StaticContentSource::failing()), 5);
        for node in [
            DiscoveryNode::keyword("k", 0),
            DiscoveryNode::channel("c", 0),
            DiscoveryNode::item("i", 0),
        ] {
            assert!(expander.expand(&node).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_subqueries() {
        // Item lookup succeeds but the related search has no entry: channel + keywords remain.
        let source = StaticContentSource::new().with_item(details("i1", "Tokio runtime", "chan"));
        let expander = NodeExpander::new(Arc::new(source), 4);
        let children = expander.expand(&DiscoveryNode::item("i1", 0)).await;
        assert_eq!(ids(&children), vec!["channel_chan", "keyword_tokio", "keyword_runtime"]);
    }
}
