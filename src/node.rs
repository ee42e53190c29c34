//! Graph vertices: node types, identities and seed resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DiscoveryError, Result};

/// Closed set of vertex kinds in the content graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Keyword,
    Channel,
    Item,
}

impl NodeType {
    /// Prefix used when building node identities (`video_abc123`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeType::Keyword => "keyword",
            NodeType::Channel => "channel",
            NodeType::Item => "video",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Keyword => "keyword",
            NodeType::Channel => "channel",
            NodeType::Item => "item",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(NodeType::Keyword),
            "channel" => Ok(NodeType::Channel),
            "item" | "video" => Ok(NodeType::Item),
            other => Err(DiscoveryError::InvalidInput(format!("unknown node type: {}", other))),
        }
    }
}

/// Build the identity of a vertex. Pure function of `(node_type, content)`.
pub fn node_id(node_type: NodeType, content: &str) -> String {
    format!("{}_{}", node_type.id_prefix(), content)
}

/// One vertex as known to a running discovery task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNode {
    pub id: String,
    pub node_type: NodeType,
    pub content: String,
    /// Distance from the seed at first discovery. Never recomputed.
    pub depth: u32,
}

impl DiscoveryNode {
    pub fn new(node_type: NodeType, content: impl Into<String>, depth: u32) -> Self {
        let content = content.into();
        Self {
            id: node_id(node_type, &content),
            node_type,
            content,
            depth,
        }
    }

    pub fn keyword(keyword: impl Into<String>, depth: u32) -> Self {
        Self::new(NodeType::Keyword, keyword, depth)
    }

    pub fn channel(channel_id: impl Into<String>, depth: u32) -> Self {
        Self::new(NodeType::Channel, channel_id, depth)
    }

    pub fn item(item_id: impl Into<String>, depth: u32) -> Self {
        Self::new(NodeType::Item, item_id, depth)
    }
}

/// What kind of entity a discovery run starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    Keyword,
    Channel,
    Item,
}

impl SeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedKind::Keyword => "keyword",
            SeedKind::Channel => "channel",
            SeedKind::Item => "item",
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            SeedKind::Keyword => NodeType::Keyword,
            SeedKind::Channel => NodeType::Channel,
            SeedKind::Item => NodeType::Item,
        }
    }
}

impl fmt::Display for SeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeedKind {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(SeedKind::Keyword),
            "channel" => Ok(SeedKind::Channel),
            "item" | "video" => Ok(SeedKind::Item),
            other => Err(DiscoveryError::InvalidSeed(format!("unsupported seed kind: {}", other))),
        }
    }
}

/// A validated seed: the depth-0 vertex of a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub value: String,
    pub kind: SeedKind,
}

impl Seed {
    /// Validate a raw `(value, kind)` request.
    ///
    /// `kind` may also be `url`: a watch URL, short URL or bare 11-character id,
    /// which resolves to an item seed.
    pub fn parse(value: &str, kind: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DiscoveryError::InvalidSeed("seed value is empty".to_string()));
        }

        if kind.trim().eq_ignore_ascii_case("url") {
            let item_id = extract_item_id(value).ok_or_else(|| {
                DiscoveryError::InvalidSeed(format!("cannot resolve an item id from url: {}", value))
            })?;
            return Ok(Self { value: item_id, kind: SeedKind::Item });
        }

        Ok(Self {
            value: value.to_string(),
            kind: kind.parse()?,
        })
    }

    pub fn node(&self) -> DiscoveryNode {
        DiscoveryNode::new(self.kind.node_type(), self.value.clone(), 0)
    }
}

const BARE_ITEM_ID_LEN: usize = 11;

/// Pull an item id out of `/watch?v=<id>` or `youtu.be/<id>` style links,
/// or accept a bare 11-character id.
pub fn extract_item_id(input: &str) -> Option<String> {
    let input = input.trim();

    if let Ok(url) = Url::parse(input) {
        let host = url.host_str().unwrap_or("");
        if host.ends_with("youtu.be") {
            let id = url.path().trim_matches('/');
            return (!id.is_empty()).then(|| id.to_string());
        }
        if url.path() == "/watch" {
            return url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty());
        }
        return None;
    }

    let is_bare_id = input.len() == BARE_ITEM_ID_LEN
        && input.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    is_bare_id.then(|| input.to_string())
}
