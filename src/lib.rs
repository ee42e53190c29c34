pub mod config;
pub mod error;
pub mod db;
pub mod node;
pub mod task;
pub mod frontier;
pub mod keywords;
pub mod source;
pub mod expander;
pub mod store;
pub mod engine;
pub mod server;

pub use config::Config;
pub use engine::DiscoveryEngine;
pub use error::{DiscoveryError, Result};
pub use node::{DiscoveryNode, NodeType, Seed, SeedKind};
pub use server::DiscoveryServer;
pub use source::{CachedContentSource, ContentSource, HttpContentSource, StaticContentSource};
pub use task::{DiscoveryTask, TaskStatus, TraversalMode, TraversalSettings};
