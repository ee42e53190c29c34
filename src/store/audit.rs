//! Node expansion audit trail. Append-only; the traversal never reads it back.

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

use super::column_parse_error;
use crate::db::Db;
use crate::error::Result;
use crate::node::{DiscoveryNode, NodeType};

/// One expansion attempt as recorded in the trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionRecord {
    pub task_id: String,
    pub node_id: String,
    pub node_type: NodeType,
    pub content: String,
    pub depth: u32,
    pub discovered_count: usize,
    pub processed_at: String,
}

/// Append an expansion of `node` that produced `discovered_count` candidates.
pub async fn record_expansion(
    db: &Db,
    task_id: &str,
    node: &DiscoveryNode,
    discovered_count: usize,
) -> Result<()> {
    let task_id = task_id.to_string();
    let node = node.clone();
    let processed_at = Utc::now().to_rfc3339();

    db.with_connection(move |conn| {
        conn.execute(
            r#"
            INSERT INTO discovery_nodes (
                task_id, node_id, node_type, content, depth, discovered_count, processed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                task_id,
                node.id,
                node.node_type.as_str(),
                node.content,
                node.depth,
                discovered_count as i64,
                processed_at,
            ],
        )?;
        Ok(())
    })
    .await
}

/// All expansions of a task in insertion order.
pub async fn list_expansions(db: &Db, task_id: &str) -> Result<Vec<ExpansionRecord>> {
    let task_id = task_id.to_string();
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT task_id, node_id, node_type, content, depth, discovered_count, processed_at \
             FROM discovery_nodes WHERE task_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![task_id], |row| {
                let node_type: String = row.get(2)?;
                Ok(ExpansionRecord {
                    task_id: row.get(0)?,
                    node_id: row.get(1)?,
                    node_type: node_type.parse().map_err(|e| column_parse_error(2, e))?,
                    content: row.get(3)?,
                    depth: row.get(4)?,
                    discovered_count: row.get::<_, i64>(5)? as usize,
                    processed_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(rows)
    })
    .await
}
