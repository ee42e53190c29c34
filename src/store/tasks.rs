use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::column_parse_error;
use crate::db::Db;
use crate::error::{DiscoveryError, Result};
use crate::task::{DiscoveryTask, TaskStatus};

const TASK_COLUMNS: &str = "task_id, seed, seed_kind, mode, max_depth, branching_factor, \
     max_total_items, status, processed_count, frontier_size, last_processed_node, \
     start_time, last_update, end_time, error_message";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<DiscoveryTask> {
    let seed_kind: String = row.get(2)?;
    let mode: String = row.get(3)?;
    let status: String = row.get(7)?;

    Ok(DiscoveryTask {
        task_id: row.get(0)?,
        seed: row.get(1)?,
        seed_kind: seed_kind.parse().map_err(|e| column_parse_error(2, e))?,
        mode: mode.parse().map_err(|e| column_parse_error(3, e))?,
        max_depth: row.get(4)?,
        branching_factor: row.get::<_, i64>(5)? as usize,
        max_total_items: row.get::<_, i64>(6)? as usize,
        status: status.parse().map_err(|e| column_parse_error(7, e))?,
        processed_count: row.get::<_, i64>(8)? as usize,
        frontier_size: row.get::<_, i64>(9)? as usize,
        last_processed_node: row.get(10)?,
        start_time: row.get(11)?,
        last_update: row.get(12)?,
        end_time: row.get(13)?,
        error_message: row.get(14)?,
    })
}

/// Insert the record for a newly accepted task.
pub async fn create_task(db: &Db, task: &DiscoveryTask) -> Result<()> {
    let task = task.clone();
    db.with_connection(move |conn| {
        conn.execute(
            r#"
            INSERT INTO discovery_tasks (
                task_id, seed, seed_kind, mode, max_depth, branching_factor,
                max_total_items, status, processed_count, frontier_size, start_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                task.task_id,
                task.seed,
                task.seed_kind.as_str(),
                task.mode.as_str(),
                task.max_depth,
                task.branching_factor as i64,
                task.max_total_items as i64,
                task.status.as_str(),
                task.processed_count as i64,
                task.frontier_size as i64,
                task.start_time,
            ],
        )?;
        Ok(())
    })
    .await
}

/// Record progress after a processed node.
///
/// Returns false if the task is no longer running (terminal rows are frozen).
pub async fn update_progress(
    db: &Db,
    task_id: &str,
    processed_count: usize,
    frontier_size: usize,
    last_node: &str,
) -> Result<bool> {
    let task_id = task_id.to_string();
    let last_node = last_node.to_string();
    let now = Utc::now().to_rfc3339();

    let changed = db
        .with_connection(move |conn| {
            let n = conn.execute(
                r#"
                UPDATE discovery_tasks
                SET processed_count = ?1, frontier_size = ?2,
                    last_processed_node = ?3, last_update = ?4
                WHERE task_id = ?5 AND status = 'running'
                "#,
                params![processed_count as i64, frontier_size as i64, last_node, now, task_id],
            )?;
            Ok(n)
        })
        .await?;

    Ok(changed > 0)
}

/// Move a running task to a terminal status.
///
/// Returns false if the task was already terminal; its fields are left untouched.
pub async fn finish_task(
    db: &Db,
    task_id: &str,
    status: TaskStatus,
    processed_count: usize,
    error_message: Option<&str>,
) -> Result<bool> {
    if !status.is_terminal() {
        return Err(DiscoveryError::InvalidState(format!(
            "cannot finish task {} with non-terminal status {}",
            task_id, status
        )));
    }

    let task_id = task_id.to_string();
    let error_message = error_message.map(String::from);
    let now = Utc::now().to_rfc3339();

    let changed = db
        .with_connection(move |conn| {
            let n = conn.execute(
                r#"
                UPDATE discovery_tasks
                SET status = ?1, processed_count = ?2, error_message = ?3,
                    end_time = ?4, last_update = ?4
                WHERE task_id = ?5 AND status = 'running'
                "#,
                params![status.as_str(), processed_count as i64, error_message, now, task_id],
            )?;
            Ok(n)
        })
        .await?;

    Ok(changed > 0)
}

pub async fn get_task(db: &Db, task_id: &str) -> Result<Option<DiscoveryTask>> {
    let task_id = task_id.to_string();
    db.with_connection(move |conn| {
        let sql = format!("SELECT {} FROM discovery_tasks WHERE task_id = ?1", TASK_COLUMNS);
        let task = conn
            .query_row(&sql, params![task_id], task_from_row)
            .optional()?;
        Ok(task)
    })
    .await
}

/// Most recently started tasks first.
pub async fn list_tasks(db: &Db, limit: usize) -> Result<Vec<DiscoveryTask>> {
    db.with_connection(move |conn| {
        let sql = format!(
            "SELECT {} FROM discovery_tasks ORDER BY start_time DESC LIMIT ?1",
            TASK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params![limit as i64], task_from_row)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(tasks)
    })
    .await
}

/// Tasks still marked running, oldest first. After a crash these are the resume candidates.
pub async fn list_incomplete_tasks(db: &Db) -> Result<Vec<DiscoveryTask>> {
    db.with_connection(move |conn| {
        let sql = format!(
            "SELECT {} FROM discovery_tasks WHERE status = 'running' ORDER BY start_time ASC",
            TASK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(tasks)
    })
    .await
}
