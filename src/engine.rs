//! Task controller: accepts discovery requests and drives each one to a
//! terminal state on its own tokio task.
//!
//! Within a task traversal is strictly sequential. Tasks share nothing in
//! memory except the registry of cancellation tokens; all progress is
//! published through the task store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{DiscoveryError, Result};
use crate::expander::NodeExpander;
use crate::frontier::{Frontier, Selection};
use crate::node::Seed;
use crate::source::ContentSource;
use crate::store::{self, ExpansionRecord};
use crate::task::{DiscoveryTask, TaskStatus, TraversalSettings};

/// How a traversal loop ended without an uncaught failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Exhausted,
    Cancelled,
}

struct EngineInner {
    db: Db,
    source: Arc<dyn ContentSource>,
    settings: TraversalSettings,
    node_delay: Duration,
    running: Mutex<HashMap<String, CancellationToken>>,
}

/// Discovery engine handle. Cheap to clone; clones share the running-task registry.
#[derive(Clone)]
pub struct DiscoveryEngine {
    inner: Arc<EngineInner>,
}

impl DiscoveryEngine {
    /// `settings` apply to every task started by this engine; `node_delay`
    /// is the pause between two processed nodes of the same task.
    pub fn new(
        db: Db,
        source: Arc<dyn ContentSource>,
        settings: TraversalSettings,
        node_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                db,
                source,
                settings,
                node_delay,
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn db(&self) -> &Db {
        &self.inner.db
    }

    /// Accept a discovery request and start it in the background.
    ///
    /// Seed validation happens first: an unsupported seed kind fails here,
    /// before any task record exists.
    pub async fn start_discovery(
        &self,
        seed: &str,
        seed_kind: &str,
        max_total_items: usize,
    ) -> Result<String> {
        let seed = Seed::parse(seed, seed_kind)?;
        if max_total_items == 0 {
            return Err(DiscoveryError::InvalidInput(
                "max_total_items must be greater than 0".to_string(),
            ));
        }

        let settings = self.inner.settings;
        let task = DiscoveryTask {
            task_id: Uuid::new_v4().to_string(),
            seed: seed.value.clone(),
            seed_kind: seed.kind,
            mode: settings.mode,
            max_depth: settings.max_depth,
            branching_factor: settings.branching_factor,
            max_total_items,
            status: TaskStatus::Running,
            processed_count: 0,
            frontier_size: 1,
            last_processed_node: None,
            start_time: Utc::now().to_rfc3339(),
            last_update: None,
            end_time: None,
            error_message: None,
        };

        store::create_task(&self.inner.db, &task).await?;
        log::info!(
            "Discovery task {} accepted: {} '{}' ({}, max_depth={}, branching={}, max_items={})",
            task.task_id,
            task.seed_kind,
            task.seed,
            task.mode,
            task.max_depth,
            task.branching_factor,
            task.max_total_items
        );

        let task_id = task.task_id.clone();
        self.spawn(task)?;
        Ok(task_id)
    }

    /// Restart a task left `running` by a previous process.
    ///
    /// The frontier is not persisted, so traversal restarts from the seed; the
    /// stored processed count carries over as the starting value of the budget.
    pub async fn resume_task(&self, task_id: &str) -> Result<()> {
        let task = store::get_task(&self.inner.db, task_id)
            .await?
            .ok_or_else(|| DiscoveryError::TaskNotFound(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(DiscoveryError::InvalidState(format!(
                "task {} is already {}",
                task_id, task.status
            )));
        }
        if self.is_running(task_id) {
            return Err(DiscoveryError::InvalidState(format!(
                "task {} is already running in this engine",
                task_id
            )));
        }

        log::info!(
            "Resuming discovery task {} from seed '{}' with {} nodes already processed",
            task.task_id,
            task.seed,
            task.processed_count
        );
        self.spawn(task)
    }

    /// Request cancellation. Returns false if the task had already finished.
    ///
    /// A running row with no live worker (orphaned by a crash) is marked
    /// cancelled directly.
    pub async fn cancel(&self, task_id: &str) -> Result<bool> {
        let token = self.running_token(task_id);
        if let Some(token) = token {
            log::info!("Cancelling discovery task {}", task_id);
            token.cancel();
            return Ok(true);
        }

        let task = store::get_task(&self.inner.db, task_id)
            .await?
            .ok_or_else(|| DiscoveryError::TaskNotFound(task_id.to_string()))?;
        if task.status.is_terminal() {
            return Ok(false);
        }
        store::finish_task(
            &self.inner.db,
            task_id,
            TaskStatus::Cancelled,
            task.processed_count,
            None,
        )
        .await
    }

    /// Cancel every task this engine is running.
    pub fn shutdown(&self) {
        if let Ok(running) = self.inner.running.lock() {
            for (task_id, token) in running.iter() {
                log::info!("Stopping discovery task {}", task_id);
                token.cancel();
            }
        }
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        self.running_token(task_id).is_some()
    }

    pub async fn get_task(&self, task_id: &str) -> Result<DiscoveryTask> {
        store::get_task(&self.inner.db, task_id)
            .await?
            .ok_or_else(|| DiscoveryError::TaskNotFound(task_id.to_string()))
    }

    pub async fn list_tasks(&self, limit: usize) -> Result<Vec<DiscoveryTask>> {
        store::list_tasks(&self.inner.db, limit).await
    }

    pub async fn list_incomplete_tasks(&self) -> Result<Vec<DiscoveryTask>> {
        store::list_incomplete_tasks(&self.inner.db).await
    }

    pub async fn node_trail(&self, task_id: &str) -> Result<Vec<ExpansionRecord>> {
        store::list_expansions(&self.inner.db, task_id).await
    }

    /// Poll the task store until the task reaches a terminal status.
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        poll_interval: Duration,
    ) -> Result<DiscoveryTask> {
        loop {
            let task = self.get_task(task_id).await?;
            if task.status.is_terminal() {
                return Ok(task);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn running_token(&self, task_id: &str) -> Option<CancellationToken> {
        self.inner
            .running
            .lock()
            .ok()
            .and_then(|running| running.get(task_id).cloned())
    }

    fn spawn(&self, task: DiscoveryTask) -> Result<()> {
        let token = CancellationToken::new();
        {
            let mut running = self
                .inner
                .running
                .lock()
                .map_err(|_| DiscoveryError::InvalidState("task registry poisoned".to_string()))?;
            match running.entry(task.task_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(DiscoveryError::InvalidState(format!(
                        "task {} is already running in this engine",
                        task.task_id
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(token.clone());
                }
            }
        }

        let engine = self.clone();
        tokio::spawn(async move {
            let task_id = task.task_id.clone();
            engine.run(task, token).await;
            if let Ok(mut running) = engine.inner.running.lock() {
                running.remove(&task_id);
            }
        });
        Ok(())
    }

    /// Drive one task to a terminal status and record it.
    ///
    /// The traversal runs as a child task so that a panic inside it is
    /// captured as a failed task instead of tearing down the worker.
    async fn run(&self, task: DiscoveryTask, cancel: CancellationToken) -> TaskStatus {
        let processed = Arc::new(AtomicUsize::new(task.processed_count));
        let task_id = task.task_id.clone();

        let traversal = {
            let engine = self.clone();
            let processed = processed.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { engine.traverse(&task, &processed, &cancel).await })
        };

        let (status, error_message) = match traversal.await {
            Ok(Ok(Outcome::Exhausted)) => (TaskStatus::Completed, None),
            Ok(Ok(Outcome::Cancelled)) => (TaskStatus::Cancelled, None),
            Ok(Err(e)) => (TaskStatus::Failed, Some(e.to_string())),
            Err(join_err) => (TaskStatus::Failed, Some(describe_join_error(join_err))),
        };

        let processed = processed.load(Ordering::SeqCst);
        match &error_message {
            Some(msg) => log::error!("Discovery task {} failed after {} nodes: {}", task_id, processed, msg),
            None => log::info!("Discovery task {} {} after {} nodes", task_id, status, processed),
        }

        if let Err(e) = store::finish_task(
            &self.inner.db,
            &task_id,
            status,
            processed,
            error_message.as_deref(),
        )
        .await
        {
            log::error!("Failed to record final status of task {}: {}", task_id, e);
        }
        status
    }

    async fn traverse(
        &self,
        task: &DiscoveryTask,
        processed: &AtomicUsize,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let settings = task.settings();
        let seed = Seed {
            value: task.seed.clone(),
            kind: task.seed_kind,
        };
        let expander = NodeExpander::new(self.inner.source.clone(), settings.branching_factor);
        let mut frontier = Frontier::seeded(settings.mode, settings.max_depth, seed.node());
        let mut count = processed.load(Ordering::SeqCst);

        while !frontier.is_empty() && count < task.max_total_items {
            if cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }

            let node = match frontier.select() {
                Some(Selection::Expand(node)) => node,
                Some(Selection::Discarded(node)) => {
                    log::debug!("Task {}: {} reached max depth, dropped", task.task_id, node.id);
                    continue;
                }
                None => break,
            };

            let children = tokio::select! {
                _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
                children = expander.expand(&node) => children,
            };

            count += 1;
            processed.store(count, Ordering::SeqCst);

            if let Err(e) =
                store::record_expansion(&self.inner.db, &task.task_id, &node, children.len()).await
            {
                log::warn!("Task {}: audit write failed for {}: {}", task.task_id, node.id, e);
            }
            match store::update_progress(&self.inner.db, &task.task_id, count, frontier.len(), &node.id)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    // Another engine finished the row (e.g. a cancel from a second process).
                    log::info!("Task {}: record is no longer running, stopping", task.task_id);
                    return Ok(Outcome::Cancelled);
                }
                Err(e) => log::warn!("Task {}: progress write failed: {}", task.task_id, e),
            }

            let offered = children.len();
            let admitted = frontier.admit_children(children, settings.branching_factor);
            log::debug!(
                "Task {}: processed {} (depth {}), {} candidates, {} admitted, frontier {}",
                task.task_id,
                node.id,
                node.depth,
                offered,
                admitted,
                frontier.len()
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
                _ = tokio::time::sleep(self.inner.node_delay) => {}
            }
        }

        Ok(Outcome::Exhausted)
    }
}

fn describe_join_error(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "traversal task was aborted".to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("traversal panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("traversal panicked: {}", msg)
    } else {
        "traversal panicked".to_string()
    }
}
