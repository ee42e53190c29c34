//! Frontier and visited set for a single discovery run.
//!
//! One double-ended queue serves both traversal modes: breadth-first pops from
//! the front and appends at the back, depth-first pushes new children to the
//! front so the most recently discovered child is always taken next.

use std::collections::{HashSet, VecDeque};

use crate::node::DiscoveryNode;
use crate::task::TraversalMode;

/// Result of asking the frontier for the next node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Expand this node.
    Expand(DiscoveryNode),
    /// Depth-first only: node already sits at the depth cap and was dropped unexpanded.
    Discarded(DiscoveryNode),
}

#[derive(Debug)]
pub struct Frontier {
    mode: TraversalMode,
    max_depth: u32,
    queue: VecDeque<DiscoveryNode>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(mode: TraversalMode, max_depth: u32) -> Self {
        Self {
            mode,
            max_depth,
            queue: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    /// Start a run from its depth-0 node.
    pub fn seeded(mode: TraversalMode, max_depth: u32, seed: DiscoveryNode) -> Self {
        let mut frontier = Self::new(mode, max_depth);
        frontier.visited.insert(seed.id.clone());
        frontier.queue.push_back(seed);
        frontier
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn has_visited(&self, node_id: &str) -> bool {
        self.visited.contains(node_id)
    }

    /// Take the next node according to the traversal mode.
    pub fn select(&mut self) -> Option<Selection> {
        let node = self.queue.pop_front()?;
        match self.mode {
            TraversalMode::BreadthFirst => Some(Selection::Expand(node)),
            TraversalMode::DepthFirst if node.depth >= self.max_depth => {
                Some(Selection::Discarded(node))
            }
            TraversalMode::DepthFirst => Some(Selection::Expand(node)),
        }
    }

    /// Admit one candidate. Returns false when it was already seen or lies past the depth cap.
    pub fn admit(&mut self, node: DiscoveryNode) -> bool {
        if node.depth > self.max_depth || self.visited.contains(&node.id) {
            return false;
        }
        self.visited.insert(node.id.clone());
        match self.mode {
            TraversalMode::BreadthFirst => self.queue.push_back(node),
            TraversalMode::DepthFirst => self.queue.push_front(node),
        }
        true
    }

    /// Offer the first `branching_factor` candidates in order; the rest are dropped.
    /// Returns the number admitted.
    pub fn admit_children<I>(&mut self, children: I, branching_factor: usize) -> usize
    where
        I: IntoIterator<Item = DiscoveryNode>,
    {
        let mut admitted = 0;
        for child in children.into_iter().take(branching_factor) {
            if self.admit(child) {
                admitted += 1;
            }
        }
        admitted
    }
}
