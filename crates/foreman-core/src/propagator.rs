use crate::graph::StaleSet;
use crate::id::NodeId;
use crate::solver::SolveScope;
use std::collections::BTreeSet;

/// Collects stale nodes between solves.
///
/// Mutations feed their [`StaleSet`] through [`mark`](ChangePropagator::mark).
/// While paused the set only grows; the owner decides when to drain it with
/// [`take`](ChangePropagator::take) and hand the scope to the solver.
#[derive(Debug, Clone, Default)]
pub struct ChangePropagator {
    dirty: BTreeSet<NodeId>,
    all_dirty: bool,
    paused: bool,
}

impl ChangePropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add nodes whose rates are stale.
    pub fn mark(&mut self, stale: StaleSet) {
        if !self.all_dirty {
            self.dirty.extend(stale);
        }
    }

    /// Mark the whole graph stale, e.g. after a settings or catalog change.
    pub fn mark_all(&mut self) {
        self.all_dirty = true;
        self.dirty.clear();
    }

    /// Forget a node that no longer exists.
    pub fn forget(&mut self, node: NodeId) {
        self.dirty.remove(&node);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `true` when nothing is waiting to be solved.
    pub fn is_clean(&self) -> bool {
        !self.all_dirty && self.dirty.is_empty()
    }

    pub fn is_all_dirty(&self) -> bool {
        self.all_dirty
    }

    pub fn dirty_nodes(&self) -> &BTreeSet<NodeId> {
        &self.dirty
    }

    /// Drain the pending work into a solve scope, leaving the tracker clean.
    pub fn take(&mut self) -> SolveScope {
        if std::mem::take(&mut self.all_dirty) {
            self.dirty.clear();
            SolveScope::All
        } else {
            SolveScope::Nodes(std::mem::take(&mut self.dirty))
        }
    }
}
