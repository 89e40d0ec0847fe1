//! Engine facade: one table lineage, its history and at most one pending
//! clustering proposal.
//!
//! Every request is validated against the current table before anything is
//! recorded. A rejected request leaves the table, the history and the
//! pseudonym map untouched. Starting a new clustering pass always drops the
//! previous proposal, even when that pass fails or is cancelled.

use std::ops::ControlFlow;

use log::{debug, info};

use crate::{
    cluster::{self, Cluster, ClusterProposal, ClusterRequest, Progress},
    dataset::Table,
    error::{EngineError, Result},
    history::{self, History, Operation},
    ops::{ClusterMergeParams, Transform},
    pseudonym::PseudonymMap,
    remap::{self, ClusterSelection},
};

#[derive(Debug, Clone)]
pub struct Engine {
    original: Table,
    current: Table,
    history: History,
    pseudonyms: PseudonymMap,
    pending: Option<ClusterProposal>,
}

impl Engine {
    pub fn new(table: Table) -> Self {
        Self {
            current: table.clone(),
            original: table,
            history: History::new(),
            pseudonyms: PseudonymMap::new(),
            pending: None,
        }
    }

    /// Rebuilds the state a saved history describes by replaying its applied
    /// operations against `original`.
    pub fn from_history(original: Table, history: History) -> Result<Self> {
        let replayed = history::replay(&original, history.applied())?;
        Ok(Self {
            original,
            current: replayed.table,
            history,
            pseudonyms: replayed.pseudonyms,
            pending: None,
        })
    }

    pub fn original(&self) -> &Table {
        &self.original
    }

    pub fn current(&self) -> &Table {
        &self.current
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Map from the latest applied pseudonymization; empty when there is none.
    pub fn pseudonyms(&self) -> &PseudonymMap {
        &self.pseudonyms
    }

    pub fn pending_clusters(&self) -> Option<&[Cluster]> {
        self.pending.as_ref().map(|proposal| proposal.clusters.as_slice())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Applies an operation request and records it. Seeds, timestamps and
    /// derived column names are fixed at this point so replay is exact.
    pub fn apply(&mut self, request: Transform) -> Result<&Table> {
        let transform = request.resolved();
        let applied = transform.apply(&self.current)?;
        info!(
            "Applied {}: {} row(s) x {} column(s)",
            transform.kind_name(),
            applied.table.len(),
            applied.table.column_count()
        );
        self.history.push(Operation::new(transform));
        self.current = applied.table;
        if let Some(map) = applied.pseudonyms {
            self.pseudonyms = map;
        }
        self.pending = None;
        Ok(&self.current)
    }

    /// Proposes clusters for one column of the current table. The proposal
    /// replaces any earlier pending one; the returned selection is empty.
    pub fn propose_clusters(
        &mut self,
        request: ClusterRequest,
    ) -> Result<(Vec<Cluster>, ClusterSelection)> {
        self.propose_clusters_with_progress(request, |_| ControlFlow::Continue(()))
    }

    /// Like [`Engine::propose_clusters`], reporting progress to `observer`.
    /// A cancelled or failed pass leaves no proposal pending.
    pub fn propose_clusters_with_progress<F>(
        &mut self,
        request: ClusterRequest,
        mut observer: F,
    ) -> Result<(Vec<Cluster>, ClusterSelection)>
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        self.pending = None;
        let values = cluster::distinct_values(&self.current, &request.column)?;
        let clusters = cluster::cluster_values_with_progress(&values, &request, &mut observer)?;
        info!(
            "Found {} cluster(s) among {} distinct value(s) in '{}'",
            clusters.len(),
            values.len(),
            request.column
        );
        self.pending = Some(ClusterProposal {
            request,
            clusters: clusters.clone(),
        });
        Ok((clusters, ClusterSelection::new()))
    }

    /// Merges the accepted clusters of the pending proposal into the current
    /// table and records the merge. The proposal is consumed either way once
    /// the selection validates; accepting nothing records nothing.
    pub fn apply_cluster_merge(&mut self, selection: &ClusterSelection) -> Result<&Table> {
        let proposal = self.pending.as_ref().ok_or(EngineError::NoPendingClusters)?;
        let mapping = remap::build_merge_mapping(&proposal.clusters, selection)?;
        if mapping.is_empty() {
            debug!("No clusters accepted; discarding proposal");
            self.pending = None;
            return Ok(&self.current);
        }
        let request = proposal.request.clone();
        self.apply(Transform::Clustering(ClusterMergeParams { request, mapping }))
    }

    /// Drops the pending proposal without merging.
    pub fn discard_clusters(&mut self) {
        self.pending = None;
    }

    /// Steps back one operation by replaying the shorter prefix from the
    /// original table. Returns false when already at the original.
    pub fn undo(&mut self) -> Result<bool> {
        if !self.history.can_undo() {
            return Ok(false);
        }
        let mut history = self.history.clone();
        history.undo();
        let replayed = history::replay(&self.original, history.applied())?;
        debug!("Undo: cursor now {:?}", history.cursor());
        self.history = history;
        self.current = replayed.table;
        self.pseudonyms = replayed.pseudonyms;
        self.pending = None;
        Ok(true)
    }

    /// Re-applies the next recorded operation on top of the current table.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(operation) = self.history.next() else {
            return Ok(false);
        };
        let step = self.history.applied().len() + 1;
        let applied = history::apply_step(&self.current, operation, step)?;
        self.history.redo();
        debug!("Redo: cursor now {:?}", self.history.cursor());
        self.current = applied.table;
        if let Some(map) = applied.pseudonyms {
            self.pseudonyms = map;
        }
        self.pending = None;
        Ok(true)
    }

    /// Moves straight to `cursor` (`None` for the original table).
    pub fn seek(&mut self, cursor: Option<usize>) -> Result<()> {
        let mut history = self.history.clone();
        history.set_cursor(cursor)?;
        let replayed = history::replay(&self.original, history.applied())?;
        debug!("Seek: cursor now {:?}", history.cursor());
        self.history = history;
        self.current = replayed.table;
        self.pseudonyms = replayed.pseudonyms;
        self.pending = None;
        Ok(())
    }
}
