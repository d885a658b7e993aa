use std::collections::HashSet;

use crate::FollowerId;

/// Outcome of comparing a local snapshot against a remote one
///
/// The three sets never overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Followers the store does not know about yet
    pub new_ids: HashSet<FollowerId>,
    /// Followers the store knows about that the remote source no longer
    /// lists
    pub gone_ids: HashSet<FollowerId>,
    /// Followers listed by the id-only listing but missing from the rich
    /// listing, which were then resolved by a direct lookup
    pub spare_ids: HashSet<FollowerId>,
}

impl ReconciliationResult {
    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty() && self.gone_ids.is_empty() && self.spare_ids.is_empty()
    }
}

/// Diff two identifier snapshots
pub fn reconcile(
    local: &HashSet<FollowerId>,
    remote: &HashSet<FollowerId>,
) -> ReconciliationResult {
    ReconciliationResult {
        new_ids: remote.difference(local).copied().collect(),
        gone_ids: local.difference(remote).copied().collect(),
        spare_ids: HashSet::new(),
    }
}

/// How a single record of the rich listing relates to what is known so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// Not in the store, needs an insert
    New,
    /// Already in the store, needs an update
    Existing,
    /// Already processed earlier in this walk
    Repeat,
}

/// Bookkeeping for a walk over the rich listing
///
/// Seeded with the local snapshot and the id-only remote snapshot. Every
/// observed id is removed from the pending copy of the id-only snapshot;
/// whatever is still pending once the walk is done are the spares.
#[derive(Debug, Clone)]
pub struct RichWalk {
    local: HashSet<FollowerId>,
    pending: HashSet<FollowerId>,
    walked: HashSet<FollowerId>,
    spares: HashSet<FollowerId>,
    resolved_spares: HashSet<FollowerId>,
}

impl RichWalk {
    pub fn new(local: HashSet<FollowerId>, remote_ids: &HashSet<FollowerId>) -> Self {
        Self {
            local,
            pending: remote_ids.clone(),
            walked: HashSet::new(),
            spares: HashSet::new(),
            resolved_spares: HashSet::new(),
        }
    }

    /// Record an id seen in the rich listing
    pub fn observe(&mut self, id: FollowerId) -> Sighting {
        if !self.walked.insert(id) {
            return Sighting::Repeat;
        }
        self.pending.remove(&id);
        self.classify(id)
    }

    /// Close the main walk and hand out the ids that still need a lookup
    ///
    /// Sorted, so lookups happen in a stable order.
    pub fn take_spares(&mut self) -> Vec<FollowerId> {
        self.spares = std::mem::take(&mut self.pending);
        let mut spares: Vec<_> = self.spares.iter().copied().collect();
        spares.sort_unstable();
        spares
    }

    /// Record a spare that a direct lookup confirmed as a follower
    ///
    /// Returns `None` if the id was not a spare, or was already resolved.
    pub fn resolve_spare(&mut self, id: FollowerId) -> Option<Sighting> {
        if !self.spares.contains(&id) || self.walked.contains(&id) {
            return None;
        }
        if !self.resolved_spares.insert(id) {
            return None;
        }
        Some(self.classify(id))
    }

    fn classify(&self, id: FollowerId) -> Sighting {
        if self.local.contains(&id) {
            Sighting::Existing
        } else {
            Sighting::New
        }
    }

    pub fn local(&self) -> &HashSet<FollowerId> {
        &self.local
    }

    pub fn finish(self) -> ReconciliationResult {
        let new_ids = self.walked.difference(&self.local).copied().collect();
        let gone_ids = self
            .local
            .iter()
            .filter(|id| !self.walked.contains(id) && !self.resolved_spares.contains(id))
            .copied()
            .collect();

        ReconciliationResult {
            new_ids,
            gone_ids,
            spare_ids: self.resolved_spares,
        }
    }
}
