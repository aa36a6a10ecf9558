//! The Engagement Ledger: per-node credit and tree bookkeeping.
//!
//! Pure data container with the two quiescence predicates.  No I/O.  All
//! read-modify-write sequences touching more than one field are expressed
//! as single compound operations here, so callers holding the node's one
//! engine lock never need multi-step sequencing of their own.

use {
    crate::{
        error::{EngineError, Result},
        types::PeerId,
    },
    std::collections::{BTreeMap, BTreeSet},
};

/// What a received `Compute` did to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeReceipt {
    /// The node flipped idle→active because of this message.
    pub became_active: bool,
    /// The node adopted the sender as its parent (a `Join` is owed).
    pub adopted_parent: bool,
}

/// Per-node state of the engagement protocol.
///
/// Exactly one instance exists per node, created at process start and
/// mutated only under the node's single engine lock.
#[derive(Debug, Clone)]
pub struct EngagementLedger {
    self_id: PeerId,
    is_root: bool,
    active: bool,
    parent: Option<PeerId>,
    children: BTreeSet<PeerId>,
    outstanding_sent: u64,
    pending_credit: BTreeMap<PeerId, u64>,
    terminated: bool,
}

impl EngagementLedger {
    /// Create the ledger for `self_id`.  The root self-activates; every
    /// other node starts idle.
    pub fn new(self_id: PeerId, is_root: bool) -> Self {
        Self {
            self_id,
            is_root,
            active: is_root,
            parent: None,
            children: BTreeSet::new(),
            outstanding_sent: 0,
            pending_credit: BTreeMap::new(),
            terminated: false,
        }
    }

    // -- Accessors --

    /// This node's identity.
    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    /// Whether this node is the distinguished initiator.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Whether this node is locally engaged in the computation.
    pub fn active(&self) -> bool {
        self.active
    }

    /// Current parent in the engagement tree, if attached.
    pub fn parent(&self) -> Option<&PeerId> {
        self.parent.as_ref()
    }

    /// Peers that currently have this node as their parent.
    pub fn children(&self) -> &BTreeSet<PeerId> {
        &self.children
    }

    /// `Compute` messages sent but not yet acknowledged.
    pub fn outstanding_sent(&self) -> u64 {
        self.outstanding_sent
    }

    /// Credit owed to `neighbor`: `Compute`s received from it and not yet
    /// answered with an `Ack`.
    pub fn pending_credit(&self, neighbor: &PeerId) -> u64 {
        self.pending_credit.get(neighbor).copied().unwrap_or(0)
    }

    /// Whether this node has resolved to shut down.  Monotonic.
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    // -- Predicates --

    /// Root-only: the whole computation has quiesced from this node's view.
    pub fn root_quiescent(&self) -> bool {
        self.is_root && self.children.is_empty() && self.outstanding_sent == 0 && !self.active
    }

    /// Non-root: fully disengaged and still attached, so the detach
    /// handshake (`Ack` + `Leave` to the parent) may fire.
    pub fn ready_to_detach(&self) -> bool {
        !self.is_root
            && self.children.is_empty()
            && self.outstanding_sent == 0
            && !self.active
            && self.parent.is_some()
    }

    // -- Compound operations --

    /// Apply a received `Compute` from `from`: one unit of credit accrues,
    /// an idle node re-engages, and an unparented non-root node adopts the
    /// sender as its parent.
    pub fn record_compute_received(&mut self, from: &PeerId) -> ComputeReceipt {
        *self.pending_credit.entry(from.clone()).or_insert(0) += 1;

        let became_active = !self.active;
        self.active = true;

        // Parent adoption happens only on the idle→active edge while
        // unattached; a node already engaged keeps its existing parent.
        let adopted_parent = became_active && !self.is_root && self.parent.is_none();
        if adopted_parent {
            self.parent = Some(from.clone());
        }

        ComputeReceipt {
            became_active,
            adopted_parent,
        }
    }

    /// Apply a received `Ack` from `from`.  An `Ack` with nothing
    /// outstanding means the ledger (or the peer) lost count — fatal.
    pub fn record_ack_received(&mut self, from: &PeerId) -> Result<()> {
        if self.outstanding_sent == 0 {
            return Err(EngineError::CreditUnderflow(from.clone()));
        }
        self.outstanding_sent -= 1;
        Ok(())
    }

    /// Account for one `Compute` this node is about to send.
    pub fn record_compute_sent(&mut self) {
        self.outstanding_sent += 1;
    }

    /// Register `peer` as a child.  Returns false if it already was one.
    pub fn add_child(&mut self, peer: &PeerId) -> bool {
        self.children.insert(peer.clone())
    }

    /// Forget `peer` as a child.  Returns false if it was not one.
    pub fn remove_child(&mut self, peer: &PeerId) -> bool {
        self.children.remove(peer)
    }

    /// Go idle and flush credit: clears `active` and returns, per neighbor,
    /// how many `Ack`s to emit.  Exactly one unit of credit toward the
    /// current parent is withheld for the eventual detach handshake.
    pub fn flush_credit_for_idle(&mut self) -> Vec<(PeerId, u64)> {
        self.active = false;

        let mut flushed = Vec::new();
        for (neighbor, credit) in self.pending_credit.iter_mut() {
            let withheld = u64::from(self.parent.as_ref() == Some(neighbor));
            if *credit > withheld {
                flushed.push((neighbor.clone(), *credit - withheld));
                *credit = withheld;
            }
        }
        flushed
    }

    /// Detach from the current parent: clears the parent link and consumes
    /// the withheld unit of credit (the final `Ack` the caller emits).
    pub fn detach(&mut self) -> Result<PeerId> {
        let parent = self.parent.take().ok_or(EngineError::DetachWithoutParent)?;
        match self.pending_credit.get_mut(&parent) {
            Some(credit) if *credit > 0 => *credit -= 1,
            _ => return Err(EngineError::MissingParentCredit(parent)),
        }
        Ok(parent)
    }

    /// Resolve to shut down.  Monotonic; repeated calls are no-ops.
    pub fn mark_terminated(&mut self) {
        self.terminated = true;
    }

    /// Re-engage without an inbound `Compute`.  Only the workload
    /// generator's root bootstrap rule uses this.
    pub fn reactivate(&mut self) {
        self.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(s: &str) -> PeerId {
        PeerId::from(s)
    }

    #[test]
    fn test_root_starts_active() {
        let root = EngagementLedger::new(peer("r"), true);
        assert!(root.active());
        let other = EngagementLedger::new(peer("p"), false);
        assert!(!other.active());
    }

    #[test]
    fn test_compute_adopts_parent_only_on_activation_edge() {
        let mut ledger = EngagementLedger::new(peer("p"), false);

        let receipt = ledger.record_compute_received(&peer("a"));
        assert!(receipt.became_active);
        assert!(receipt.adopted_parent);
        assert_eq!(ledger.parent(), Some(&peer("a")));

        // Already active: more credit, but no new parent.
        let receipt = ledger.record_compute_received(&peer("b"));
        assert!(!receipt.became_active);
        assert!(!receipt.adopted_parent);
        assert_eq!(ledger.parent(), Some(&peer("a")));
        assert_eq!(ledger.pending_credit(&peer("a")), 1);
        assert_eq!(ledger.pending_credit(&peer("b")), 1);
    }

    #[test]
    fn test_root_never_adopts_parent() {
        let mut root = EngagementLedger::new(peer("r"), true);
        root.flush_credit_for_idle(); // go idle first
        let receipt = root.record_compute_received(&peer("a"));
        assert!(receipt.became_active);
        assert!(!receipt.adopted_parent);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_ack_underflow_is_fatal() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        assert!(matches!(
            ledger.record_ack_received(&peer("a")),
            Err(EngineError::CreditUnderflow(_))
        ));
    }

    #[test]
    fn test_sent_and_acked_credit_balances() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        ledger.record_compute_sent();
        ledger.record_compute_sent();
        assert_eq!(ledger.outstanding_sent(), 2);
        ledger.record_ack_received(&peer("a")).unwrap();
        ledger.record_ack_received(&peer("a")).unwrap();
        assert_eq!(ledger.outstanding_sent(), 0);
    }

    #[test]
    fn test_flush_withholds_one_unit_toward_parent() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        ledger.record_compute_received(&peer("a")); // parent, credit 1
        ledger.record_compute_received(&peer("a")); // credit 2
        ledger.record_compute_received(&peer("b")); // credit 1

        let flushed = ledger.flush_credit_for_idle();
        assert!(!ledger.active());
        assert_eq!(flushed, vec![(peer("a"), 1), (peer("b"), 1)]);
        assert_eq!(ledger.pending_credit(&peer("a")), 1);
        assert_eq!(ledger.pending_credit(&peer("b")), 0);
    }

    #[test]
    fn test_flush_with_single_parent_credit_sends_nothing() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        ledger.record_compute_received(&peer("a"));
        let flushed = ledger.flush_credit_for_idle();
        assert!(flushed.is_empty());
        assert_eq!(ledger.pending_credit(&peer("a")), 1);
    }

    #[test]
    fn test_detach_consumes_withheld_credit() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        ledger.record_compute_received(&peer("a"));
        ledger.flush_credit_for_idle();
        assert!(ledger.ready_to_detach());

        let parent = ledger.detach().unwrap();
        assert_eq!(parent, peer("a"));
        assert!(ledger.parent().is_none());
        assert_eq!(ledger.pending_credit(&peer("a")), 0);
    }

    #[test]
    fn test_detach_without_parent_is_fatal() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        assert!(matches!(
            ledger.detach(),
            Err(EngineError::DetachWithoutParent)
        ));
    }

    #[test]
    fn test_root_quiescent_predicate() {
        let mut root = EngagementLedger::new(peer("r"), true);
        assert!(!root.root_quiescent()); // still active
        root.flush_credit_for_idle();
        assert!(root.root_quiescent());

        root.record_compute_sent();
        assert!(!root.root_quiescent()); // outstanding credit
        root.record_ack_received(&peer("a")).unwrap();
        assert!(root.root_quiescent());

        root.add_child(&peer("a"));
        assert!(!root.root_quiescent()); // attached child
        root.remove_child(&peer("a"));
        assert!(root.root_quiescent());
    }

    #[test]
    fn test_ready_to_detach_requires_parent_and_no_engagement() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        assert!(!ledger.ready_to_detach()); // no parent

        ledger.record_compute_received(&peer("a"));
        assert!(!ledger.ready_to_detach()); // active

        ledger.flush_credit_for_idle();
        assert!(ledger.ready_to_detach());

        ledger.add_child(&peer("b"));
        assert!(!ledger.ready_to_detach()); // child attached
    }

    #[test]
    fn test_terminated_is_monotonic() {
        let mut ledger = EngagementLedger::new(peer("p"), false);
        assert!(!ledger.terminated());
        ledger.mark_terminated();
        ledger.mark_terminated();
        assert!(ledger.terminated());
    }
}
