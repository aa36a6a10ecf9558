//! The termination detection state machine.
//!
//! Implements Dijkstra–Scholten style credit/engagement tracking: each node
//! counts unacknowledged `Compute` messages per edge, maintains its place in
//! the dynamically-built engagement tree, and independently evaluates the
//! quiescence predicates from strictly local state plus message content.
//!
//! The engine is deterministic: given the same sequence of inputs it always
//! produces the same ledger transitions and output messages.  All I/O,
//! timing, and locking are handled externally; this module is pure
//! state-machine logic.

use {
    crate::{
        config::ProtocolConfig,
        error::Result,
        ledger::EngagementLedger,
        types::{Message, MessageKind, PeerId},
    },
    log::*,
};

/// Result of processing one engine transition.
#[derive(Debug, Default)]
pub struct EngineOutput {
    /// Messages to hand to the outbound queue, in order.
    pub messages: Vec<Message>,
}

impl EngineOutput {
    fn empty() -> Self {
        Self::default()
    }

    fn with_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// The per-node termination engine.
///
/// Owns the node's [`EngagementLedger`]; callers serialize access through a
/// single lock shared with the workload generator.
pub struct TerminationEngine {
    config: ProtocolConfig,
    ledger: EngagementLedger,
}

impl TerminationEngine {
    /// Create an engine from a validated configuration.
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let ledger = EngagementLedger::new(config.self_id.clone(), config.is_root());
        Ok(Self { config, ledger })
    }

    // -- Accessors --

    /// This node's identity.
    pub fn self_id(&self) -> &PeerId {
        &self.config.self_id
    }

    /// Whether this node is the distinguished initiator.
    pub fn is_root(&self) -> bool {
        self.ledger.is_root()
    }

    /// Whether this node has resolved to shut down.
    pub fn terminated(&self) -> bool {
        self.ledger.terminated()
    }

    /// Read-only view of the ledger.
    pub fn ledger(&self) -> &EngagementLedger {
        &self.ledger
    }

    /// The protocol configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    // -- Inbound transitions --

    /// Apply one inbound message to the ledger and produce the resulting
    /// outbound messages.
    ///
    /// Protocol violations (message addressed to another node, stray
    /// `Leave`/`Join`, non-root `ControlAck`) are logged and discarded so
    /// the dispatch loop keeps draining.  `Err` is returned only for ledger
    /// invariant violations, which are fatal to this node.
    pub fn handle_message(&mut self, msg: &Message) -> Result<EngineOutput> {
        if !self.addressed_to_self(msg) {
            warn!(
                "engine: discarding {} addressed to {:?}, not {}",
                msg.kind,
                msg.receiver,
                self.self_id()
            );
            return Ok(EngineOutput::empty());
        }

        if self.ledger.terminated() {
            // Everything after the shutdown decision is either a duplicate
            // broadcast or a straggling control ack; both are no-ops.
            debug!("engine: {} from {} after termination", msg.kind, msg.sender);
            return Ok(EngineOutput::empty());
        }

        match msg.kind {
            MessageKind::Compute => Ok(self.on_compute(&msg.sender)),
            MessageKind::Ack => self.on_ack(&msg.sender),
            MessageKind::Join => Ok(self.on_join(&msg.sender)),
            MessageKind::Leave => self.on_leave(&msg.sender),
            MessageKind::Terminate => Ok(self.on_terminate(&msg.sender)),
            MessageKind::ControlAck => Ok(self.on_control_ack(&msg.sender)),
        }
    }

    fn on_compute(&mut self, from: &PeerId) -> EngineOutput {
        let receipt = self.ledger.record_compute_received(from);
        if receipt.became_active {
            debug!("engine: re-engaged by compute from {from}");
        }
        if receipt.adopted_parent {
            info!("engine: adopted {from} as parent");
            return EngineOutput::with_messages(vec![Message::join(
                self.self_id().clone(),
                from.clone(),
            )]);
        }
        EngineOutput::empty()
    }

    fn on_ack(&mut self, from: &PeerId) -> Result<EngineOutput> {
        self.ledger.record_ack_received(from)?;
        self.settle()
    }

    fn on_join(&mut self, from: &PeerId) -> EngineOutput {
        if !self.ledger.add_child(from) {
            warn!("engine: duplicate join from {from}");
        } else {
            debug!("engine: {from} joined as child");
        }
        EngineOutput::empty()
    }

    fn on_leave(&mut self, from: &PeerId) -> Result<EngineOutput> {
        if !self.ledger.remove_child(from) {
            warn!("engine: leave from {from} which is not a child");
            return Ok(EngineOutput::empty());
        }
        debug!("engine: child {from} left");
        self.settle()
    }

    fn on_terminate(&mut self, from: &PeerId) -> EngineOutput {
        info!("engine: terminate received from {from}");
        self.ledger.mark_terminated();
        EngineOutput::with_messages(vec![Message::control_ack(
            self.self_id().clone(),
            from.clone(),
        )])
    }

    fn on_control_ack(&mut self, from: &PeerId) -> EngineOutput {
        if !self.is_root() {
            warn!("engine: control ack from {from} at non-root node");
            return EngineOutput::empty();
        }
        self.ledger.mark_terminated();
        EngineOutput::empty()
    }

    // -- Workload-driven transitions --

    /// Account for and build one outbound `Compute` to `target`.
    pub fn record_compute_send(&mut self, target: &PeerId) -> Message {
        self.ledger.record_compute_sent();
        Message::compute(self.self_id().clone(), target.clone())
    }

    /// Transition active→idle: flush all credit owed to neighbors as
    /// individual `Ack`s (withholding one unit toward the parent), then
    /// re-check the detach predicate — the node's own activity flag, not an
    /// inbound message, is what changed here.
    ///
    /// The root's quiescence check is deliberately *not* part of this
    /// transition; the workload generator decides between the one-time
    /// bootstrap re-activation and [`TerminationEngine::root_settle`].
    pub fn go_idle(&mut self) -> Result<EngineOutput> {
        if !self.ledger.active() {
            debug!("engine: go_idle on an already idle node");
            return Ok(EngineOutput::empty());
        }

        let mut messages = Vec::new();
        for (neighbor, count) in self.ledger.flush_credit_for_idle() {
            for _ in 0..count {
                messages.push(Message::ack(self.self_id().clone(), neighbor.clone()));
            }
        }

        if !self.is_root() {
            messages.extend(self.settle()?.messages);
        }
        Ok(EngineOutput::with_messages(messages))
    }

    /// Root-only: if the computation has quiesced, resolve to shut down and
    /// return the `Terminate` broadcast.
    pub fn root_settle(&mut self) -> Option<Message> {
        if self.ledger.root_quiescent() {
            info!("engine: root detected global quiescence");
            self.ledger.mark_terminated();
            return Some(Message::terminate(self.self_id().clone()));
        }
        None
    }

    /// Re-engage without an inbound `Compute` (root bootstrap only).
    pub fn reactivate(&mut self) {
        debug!("engine: reactivating");
        self.ledger.reactivate();
    }

    // -- Internal logic --

    /// Re-evaluate the quiescence predicates after a disengagement event
    /// (`Ack` received, child left, or went idle).
    fn settle(&mut self) -> Result<EngineOutput> {
        if let Some(broadcast) = self.root_settle() {
            return Ok(EngineOutput::with_messages(vec![broadcast]));
        }
        if self.ledger.ready_to_detach() {
            let parent = self.ledger.detach()?;
            info!("engine: detaching from parent {parent}");
            return Ok(EngineOutput::with_messages(vec![
                Message::ack(self.self_id().clone(), parent.clone()),
                Message::leave(self.self_id().clone(), parent),
            ]));
        }
        Ok(EngineOutput::empty())
    }

    /// A message is for us if it names us, or is a broadcast `Terminate`.
    fn addressed_to_self(&self, msg: &Message) -> bool {
        match &msg.receiver {
            Some(receiver) => receiver == self.self_id(),
            None => msg.kind == MessageKind::Terminate,
        }
    }
}
