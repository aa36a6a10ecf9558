//! The workload generator ("predictor").
//!
//! Drives the synthetic diffusing computation: while the node is active it
//! repeatedly decides — by coin flip against `p_idle` and a lifetime cap on
//! originated `Compute`s — whether to go idle or send one `Compute` to a
//! uniformly random remote peer.
//!
//! Randomness sits behind [`WorkloadRng`] so tests can script the exact
//! decision sequence.  The one-time root re-activation rule lives here, not
//! in the engine: it bootstraps the simulation and has nothing to do with
//! the correctness of the detection algorithm.

use {
    crate::{
        engine::TerminationEngine,
        error::Result,
        types::Message,
    },
    log::*,
    rand::Rng,
};

/// The two random decisions the workload contract requires: a uniform pick
/// among peers and an independent idle/active coin flip.
pub trait WorkloadRng {
    /// Uniformly random index in `[0, n)`.
    fn pick_peer_index(&mut self, n: usize) -> usize;

    /// Bernoulli trial with probability `p_idle` of returning true.
    fn go_idle(&mut self, p_idle: f64) -> bool;
}

/// Production RNG backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRng;

impl WorkloadRng for SystemRng {
    fn pick_peer_index(&mut self, n: usize) -> usize {
        rand::rng().random_range(0..n)
    }

    fn go_idle(&mut self, p_idle: f64) -> bool {
        rand::rng().random_bool(p_idle)
    }
}

/// What one workload decision resolved to.
#[derive(Debug)]
pub enum StepOutcome {
    /// The node is idle; nothing to decide until it is re-engaged.
    Parked,
    /// The node has terminated; the generator must stop entirely.
    Halted,
    /// One `Compute` was sent.
    Sent {
        /// The message to enqueue outbound.
        message: Message,
    },
    /// The node went idle, flushing credit (and possibly detaching or, for
    /// the root, broadcasting `Terminate`).
    WentIdle {
        /// Flush/detach/terminate traffic to enqueue outbound, in order.
        messages: Vec<Message>,
    },
}

/// Synthetic workload decision logic.
pub struct Predictor<R: WorkloadRng> {
    rng: R,
    /// `Compute`s originated so far (lifetime, not per activation).
    sent_total: u32,
    /// The root's one-shot first-idle re-activation has fired.
    root_bootstrapped: bool,
}

impl<R: WorkloadRng> Predictor<R> {
    /// Create a predictor over the given randomness source.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            sent_total: 0,
            root_bootstrapped: false,
        }
    }

    /// Run one workload decision against the engine.
    ///
    /// The caller holds the same lock the dispatch loop uses; every ledger
    /// mutation in here happens through the engine under that lock.
    pub fn step(&mut self, engine: &mut TerminationEngine) -> Result<StepOutcome> {
        if engine.terminated() {
            return Ok(StepOutcome::Halted);
        }
        if !engine.ledger().active() {
            return Ok(StepOutcome::Parked);
        }

        let p_idle = engine.config().p_idle;
        let cap = engine.config().max_compute_messages;

        if self.sent_total >= cap || self.rng.go_idle(p_idle) {
            let mut output = engine.go_idle()?;
            if engine.is_root() {
                if !self.root_bootstrapped {
                    // First-ever idle transition of the root: re-engage once
                    // instead of settling, so the computation actually starts.
                    self.root_bootstrapped = true;
                    debug!("predictor: root bootstrap re-activation");
                    engine.reactivate();
                } else if let Some(broadcast) = engine.root_settle() {
                    output.messages.push(broadcast);
                }
            }
            return Ok(StepOutcome::WentIdle {
                messages: output.messages,
            });
        }

        let peer_count = engine.config().peers.len();
        let index = self.rng.pick_peer_index(peer_count);
        let target = engine.config().peers[index].clone();
        let message = engine.record_compute_send(&target);
        self.sent_total += 1;
        trace!(
            "predictor: compute {}/{} to {target}",
            self.sent_total,
            cap
        );
        Ok(StepOutcome::Sent { message })
    }
}
