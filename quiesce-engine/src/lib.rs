//! quiesce — distributed termination detection for diffusing computations.
//!
//! This crate is the pure protocol half of the system: it decides *when* a
//! distributed computation spread over a fixed peer set has quiesced, using
//! Dijkstra–Scholten style credit counting over a dynamically-built
//! engagement tree.
//!
//! # Protocol sketch
//!
//! 1. Every `Compute` message creates one unit of credit on its edge; the
//!    receiver owes an `Ack` for it.
//! 2. The first `Compute` that re-engages an idle non-root node makes the
//!    sender its parent (`Join`); the parent/children relation forms a
//!    spanning tree rooted at the initiator.
//! 3. Going idle flushes all owed credit as `Ack`s, except one unit
//!    withheld toward the parent.
//! 4. A node with no children, nothing outstanding, and no local activity
//!    returns that last unit and detaches (`Ack` + `Leave`).
//! 5. When the root itself is disengaged and childless, the computation
//!    has terminated; the root broadcasts `Terminate` and every peer
//!    answers with a `ControlAck`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             TerminationEngine                 │
//! │  ┌──────────┐   ┌─────────────────────────┐  │
//! │  │ Protocol │   │     EngagementLedger    │  │
//! │  │  Config  │   │ parent, children,       │  │
//! │  └──────────┘   │ credit counters, flags  │  │
//! │                 └─────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//!          ▲ messages              ▲ decisions
//!          │                       │
//!    dispatch loop            Predictor (workload)
//! ```
//!
//! All I/O, threading, and locking live in the `quiesce-net` and
//! `quiesce-node` crates; everything here is deterministic and
//! synchronous.

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod predictor;
pub mod types;

// Re-exports for convenience
pub use config::{ConfigError, ProtocolConfig};
pub use engine::{EngineOutput, TerminationEngine};
pub use error::{EngineError, Result};
pub use ledger::{ComputeReceipt, EngagementLedger};
pub use predictor::{Predictor, StepOutcome, SystemRng, WorkloadRng};
pub use types::{Message, MessageKind, PeerId};
