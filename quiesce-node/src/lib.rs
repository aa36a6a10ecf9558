//! Node runtime for the quiesce termination-detection protocol.
//!
//! Glues the deterministic engine (`quiesce-engine`) to the blocking TCP
//! transport (`quiesce-net`) with four service threads per node:
//!
//! - the listener's accept/reader threads feed the inbound queue,
//! - the dispatch loop applies inbound messages to the engine,
//! - the predictor drives the synthetic workload,
//! - the sender drains the outbound queue to the per-peer streams.
//!
//! The engine sits behind one mutex; the dispatch loop and the predictor
//! are its only writers.

pub mod dispatch;
pub mod node;
pub mod predictor_service;
pub mod shared;

pub use {
    dispatch::DispatchService,
    node::{Node, NodeConfig, NodeError},
    predictor_service::PredictorService,
    shared::{EngineCell, SharedEngine},
};
