//! Protocol configuration.
//!
//! The peer set, the root designation, and the synthetic workload knobs.
//! Everything here is treated as already-resolved constants at startup; the
//! engine performs no discovery.

use {
    crate::types::PeerId,
    serde::{Deserialize, Serialize},
    std::collections::HashSet,
};

/// Configuration shared by the engine and the workload generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// This node's identity.
    pub self_id: PeerId,

    /// The distinguished initiator of the diffusing computation.  Exactly
    /// one node in the system has `root_id == self_id`.
    pub root_id: PeerId,

    /// All *remote* peers (excludes `self_id`).  The peer set is fixed for
    /// the lifetime of a run.
    pub peers: Vec<PeerId>,

    /// Probability that an active node goes idle on a given workload
    /// decision, in `(0, 1]`.
    /// Default: 0.25.
    #[serde(default = "default_p_idle")]
    pub p_idle: f64,

    /// Total number of `Compute` messages this node may originate over the
    /// whole run.  Once exhausted, every workload decision resolves to
    /// "go idle".
    /// Default: 50.
    #[serde(default = "default_max_compute_messages")]
    pub max_compute_messages: u32,

    /// Pause before answering a `Terminate` broadcast with a `ControlAck`,
    /// giving in-flight messages time to drain (ms).
    /// Default: 200.
    #[serde(default = "default_grace_delay_ms")]
    pub grace_delay_ms: u64,

    /// Pacing between workload decisions (ms).
    /// Default: 10.
    #[serde(default = "default_decision_interval_ms")]
    pub decision_interval_ms: u64,

    /// How long the root keeps draining inbound traffic after broadcasting
    /// `Terminate`, waiting for every peer's `ControlAck` (ms).
    /// Default: 3000.
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
}

fn default_p_idle() -> f64 {
    0.25
}

fn default_max_compute_messages() -> u32 {
    50
}

fn default_grace_delay_ms() -> u64 {
    200
}

fn default_decision_interval_ms() -> u64 {
    10
}

fn default_linger_ms() -> u64 {
    3_000
}

impl ProtocolConfig {
    /// Build a config for `self_id` with default workload knobs.
    pub fn new(self_id: PeerId, root_id: PeerId, peers: Vec<PeerId>) -> Self {
        Self {
            self_id,
            root_id,
            peers,
            p_idle: default_p_idle(),
            max_compute_messages: default_max_compute_messages(),
            grace_delay_ms: default_grace_delay_ms(),
            decision_interval_ms: default_decision_interval_ms(),
            linger_ms: default_linger_ms(),
        }
    }

    /// Whether this node is the distinguished initiator.
    pub fn is_root(&self) -> bool {
        self.self_id == self.root_id
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peers.is_empty() {
            return Err(ConfigError::NoPeers);
        }
        if self.peers.contains(&self.self_id) {
            return Err(ConfigError::SelfInPeerList(self.self_id.clone()));
        }
        let unique: HashSet<&PeerId> = self.peers.iter().collect();
        if unique.len() != self.peers.len() {
            return Err(ConfigError::DuplicatePeer);
        }
        if !self.is_root() && !self.peers.contains(&self.root_id) {
            return Err(ConfigError::UnknownRoot(self.root_id.clone()));
        }
        if !(self.p_idle > 0.0 && self.p_idle <= 1.0) {
            return Err(ConfigError::InvalidIdleProbability(self.p_idle));
        }
        if self.max_compute_messages == 0 {
            return Err(ConfigError::InvalidComputeCap);
        }
        Ok(())
    }
}

/// Errors in protocol configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("peer list is empty")]
    NoPeers,
    #[error("own identity {0} listed as a remote peer")]
    SelfInPeerList(PeerId),
    #[error("duplicate entry in peer list")]
    DuplicatePeer,
    #[error("root {0} is not in the peer set")]
    UnknownRoot(PeerId),
    #[error("p_idle must be in (0, 1], got {0}")]
    InvalidIdleProbability(f64),
    #[error("max_compute_messages must be > 0")]
    InvalidComputeCap,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ProtocolConfig {
        ProtocolConfig::new(
            PeerId::from("a"),
            PeerId::from("a"),
            vec![PeerId::from("b"), PeerId::from("c")],
        )
    }

    #[test]
    fn test_valid_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_default_knobs() {
        let config = base_config();
        assert!((config.p_idle - 0.25).abs() < 1e-9);
        assert_eq!(config.max_compute_messages, 50);
        assert_eq!(config.grace_delay_ms, 200);
    }

    #[test]
    fn test_is_root() {
        let mut config = base_config();
        assert!(config.is_root());
        config.root_id = PeerId::from("b");
        assert!(!config.is_root());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_peer_list_rejected() {
        let mut config = base_config();
        config.peers.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoPeers)));
    }

    #[test]
    fn test_self_in_peer_list_rejected() {
        let mut config = base_config();
        config.peers.push(PeerId::from("a"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SelfInPeerList(_))
        ));
    }

    #[test]
    fn test_duplicate_peer_rejected() {
        let mut config = base_config();
        config.peers.push(PeerId::from("b"));
        assert!(matches!(config.validate(), Err(ConfigError::DuplicatePeer)));
    }

    #[test]
    fn test_unknown_root_rejected() {
        let mut config = base_config();
        config.root_id = PeerId::from("nowhere");
        assert!(matches!(config.validate(), Err(ConfigError::UnknownRoot(_))));
    }

    #[test]
    fn test_idle_probability_bounds() {
        let mut config = base_config();
        config.p_idle = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIdleProbability(_))
        ));
        config.p_idle = 1.0;
        assert!(config.validate().is_ok());
        config.p_idle = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_compute_cap_rejected() {
        let mut config = base_config();
        config.max_compute_messages = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidComputeCap)
        ));
    }
}
