//! Error types for the termination detection engine.

use {crate::types::PeerId, thiserror::Error};

/// Errors raised by the engine and ledger.
///
/// Every variant except [`EngineError::Config`] indicates a violated ledger
/// invariant — a bug in the protocol logic, not a transient condition.  The
/// dispatch loop treats them as fatal: continuing after one risks declaring
/// termination while work is still outstanding.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An `Ack` arrived with no unacknowledged `Compute` to match it.
    #[error("ack from {0} with no outstanding compute credit")]
    CreditUnderflow(PeerId),

    /// A detach was attempted while no parent was set.
    #[error("detach attempted without a parent")]
    DetachWithoutParent,

    /// The withheld unit of parent credit was missing at detach time.
    #[error("no withheld credit toward parent {0} at detach")]
    MissingParentCredit(PeerId),

    /// Invalid protocol configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
