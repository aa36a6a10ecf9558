//! Error types for the transport layer.

use {quiesce_engine::PeerId, thiserror::Error};

/// Errors that can occur in the transport layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// Failed to serialize or deserialize a message.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Message exceeds the maximum allowed size.
    #[error("message too large: {size} bytes (max {max} bytes)")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Transport-level I/O error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Could not reach a peer within the configured retry budget.  The
    /// caller decides the exit path; nothing in this crate exits.
    #[error("connection to {peer} failed after {attempts} attempts")]
    RetriesExhausted {
        /// The unreachable peer.
        peer: PeerId,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// A message was routed to a peer with no open stream.
    #[error("no stream for peer {0}")]
    UnknownPeer(PeerId),

    /// The configured frame size cap cannot be encoded in the length
    /// header.
    #[error("max_message_size {0} does not fit the u32 frame header")]
    OversizedFrameLimit(usize),
}

/// Convenience result type for transport operations.
pub type Result<T> = std::result::Result<T, NetError>;
