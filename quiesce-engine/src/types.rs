//! Core types for the termination detection protocol.
//!
//! Defines the peer identity token and the wire message vocabulary.  Every
//! byte sequence exchanged between peers is a length-prefixed bincode
//! encoding of [`Message`]; the framing itself lives in the transport crate.

use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

// ---------------------------------------------------------------------------
// Peer identity
// ---------------------------------------------------------------------------

/// Opaque, comparable identity of a peer process.
///
/// In practice a hostname or `host:port` string; the protocol only relies on
/// uniqueness and a total order, never on the content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer identity from any string-like token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The six message kinds of the engagement protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// One unit of synthetic computation; creates one unit of credit on the
    /// sender→receiver edge.
    Compute,
    /// Returns one unit of credit to the sender of a prior `Compute`.
    Ack,
    /// Announces that the sender adopted the receiver as its parent in the
    /// engagement tree.
    Join,
    /// Announces that the sender detached from the receiver (its parent).
    Leave,
    /// Broadcast by the root once the whole computation has quiesced.
    Terminate,
    /// Per-peer acknowledgment of a `Terminate` broadcast.
    ControlAck,
}

impl MessageKind {
    /// Short tag for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            MessageKind::Compute => "compute",
            MessageKind::Ack => "ack",
            MessageKind::Join => "join",
            MessageKind::Leave => "leave",
            MessageKind::Terminate => "terminate",
            MessageKind::ControlAck => "control_ack",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single protocol message.
///
/// `sender` is always filled in by the originating node.  `receiver` is
/// present for every kind except the `Terminate` broadcast, where `None`
/// means "all peers".  The per-kind constructors below enforce this, so a
/// hand-rolled `Message` literal is never needed outside of tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// What this message means to the receiving engine.
    pub kind: MessageKind,
    /// Identity of the originating node.
    pub sender: PeerId,
    /// Destination, or `None` for the `Terminate` broadcast.
    pub receiver: Option<PeerId>,
}

impl Message {
    /// One unit of synthetic work sent to `receiver`.
    pub fn compute(sender: PeerId, receiver: PeerId) -> Self {
        Self {
            kind: MessageKind::Compute,
            sender,
            receiver: Some(receiver),
        }
    }

    /// Return one unit of credit to `receiver`.
    pub fn ack(sender: PeerId, receiver: PeerId) -> Self {
        Self {
            kind: MessageKind::Ack,
            sender,
            receiver: Some(receiver),
        }
    }

    /// Tell `receiver` it became the sender's parent.
    pub fn join(sender: PeerId, receiver: PeerId) -> Self {
        Self {
            kind: MessageKind::Join,
            sender,
            receiver: Some(receiver),
        }
    }

    /// Tell `receiver` (the sender's parent) that the sender detached.
    pub fn leave(sender: PeerId, receiver: PeerId) -> Self {
        Self {
            kind: MessageKind::Leave,
            sender,
            receiver: Some(receiver),
        }
    }

    /// Root-only broadcast announcing global quiescence.
    pub fn terminate(sender: PeerId) -> Self {
        Self {
            kind: MessageKind::Terminate,
            sender,
            receiver: None,
        }
    }

    /// Acknowledge a `Terminate` broadcast back to its sender.
    pub fn control_ack(sender: PeerId, receiver: PeerId) -> Self {
        Self {
            kind: MessageKind::ControlAck,
            sender,
            receiver: Some(receiver),
        }
    }

    /// Whether this message fans out to every peer.
    pub fn is_broadcast(&self) -> bool {
        self.receiver.is_none()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.receiver {
            Some(receiver) => write!(f, "{} {}→{}", self.kind, self.sender, receiver),
            None => write!(f, "{} {}→*", self.kind, self.sender),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_ordering_and_display() {
        let a = PeerId::from("alpha");
        let b = PeerId::from("beta");
        assert!(a < b);
        assert_eq!(a.to_string(), "alpha");
        assert_eq!(b.as_str(), "beta");
    }

    #[test]
    fn test_constructors_set_receiver_presence() {
        let a = PeerId::from("a");
        let b = PeerId::from("b");
        assert_eq!(
            Message::compute(a.clone(), b.clone()).receiver,
            Some(b.clone())
        );
        assert!(Message::terminate(a.clone()).is_broadcast());
        assert!(!Message::control_ack(b, a).is_broadcast());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(MessageKind::Compute.tag(), "compute");
        assert_eq!(MessageKind::ControlAck.tag(), "control_ack");
    }

    #[test]
    fn test_message_display() {
        let msg = Message::join(PeerId::from("p1"), PeerId::from("p2"));
        assert_eq!(msg.to_string(), "join p1→p2");
        let msg = Message::terminate(PeerId::from("root"));
        assert_eq!(msg.to_string(), "terminate root→*");
    }
}
