//! Wire framing for protocol messages.
//!
//! Every message on the wire is length-prefixed:
//!
//! ```text
//! [4 bytes: payload length (u32-le)] [N bytes: bincode payload]
//! ```
//!
//! The reader side pulls the 4-byte header, validates the length against
//! `max_message_size`, then reads exactly that many bytes and decodes the
//! [`Message`].

use {
    crate::error::{NetError, Result},
    quiesce_engine::Message,
};

/// Length of the frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Serialize `msg` with a 4-byte little-endian length prefix.
pub fn encode_frame(msg: &Message, max_size: usize) -> Result<Vec<u8>> {
    let payload = bincode::serialize(msg)?;
    // The length must fit the u32 header even when the configured cap is
    // larger.
    let cap = max_size.min(u32::MAX as usize);
    if payload.len() > cap {
        return Err(NetError::MessageTooLarge {
            size: payload.len(),
            max: cap,
        });
    }
    let len = payload.len() as u32;
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN.saturating_add(payload.len()));
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Read the payload length from a frame header.
pub fn read_frame_len(header: &[u8; FRAME_HEADER_LEN]) -> usize {
    u32::from_le_bytes(*header) as usize
}

/// Decode a message from a frame payload.
pub fn decode(payload: &[u8]) -> Result<Message> {
    bincode::deserialize(payload).map_err(NetError::Serialization)
}

#[cfg(test)]
mod tests {
    use {super::*, quiesce_engine::PeerId};

    #[test]
    fn test_framed_roundtrip() {
        let msg = Message::compute(PeerId::from("a"), PeerId::from("b"));
        let framed = encode_frame(&msg, 1_024).unwrap();
        let len = read_frame_len(framed[..FRAME_HEADER_LEN].try_into().unwrap());
        assert_eq!(len, framed.len() - FRAME_HEADER_LEN);
        let decoded = decode(&framed[FRAME_HEADER_LEN..]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_broadcast_roundtrip() {
        let msg = Message::terminate(PeerId::from("root"));
        let framed = encode_frame(&msg, 1_024).unwrap();
        let decoded = decode(&framed[FRAME_HEADER_LEN..]).unwrap();
        assert!(decoded.is_broadcast());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_message_too_large() {
        let msg = Message::join(PeerId::from("a"), PeerId::from("b"));
        assert!(matches!(
            encode_frame(&msg, 1),
            Err(NetError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_garbage_payload_fails_cleanly() {
        assert!(decode(&[0xff; 16]).is_err());
    }
}
