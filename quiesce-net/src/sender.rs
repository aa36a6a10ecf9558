//! Outbound side of the transport: the sender service.
//!
//! A single thread drains the node's outbound queue and writes framed
//! messages to the per-peer streams.  A `Terminate` broadcast (absent
//! receiver) fans out to every stream.  The loop keeps draining after the
//! producing side hangs up — crossbeam delivers everything enqueued before
//! the disconnect — so the final handshake messages always reach the wire
//! before the streams are shut down.

use {
    crate::{codec, error::NetError},
    crossbeam_channel::Receiver,
    log::*,
    quiesce_engine::{Message, PeerId},
    std::{
        collections::HashMap,
        io::Write,
        net::{Shutdown, TcpStream},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::{self, Builder, JoinHandle},
    },
};

/// The outbound drain thread.
pub struct SenderService {
    thread: JoinHandle<()>,
}

impl SenderService {
    /// Start the drain thread over the given channel set.
    ///
    /// A write failure is fatal to the node (the protocol cannot survive a
    /// lost channel): the error is logged and the exit flag raised.
    pub fn spawn(
        streams: HashMap<PeerId, TcpStream>,
        outbound: Receiver<Message>,
        max_message_size: usize,
        exit: Arc<AtomicBool>,
    ) -> Self {
        let thread = Builder::new()
            .name("quiesceTx".to_string())
            .spawn(move || {
                Self::run(streams, &outbound, max_message_size, &exit);
            })
            .expect("failed to spawn sender thread");
        Self { thread }
    }

    /// Wait for the drain thread to finish (it exits once the outbound
    /// channel is disconnected and fully drained).
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    fn run(
        mut streams: HashMap<PeerId, TcpStream>,
        outbound: &Receiver<Message>,
        max_message_size: usize,
        exit: &AtomicBool,
    ) {
        // `iter()` blocks on an empty channel and ends only after every
        // producer has dropped its sender AND the buffer is drained.
        for message in outbound.iter() {
            let frame = match codec::encode_frame(&message, max_message_size) {
                Ok(frame) => frame,
                Err(e) => {
                    // Our own message failed to serialize: a local bug.
                    error!("sender: failed to encode {message}: {e}");
                    exit.store(true, Ordering::Relaxed);
                    break;
                }
            };

            let result = match &message.receiver {
                Some(peer) => Self::send_to(&mut streams, peer, &frame),
                None => Self::broadcast(&mut streams, &frame),
            };

            if let Err(e) = result {
                error!("sender: transmission of {message} failed: {e}");
                exit.store(true, Ordering::Relaxed);
                break;
            }
            trace!("sender: transmitted {message}");
        }

        // Orderly release of every channel endpoint.
        for (peer, stream) in &streams {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("sender: shutdown of stream to {peer}: {e}");
            }
        }
        debug!("sender: outbound queue drained, streams closed");
    }

    fn send_to(
        streams: &mut HashMap<PeerId, TcpStream>,
        peer: &PeerId,
        frame: &[u8],
    ) -> Result<(), NetError> {
        let stream = streams
            .get_mut(peer)
            .ok_or_else(|| NetError::UnknownPeer(peer.clone()))?;
        stream.write_all(frame)?;
        stream.flush()?;
        Ok(())
    }

    fn broadcast(
        streams: &mut HashMap<PeerId, TcpStream>,
        frame: &[u8],
    ) -> Result<(), NetError> {
        for stream in streams.values_mut() {
            stream.write_all(frame)?;
            stream.flush()?;
        }
        Ok(())
    }
}
