//! Inbound side of the transport: accept loop and per-connection readers.
//!
//! One OS thread accepts connections; each accepted connection gets its own
//! reader thread that pulls length-prefixed frames off the socket, decodes
//! them, and pushes the resulting [`Message`]s into the node's inbound
//! queue.  Readers never touch protocol state — the queue is the only thing
//! they write to, which keeps all ledger mutation inside the dispatch loop.

use {
    crate::{
        codec::{self, FRAME_HEADER_LEN},
        error::Result,
    },
    crossbeam_channel::Sender,
    log::*,
    quiesce_engine::Message,
    std::{
        io::Read,
        net::{SocketAddr, TcpListener, TcpStream},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::{Builder, JoinHandle},
    },
};

/// A bound but not yet started listener.
///
/// Binding is split from starting so callers can bind every node first
/// (port 0 supported) and exchange the resolved addresses before any
/// connection attempts begin.
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind the inbound endpoint.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        info!("listener: bound on {local_addr}");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The resolved local address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start accepting connections, delivering every decoded message to
    /// `inbound`.  Spawns the accept thread and one reader thread per
    /// accepted connection.
    pub fn start(
        self,
        inbound: Sender<Message>,
        max_message_size: usize,
        exit: Arc<AtomicBool>,
    ) -> ListenerHandle {
        let local_addr = self.local_addr;
        let listener = self.listener;

        let thread = Builder::new()
            .name("quiesceListen".to_string())
            .spawn(move || {
                accept_loop(&listener, &inbound, max_message_size, &exit);
            })
            .expect("failed to spawn listener thread");

        ListenerHandle { thread, local_addr }
    }
}

/// Handle for shutting the accept thread down.
pub struct ListenerHandle {
    thread: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ListenerHandle {
    /// Stop accepting and join the accept thread.
    ///
    /// `accept` has no timeout, so a throwaway loopback connection is used
    /// to unblock it after the exit flag is raised.
    pub fn shutdown(self, exit: &AtomicBool) {
        exit.store(true, Ordering::Relaxed);
        let _ = TcpStream::connect(self.local_addr);
        if self.thread.join().is_err() {
            error!("listener: accept thread panicked");
        }
    }
}

fn accept_loop(
    listener: &TcpListener,
    inbound: &Sender<Message>,
    max_message_size: usize,
    exit: &Arc<AtomicBool>,
) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                if exit.load(Ordering::Relaxed) {
                    break;
                }
                debug!("listener: accepted connection from {addr}");
                let inbound = inbound.clone();
                let exit = Arc::clone(exit);
                let spawned = Builder::new().name("quiesceRx".to_string()).spawn(move || {
                    read_connection(stream, addr, &inbound, max_message_size, &exit);
                });
                if let Err(e) = spawned {
                    error!("listener: failed to spawn reader for {addr}: {e}");
                }
            }
            Err(e) => {
                if exit.load(Ordering::Relaxed) {
                    break;
                }
                error!("listener: accept error: {e}");
            }
        }
    }
    debug!("listener: accept loop on {:?} exited", listener.local_addr());
}

/// Read length-prefixed frames from `stream` until EOF, error, or exit.
fn read_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    inbound: &Sender<Message>,
    max_message_size: usize,
    exit: &AtomicBool,
) {
    let mut header = [0u8; FRAME_HEADER_LEN];

    loop {
        if exit.load(Ordering::Relaxed) {
            break;
        }

        // 1. Read the 4-byte length prefix.
        if let Err(e) = stream.read_exact(&mut header) {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                warn!("listener: header read error from {addr}: {e}");
            }
            break;
        }

        let len = codec::read_frame_len(&header);
        if len > max_message_size {
            warn!(
                "listener: peer {addr} sent oversized frame ({len} > {max_message_size}), \
                 dropping connection"
            );
            break;
        }

        // 2. Read the payload.
        let mut payload = vec![0u8; len];
        if let Err(e) = stream.read_exact(&mut payload) {
            warn!("listener: payload read error from {addr}: {e}");
            break;
        }

        // 3. Decode and forward.  A corrupt frame is a protocol violation:
        // logged and dropped with the connection, never a panic.
        match codec::decode(&payload) {
            Ok(message) => {
                trace!("listener: received {message} via {addr}");
                if inbound.send(message).is_err() {
                    // Dispatch loop is gone; shut down quietly.
                    debug!("listener: inbound channel closed, stopping reader for {addr}");
                    break;
                }
            }
            Err(e) => {
                warn!("listener: deserialization error from {addr}: {e}");
                break;
            }
        }
    }

    debug!("listener: connection from {addr} closed");
}
