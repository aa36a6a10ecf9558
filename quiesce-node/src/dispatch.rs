//! The dispatch loop: the single consumer of inbound protocol traffic.
//!
//! Every ledger transition driven by a received message happens here,
//! under the shared engine lock.  The loop also owns the shutdown
//! choreography: the grace pause before acknowledging a `Terminate`
//! broadcast, and the root's linger phase collecting `ControlAck`s so no
//! peer writes into a closed socket.

use {
    crate::shared::SharedEngine,
    crossbeam_channel::{Receiver, RecvTimeoutError, Sender},
    log::*,
    quiesce_engine::{EngineError, Message, MessageKind},
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::{self, Builder, JoinHandle},
        time::{Duration, Instant},
    },
};

/// How long a single inbound wait blocks before re-checking the exit flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub struct DispatchService {
    thread: JoinHandle<()>,
}

impl DispatchService {
    pub fn spawn(
        shared: SharedEngine,
        inbound: Receiver<Message>,
        outbound: Sender<Message>,
        exit: Arc<AtomicBool>,
    ) -> Self {
        let thread = Builder::new()
            .name("quiesceDispatch".to_string())
            .spawn(move || {
                Self::run(&shared, &inbound, &outbound, &exit);
                // Dropping `outbound` here is part of the shutdown protocol:
                // the sender service drains what is buffered, then closes the
                // streams.
            })
            .expect("failed to spawn dispatch thread");
        Self { thread }
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    fn run(
        shared: &SharedEngine,
        inbound: &Receiver<Message>,
        outbound: &Sender<Message>,
        exit: &AtomicBool,
    ) {
        let (is_root, peer_count, grace_delay, linger_budget) = shared.with(|engine| {
            let config = engine.config();
            (
                engine.is_root(),
                config.peers.len(),
                Duration::from_millis(config.grace_delay_ms),
                Duration::from_millis(config.linger_ms),
            )
        });
        let mut control_acks = 0usize;

        loop {
            if exit.load(Ordering::Relaxed) {
                debug!("dispatch: exit flag raised, stopping");
                break;
            }
            if shared.with(|engine| engine.terminated()) {
                if is_root {
                    Self::linger(inbound, control_acks, peer_count, linger_budget);
                }
                info!("dispatch: node terminated");
                break;
            }

            let msg = match inbound.recv_timeout(RECV_TIMEOUT) {
                Ok(msg) => msg,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("dispatch: inbound channel closed, stopping");
                    break;
                }
            };
            trace!("dispatch: handling {msg}");

            if msg.kind == MessageKind::ControlAck {
                control_acks += 1;
            }
            if msg.kind == MessageKind::Terminate {
                // Let in-flight traffic land before acknowledging shutdown.
                thread::sleep(grace_delay);
            }

            // Replies are enqueued before the lock is released: the predictor
            // mutates the same engine from another thread, and a transition's
            // output must reach the outbound FIFO in transition order or a
            // peer can observe a stale leave after a fresh join.
            let enqueued: Result<bool, EngineError> = shared.with(|engine| {
                let output = engine.handle_message(&msg)?;
                Ok(output
                    .messages
                    .into_iter()
                    .all(|reply| outbound.send(reply).is_ok()))
            });
            shared.notify();
            match enqueued {
                Ok(true) => {}
                Ok(false) => {
                    warn!("dispatch: outbound channel closed, stopping");
                    exit.store(true, Ordering::Relaxed);
                    return;
                }
                Err(e) => {
                    error!("dispatch: ledger invariant violated on {msg}: {e}");
                    exit.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    /// Root only: keep draining inbound traffic after the `Terminate`
    /// broadcast until every peer has confirmed with a `ControlAck` or the
    /// linger budget runs out.
    fn linger(
        inbound: &Receiver<Message>,
        mut control_acks: usize,
        peer_count: usize,
        budget: Duration,
    ) {
        let deadline = Instant::now() + budget;
        while control_acks < peer_count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    "dispatch: linger budget exhausted with {control_acks}/{peer_count} \
                     control acks"
                );
                return;
            }
            match inbound.recv_timeout(remaining.min(RECV_TIMEOUT)) {
                Ok(msg) if msg.kind == MessageKind::ControlAck => {
                    control_acks += 1;
                    trace!("dispatch: control ack {control_acks}/{peer_count}");
                }
                Ok(msg) => debug!("dispatch: discarding {msg} after termination"),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        debug!("dispatch: all {peer_count} control acks collected");
    }
}
