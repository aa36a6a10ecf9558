//! Service thread driving the synthetic workload.
//!
//! Parks on the engine condvar while the node is idle, and while active
//! runs one workload decision per pacing interval, pushing any resulting
//! traffic onto the outbound queue.

use {
    crate::shared::SharedEngine,
    crossbeam_channel::Sender,
    log::*,
    quiesce_engine::{EngineError, Message, Predictor, StepOutcome, SystemRng},
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::{self, Builder, JoinHandle},
        time::Duration,
    },
};

/// How long one idle park lasts before re-checking the exit flag.
const PARK_TIMEOUT: Duration = Duration::from_millis(100);

/// What one decision-plus-enqueue pass resolved to.
enum Step {
    Park,
    Pace,
    Halt,
    Closed,
}

pub struct PredictorService {
    thread: JoinHandle<()>,
}

impl PredictorService {
    pub fn spawn(
        shared: SharedEngine,
        outbound: Sender<Message>,
        exit: Arc<AtomicBool>,
    ) -> Self {
        let thread = Builder::new()
            .name("quiescePredict".to_string())
            .spawn(move || {
                Self::run(&shared, &outbound, &exit);
            })
            .expect("failed to spawn predictor thread");
        Self { thread }
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    fn run(shared: &SharedEngine, outbound: &Sender<Message>, exit: &AtomicBool) {
        let pacing = shared.with(|engine| {
            Duration::from_millis(engine.config().decision_interval_ms)
        });
        let mut predictor = Predictor::new(SystemRng);

        loop {
            if exit.load(Ordering::Relaxed) {
                debug!("predictor: exit flag raised, stopping");
                break;
            }
            if !shared.wait_for_activity(PARK_TIMEOUT) {
                continue;
            }

            // One decision per lock acquisition, and any produced traffic is
            // enqueued before the lock is released, so the wire order always
            // matches the order of ledger transitions even while the
            // dispatch loop mutates the same engine.
            let step: Result<Step, EngineError> = shared.with(|engine| {
                match predictor.step(engine)? {
                    StepOutcome::Halted => Ok(Step::Halt),
                    StepOutcome::Parked => Ok(Step::Park),
                    StepOutcome::Sent { message } => {
                        trace!("predictor: enqueueing {message}");
                        if outbound.send(message).is_err() {
                            return Ok(Step::Closed);
                        }
                        Ok(Step::Pace)
                    }
                    StepOutcome::WentIdle { messages } => {
                        debug!("predictor: went idle, flushing {} messages", messages.len());
                        for message in messages {
                            if outbound.send(message).is_err() {
                                return Ok(Step::Closed);
                            }
                        }
                        Ok(Step::Pace)
                    }
                }
            });
            shared.notify();

            match step {
                Ok(Step::Park) => continue,
                Ok(Step::Pace) => thread::sleep(pacing),
                Ok(Step::Halt) => {
                    debug!("predictor: node terminated, stopping");
                    break;
                }
                Ok(Step::Closed) => {
                    warn!("predictor: outbound channel closed, stopping");
                    exit.store(true, Ordering::Relaxed);
                    break;
                }
                Err(e) => {
                    error!("predictor: ledger invariant violated: {e}");
                    exit.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }
    }
}
