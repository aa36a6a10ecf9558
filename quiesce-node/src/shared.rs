//! Shared engine state for the node's service threads.
//!
//! The dispatch loop and the workload generator both mutate the one
//! [`TerminationEngine`]; a single mutex keeps every ledger transition
//! atomic, and a condvar lets the generator park while the node is idle
//! instead of polling.

use {
    quiesce_engine::TerminationEngine,
    std::{
        sync::{Arc, Condvar, Mutex},
        time::Duration,
    },
};

/// The engine plus its wakeup signal.
pub struct EngineCell {
    engine: Mutex<TerminationEngine>,
    activity: Condvar,
}

/// Handle cloned into every service thread.
pub type SharedEngine = Arc<EngineCell>;

impl EngineCell {
    pub fn new(engine: TerminationEngine) -> SharedEngine {
        Arc::new(Self {
            engine: Mutex::new(engine),
            activity: Condvar::new(),
        })
    }

    /// Run `f` with the engine locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut TerminationEngine) -> R) -> R {
        let mut engine = self.engine.lock().unwrap();
        f(&mut engine)
    }

    /// Wake any thread parked in [`EngineCell::wait_for_activity`].
    pub fn notify(&self) {
        self.activity.notify_all();
    }

    /// Block until the node is active or terminated, or the timeout lapses.
    /// Returns whether the condition held on wakeup.
    pub fn wait_for_activity(&self, timeout: Duration) -> bool {
        let engine = self.engine.lock().unwrap();
        let (engine, _) = self
            .activity
            .wait_timeout_while(engine, timeout, |engine| {
                !engine.ledger().active() && !engine.terminated()
            })
            .unwrap();
        engine.ledger().active() || engine.terminated()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        quiesce_engine::{PeerId, ProtocolConfig},
        std::thread,
    };

    fn make_cell(root: bool) -> SharedEngine {
        let self_id = PeerId::from("n0");
        let root_id = if root { self_id.clone() } else { PeerId::from("n1") };
        let config = ProtocolConfig::new(self_id, root_id, vec![PeerId::from("n1")]);
        EngineCell::new(TerminationEngine::new(config).unwrap())
    }

    #[test]
    fn test_wait_returns_immediately_when_active() {
        // Root starts active.
        let cell = make_cell(true);
        assert!(cell.wait_for_activity(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_times_out_while_idle() {
        let cell = make_cell(false);
        assert!(!cell.wait_for_activity(Duration::from_millis(10)));
    }

    #[test]
    fn test_notify_wakes_waiter_after_activation() {
        let cell = make_cell(false);
        let waiter = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.wait_for_activity(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        cell.with(|engine| {
            engine
                .handle_message(&quiesce_engine::Message::compute(
                    PeerId::from("n1"),
                    PeerId::from("n0"),
                ))
                .unwrap()
        });
        cell.notify();
        assert!(waiter.join().unwrap());
    }
}
