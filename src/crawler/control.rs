//! Run control signals
//!
//! The orchestrator publishes the desired state of a run on a watch channel;
//! workers read it before every frontier pop and every fetch attempt.

use tokio::sync::watch;

/// Desired state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunControl {
    Run,
    Pause,
    Cancel,
}

/// Sending side, held by the orchestrator
#[derive(Debug)]
pub struct ControlSender {
    tx: watch::Sender<RunControl>,
}

/// Receiving side, cloned into every worker
#[derive(Debug, Clone)]
pub struct ControlHandle {
    rx: watch::Receiver<RunControl>,
}

/// Creates a control channel in the `Run` state
pub fn control_channel() -> (ControlSender, ControlHandle) {
    let (tx, rx) = watch::channel(RunControl::Run);
    (ControlSender { tx }, ControlHandle { rx })
}

impl ControlSender {
    /// Publishes a new state; `Cancel` is final and never overwritten
    pub fn send(&self, control: RunControl) {
        self.tx.send_if_modified(|current| {
            if *current == control || *current == RunControl::Cancel {
                return false;
            }
            *current = control;
            true
        });
    }

    pub fn current(&self) -> RunControl {
        *self.tx.borrow()
    }
}

impl ControlHandle {
    pub fn current(&self) -> RunControl {
        *self.rx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.current() == RunControl::Cancel
    }

    /// Waits while the run is paused
    ///
    /// Returns false if the run is cancelled (or the orchestrator is gone).
    pub async fn wait_until_runnable(&mut self) -> bool {
        loop {
            match *self.rx.borrow_and_update() {
                RunControl::Run => return true,
                RunControl::Cancel => return false,
                RunControl::Pause => {}
            }
            if self.rx.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Resolves on the next state change
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            // Sender dropped: nothing will change again
            std::future::pending::<()>().await;
        }
    }
}
