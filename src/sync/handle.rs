//! EngineHandle - public API of the synchronization engine actor

use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

use super::commands::EngineCommand;
use super::engine::EngineState;

/// Handle for driving the engine
///
/// Cheap to clone. `enable` is fire-and-forget; `disable`, `sync` and
/// `shutdown` resolve once the actor processed them.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    state_rx: watch::Receiver<EngineState>,
}

impl EngineHandle {
    pub(crate) fn new(
        cmd_tx: mpsc::UnboundedSender<EngineCommand>,
        state_rx: watch::Receiver<EngineState>,
    ) -> Self {
        Self { cmd_tx, state_rx }
    }

    /// Start activating. Ignored unless the engine is inactive.
    pub fn enable(&self) {
        self.send(EngineCommand::Enable);
    }

    /// Tear down and restore provider names. Safe to call in any state.
    pub async fn disable(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(EngineCommand::Disable(Some(tx))) {
            let _ = rx.await;
        }
    }

    /// Wait until every command queued before this call was handled
    pub async fn sync(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(EngineCommand::Sync(tx)) {
            let _ = rx.await;
        }
    }

    /// Disable and stop the actor
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(EngineCommand::Shutdown(Some(tx))) {
            let _ = rx.await;
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Wait until the engine reaches `state`; false if the actor stopped first
    pub async fn wait_for_state(&self, state: EngineState) -> bool {
        let mut rx = self.state_rx.clone();
        let reached = rx.wait_for(|current| *current == state).await.is_ok();
        reached
    }

    fn send(&self, cmd: EngineCommand) -> bool {
        match self.cmd_tx.send(cmd) {
            Ok(()) => true,
            Err(e) => {
                warn!("Engine is not running, dropped {:?}", e.0);
                false
            }
        }
    }
}
