use crate::error::{Result, SyncError};
use avscript_core::script::Segment;
use avscript_core::TimelineSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// What the persistence bridge is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    Idle,
    /// Reconciling with the upstream script. Writes wait.
    Syncing,
    /// A write is in flight. Reconciles wait.
    Saving,
}

/// Shared Idle/Syncing/Saving state machine.
///
/// Only `Idle -> Syncing` and `Idle -> Saving` can be entered, and only the
/// returned guard leads back to `Idle`, so the two activities never overlap.
#[derive(Debug, Clone)]
pub struct SaveGate {
    state: Arc<watch::Sender<GateState>>,
}

impl Default for SaveGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn try_begin_sync(&self) -> Result<GateGuard> {
        self.try_enter(GateState::Syncing)
    }

    pub fn try_begin_save(&self) -> Result<GateGuard> {
        self.try_enter(GateState::Saving)
    }

    /// Wait until the gate is idle, then enter `Syncing`.
    pub async fn begin_sync(&self) -> GateGuard {
        self.enter(GateState::Syncing).await
    }

    /// Wait until the gate is idle, then enter `Saving`.
    pub async fn begin_save(&self) -> GateGuard {
        self.enter(GateState::Saving).await
    }

    async fn enter(&self, target: GateState) -> GateGuard {
        let mut rx = self.state.subscribe();
        loop {
            if let Ok(guard) = self.try_enter(target) {
                return guard;
            }
            // The sender lives in self, so the channel cannot close here
            if rx.wait_for(|s| *s == GateState::Idle).await.is_err() {
                continue;
            }
        }
    }

    fn try_enter(&self, target: GateState) -> Result<GateGuard> {
        let mut current = GateState::Idle;
        let entered = self.state.send_if_modified(|s| {
            current = *s;
            if *s == GateState::Idle {
                *s = target;
                true
            } else {
                false
            }
        });
        if !entered {
            return Err(SyncError::Busy(current));
        }
        tracing::debug!(state = ?target, "Save gate entered");
        Ok(GateGuard {
            gate: self.clone(),
            held: target,
        })
    }
}

/// Holds the gate out of `Idle`. Dropping it returns the gate to `Idle`.
#[derive(Debug)]
pub struct GateGuard {
    gate: SaveGate,
    held: GateState,
}

impl GateGuard {
    pub fn state(&self) -> GateState {
        self.held
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        let held = self.held;
        self.gate.state.send_if_modified(|s| {
            if *s == held {
                *s = GateState::Idle;
                true
            } else {
                false
            }
        });
        tracing::debug!(state = ?held, "Save gate released");
    }
}

/// Reconcile `session` with `segment` while holding the gate in `Syncing`,
/// so no autosave write interleaves with it.
pub async fn sync_from_script(session: &mut TimelineSession, gate: &SaveGate, segment: &Segment) -> Result<bool> {
    let _guard = gate.begin_sync().await;
    Ok(session.apply_script(segment)?)
}
