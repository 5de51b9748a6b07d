pub mod autosave;
pub mod error;
pub mod gate;

pub use autosave::{AutosaveConfig, AutosaveHandle, Autosaver, SaveStatus, ScriptStore};
pub use error::{Result, StoreError, SyncError};
pub use gate::{sync_from_script, GateGuard, GateState, SaveGate};
