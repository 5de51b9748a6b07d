pub mod collision;
pub mod config;
pub mod document;
pub mod dragging;
pub mod error;
pub mod history;
pub mod import;
pub mod reconcile;
pub mod resizing;
pub mod script;
pub mod session;
pub mod types;

pub use config::EngineConfig;
pub use document::{document_path, ExportBundle, TimelineDocument};
pub use error::{CoreError, Result};
pub use session::{TimelineEvent, TimelineSession};
pub use types::*;
