pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod media;

pub use clock::{AudioElement, PlaybackClock, PlaybackState, TickOutcome};
pub use config::PlaybackConfig;
pub use driver::FrameDriver;
pub use error::{PlaybackError, Result};
pub use media::{load_all, FfmpegProbe, MediaProbe, TrackMedia};
