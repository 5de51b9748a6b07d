use crate::history::DEFAULT_CAPACITY;
use crate::types::TimeUs;
use serde::{Deserialize, Serialize};

/// Tunables for the editing engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of undo snapshots kept.
    pub history_capacity: usize,
    /// Duration given to slides created for shots without one.
    pub default_slide_duration: TimeUs,
    /// Duration given to audio tracks whose length is unknown.
    pub default_audio_duration: TimeUs,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            default_slide_duration: TimeUs::from_seconds(3.0),
            default_audio_duration: TimeUs::from_seconds(3.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "history_capacity": 10 }"#).unwrap();
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.default_slide_duration, TimeUs(3_000_000));
        assert_eq!(config.default_audio_duration, TimeUs(3_000_000));
    }
}
