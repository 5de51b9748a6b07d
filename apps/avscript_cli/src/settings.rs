use anyhow::Context;
use avscript_core::EngineConfig;
use avscript_playback::PlaybackConfig;
use avscript_sync::AutosaveConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming a settings file when `--settings` is absent.
pub const SETTINGS_ENV: &str = "AVSCRIPT_SETTINGS";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub playback: PlaybackConfig,
    pub autosave: AutosaveConfig,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing settings in {}", path.display()))
    }

    /// Settings from `explicit`, else from `$AVSCRIPT_SETTINGS`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
