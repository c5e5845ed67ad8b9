use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub recording: RecordingSettings,
    pub loader: LoaderConfig,
}

impl PipelineConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Sizing hints for sequence recording.
///
/// Only used to pre-allocate the engine's record buffer when the caller does
/// not pass an explicit frame count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub fps: u32,
    pub duration_seconds: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            duration_seconds: 5,
        }
    }
}

impl RecordingSettings {
    /// Number of frames to reserve when no explicit count is requested.
    pub fn expected_frames(&self) -> usize {
        self.fps as usize * self.duration_seconds as usize
    }
}

/// Configuration for asynchronous loads and readiness polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub ready_poll_interval_ms: u64,
    /// Upper bound for a single HTTP reference fetch.
    pub fetch_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval_ms: 50,
            fetch_timeout_ms: 30_000,
        }
    }
}

impl LoaderConfig {
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
