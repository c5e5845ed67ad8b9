use std::cell::Cell;

use crate::{config::RecordingSettings, engine::PipelineHandle, VisionEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Nothing recorded since creation or the last clear.
    Idle,
    Recording,
    /// Recording halted; captured data is still available.
    Stopped,
}

/// Drives the engine's append-only record buffer for one pipeline.
///
/// The buffer layout belongs to the engine. This type only tracks the
/// lifecycle and supplies the pre-allocation hint.
#[derive(Debug)]
pub struct SequenceRecorder {
    settings: RecordingSettings,
    state: Cell<RecordingState>,
}

impl SequenceRecorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            settings,
            state: Cell::new(RecordingState::Idle),
        }
    }

    pub fn start<E: VisionEngine>(
        &self,
        engine: &mut E,
        pipeline: PipelineHandle,
        expected_frames: Option<usize>,
    ) {
        let expected_frames = expected_frames.unwrap_or_else(|| self.settings.expected_frames());
        engine.pipeline_sequence_record_start(pipeline, expected_frames);
        self.state.set(RecordingState::Recording);
        tracing::info!(expected_frames, "sequence recording started");
    }

    pub fn stop<E: VisionEngine>(&self, engine: &mut E, pipeline: PipelineHandle) {
        engine.pipeline_sequence_record_stop(pipeline);
        if self.is_recording() {
            self.state.set(RecordingState::Stopped);
            tracing::info!("sequence recording stopped");
        }
    }

    /// Discards captured data. Recording, if active, continues into the
    /// emptied buffer.
    pub fn clear<E: VisionEngine>(&self, engine: &mut E, pipeline: PipelineHandle) {
        engine.pipeline_sequence_record_clear(pipeline);
        if self.state.get() == RecordingState::Stopped {
            self.state.set(RecordingState::Idle);
        }
    }

    /// Snapshot of the captured bytes.
    pub fn data<E: VisionEngine>(&self, engine: &E, pipeline: PipelineHandle) -> Vec<u8> {
        if self.is_recording() {
            tracing::warn!("reading sequence data while recording is active");
        }
        engine.pipeline_sequence_record_data(pipeline)
    }

    pub fn state(&self) -> RecordingState {
        self.state.get()
    }

    pub fn is_recording(&self) -> bool {
        self.state.get() == RecordingState::Recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Scenario, ScriptedEngine};

    #[test]
    fn lifecycle_moves_through_states() {
        let mut engine = ScriptedEngine::new(Scenario::default());
        let pipeline = engine.pipeline_create();
        let recorder = SequenceRecorder::new(RecordingSettings::default());

        assert_eq!(recorder.state(), RecordingState::Idle);
        recorder.start(&mut engine, pipeline, None);
        assert!(recorder.is_recording());
        recorder.stop(&mut engine, pipeline);
        assert_eq!(recorder.state(), RecordingState::Stopped);
        recorder.clear(&mut engine, pipeline);
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn stop_without_start_stays_idle() {
        let mut engine = ScriptedEngine::new(Scenario::default());
        let pipeline = engine.pipeline_create();
        let recorder = SequenceRecorder::new(RecordingSettings::default());

        recorder.stop(&mut engine, pipeline);
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(recorder.data(&engine, pipeline).is_empty());
    }
}
