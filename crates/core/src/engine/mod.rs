//! Capability surface of the vision engine.
//!
//! The engine performs the actual image and motion processing and is treated
//! as a black box. Every object it manages is addressed through an opaque
//! handle that the core passes back on each call. Queries never fail loudly:
//! absent data is reported through sentinels (non-finite matrix elements,
//! negative scalars, empty buffers) which the core translates into `None`
//! exactly once, at the boundary where the value is handed to callers.

mod scripted;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use scripted::{
    CommandLog, EngineCommand, Scenario, ScriptedAnchor, ScriptedEngine, ScriptedFrame,
    ScriptedMesh, ScriptedTarget,
};

/// 4x4 column-major transformation matrix.
pub type Mat4 = [f32; 16];

/// Intrinsic camera parameters as reported by the engine.
pub type CameraModel = [f32; 6];

/// Identity transform.
pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Frame number reported before the engine has produced any frame.
pub const NEVER_ADVANCED: i64 = -1;

/// Stable identity of a tracked anchor, assigned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceHandle(pub u32);

/// Operations the core consumes from the vision engine.
///
/// There is a single concrete engine per process, so the core is generic
/// over this trait rather than holding a trait object.
pub trait VisionEngine {
    fn pipeline_create(&mut self) -> PipelineHandle;
    fn pipeline_destroy(&mut self, pipeline: PipelineHandle);
    /// Processes the next available frame from the active source, if any.
    fn pipeline_frame_update(&mut self, pipeline: PipelineHandle);
    fn pipeline_frame_number(&self, pipeline: PipelineHandle) -> i64;
    fn pipeline_camera_model(&self, pipeline: PipelineHandle) -> CameraModel;
    fn pipeline_camera_pose_default(&self, pipeline: PipelineHandle) -> Mat4;
    fn pipeline_camera_pose_with_attitude(&self, pipeline: PipelineHandle, mirror: bool) -> Mat4;
    fn pipeline_camera_pose_with_origin(&self, pipeline: PipelineHandle, origin: &Mat4) -> Mat4;
    fn pipeline_camera_frame_user_facing(&self, pipeline: PipelineHandle) -> bool;
    fn pipeline_sequence_record_start(&mut self, pipeline: PipelineHandle, expected_frames: usize);
    fn pipeline_sequence_record_stop(&mut self, pipeline: PipelineHandle);
    fn pipeline_sequence_record_clear(&mut self, pipeline: PipelineHandle);
    fn pipeline_sequence_record_data(&self, pipeline: PipelineHandle) -> Vec<u8>;

    fn image_tracker_create(&mut self, pipeline: PipelineHandle) -> TrackerHandle;
    fn image_tracker_destroy(&mut self, tracker: TrackerHandle);
    fn image_tracker_target_load_from_memory(&mut self, tracker: TrackerHandle, data: &[u8]);
    fn image_tracker_enabled(&self, tracker: TrackerHandle) -> bool;
    fn image_tracker_enabled_set(&mut self, tracker: TrackerHandle, enabled: bool);
    fn image_tracker_anchor_count(&self, tracker: TrackerHandle) -> usize;
    /// `index` must be below the current anchor count.
    fn image_tracker_anchor_id(&self, tracker: TrackerHandle, index: usize) -> AnchorId;
    fn image_tracker_anchor_pose_camera_relative(
        &self,
        tracker: TrackerHandle,
        index: usize,
        mirror: bool,
    ) -> Mat4;
    fn image_tracker_anchor_pose(
        &self,
        tracker: TrackerHandle,
        index: usize,
        camera_pose: &Mat4,
        mirror: bool,
    ) -> Mat4;
    fn image_tracker_target_count(&self, tracker: TrackerHandle) -> usize;
    fn image_tracker_target_physical_scale_factor(&self, tracker: TrackerHandle, index: usize)
        -> f32;
    fn image_tracker_target_radius_top(&self, tracker: TrackerHandle, index: usize) -> f32;
    fn image_tracker_target_radius_bottom(&self, tracker: TrackerHandle, index: usize) -> f32;
    fn image_tracker_target_side_length(&self, tracker: TrackerHandle, index: usize) -> f32;
    /// Encoded preview image; empty when the target file carries none.
    fn image_tracker_target_image(&self, tracker: TrackerHandle, index: usize) -> Vec<u8>;
    fn image_tracker_target_preview_mesh_vertices(
        &self,
        tracker: TrackerHandle,
        index: usize,
    ) -> Vec<f32>;
    fn image_tracker_target_preview_mesh_indices(
        &self,
        tracker: TrackerHandle,
        index: usize,
    ) -> Vec<u16>;
    fn image_tracker_target_preview_mesh_uvs(&self, tracker: TrackerHandle, index: usize)
        -> Vec<f32>;

    /// Id of the preferred front (`user_facing`) or rear camera.
    fn camera_default_device_id(&self, user_facing: bool) -> String;
    fn camera_source_create(&mut self, pipeline: PipelineHandle, device_id: &str) -> SourceHandle;
    fn sequence_source_create(&mut self, pipeline: PipelineHandle) -> SourceHandle;
    fn source_destroy(&mut self, source: SourceHandle);
    fn source_start(&mut self, source: SourceHandle);
    fn source_pause(&mut self, source: SourceHandle);
    fn sequence_source_load_from_memory(&mut self, source: SourceHandle, data: &[u8]);
    /// Seeks to `time_ms`; a negative value resumes wall-clock playback.
    fn sequence_source_time_set(&mut self, source: SourceHandle, time_ms: f64);

    /// Whether the engine has finished its own initialisation.
    fn loaded(&self) -> bool;
}

/// Maps a matrix-shaped engine result to `None` when it carries the
/// non-finite sentinel.
pub(crate) fn finite<const N: usize>(raw: [f32; N]) -> Option<[f32; N]> {
    raw.iter().all(|value| value.is_finite()).then_some(raw)
}

/// Maps a scalar engine result to `None` when it carries the negative
/// sentinel.
pub(crate) fn non_negative(raw: f32) -> Option<f32> {
    (raw >= 0.0).then_some(raw)
}
