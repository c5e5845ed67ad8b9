use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::Path,
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use super::{
    AnchorId, CameraModel, Mat4, PipelineHandle, SourceHandle, TrackerHandle, VisionEngine,
    IDENTITY, NEVER_ADVANCED,
};
use crate::Result;

/// Playback interval used to map sequence timestamps onto recorded frames.
const FRAME_INTERVAL_MS: f64 = 1000.0 / 30.0;
const DEFAULT_CAMERA_MODEL: CameraModel = [500.0, 500.0, 320.0, 240.0, 0.0, 0.0];
const UNAVAILABLE: Mat4 = [f32::NAN; 16];
const REAR_CAMERA: &str = "scripted-rear";
const FRONT_CAMERA: &str = "scripted-front";

fn identity() -> Mat4 {
    IDENTITY
}

/// Script describing what the camera sees, frame by frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Frame number assigned to the first delivered frame.
    pub first_frame_number: i64,
    /// Number of `loaded()` polls answered with `false` before the engine
    /// reports itself ready.
    pub ready_after_polls: u32,
    pub camera_model: Option<CameraModel>,
    pub frames: Vec<ScriptedFrame>,
}

impl Scenario {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Builds a scenario where each frame lists the anchor ids in view.
    pub fn from_anchor_ids(first_frame_number: i64, frames: &[&[u64]]) -> Self {
        Self {
            first_frame_number,
            frames: frames
                .iter()
                .map(|ids| ScriptedFrame::with_ids(ids))
                .collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedFrame {
    pub anchors: Vec<ScriptedAnchor>,
    pub user_facing: bool,
}

impl ScriptedFrame {
    pub fn with_ids(ids: &[u64]) -> Self {
        Self {
            anchors: ids
                .iter()
                .map(|id| ScriptedAnchor {
                    id: AnchorId(*id),
                    pose: IDENTITY,
                })
                .collect(),
            user_facing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedAnchor {
    pub id: AnchorId,
    /// Camera-relative pose.
    #[serde(default = "identity")]
    pub pose: Mat4,
}

/// Content of a scripted target file. Fields left as `None` are reported
/// through the engine's negative sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedTarget {
    pub physical_scale_factor: Option<f32>,
    pub radius_top: Option<f32>,
    pub radius_bottom: Option<f32>,
    pub side_length: Option<f32>,
    pub image: Vec<u8>,
    pub preview: Option<ScriptedMesh>,
}

impl ScriptedTarget {
    /// Encodes a target file the scripted engine can load.
    pub fn encode_all(targets: &[ScriptedTarget]) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(targets)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedMesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
    pub uvs: Vec<f32>,
}

/// Observable side effects of the scripted engine, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    PipelineDestroyed(PipelineHandle),
    TrackerDestroyed(TrackerHandle),
    SourceStarted(SourceHandle),
    SourcePaused(SourceHandle),
    SourceDestroyed(SourceHandle),
    FrameDelivered {
        source: SourceHandle,
        frame_number: i64,
    },
}

/// Shared view of the commands an engine has executed.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Rc<RefCell<Vec<EngineCommand>>>);

impl CommandLog {
    pub fn entries(&self) -> Vec<EngineCommand> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, command: EngineCommand) {
        self.0.borrow_mut().push(command);
    }
}

#[derive(Debug)]
struct PipelineState {
    frame_number: i64,
    current: Option<ScriptedFrame>,
    recording: bool,
    record: Vec<u8>,
}

#[derive(Debug)]
struct TrackerState {
    pipeline: PipelineHandle,
    enabled: bool,
    targets: Vec<ScriptedTarget>,
}

#[derive(Debug)]
struct SourceState {
    pipeline: PipelineHandle,
    running: bool,
    feed: Feed,
}

#[derive(Debug)]
enum Feed {
    Camera {
        device_id: String,
        cursor: usize,
    },
    Sequence {
        frames: Vec<ScriptedFrame>,
        cursor: usize,
        seek: Option<usize>,
        last_seek: Option<usize>,
    },
}

/// Deterministic in-process engine that replays a [`Scenario`].
///
/// Camera sources deliver the scenario frames in order, one per frame update,
/// and stop producing frames once the script is exhausted. Recording appends
/// one JSON line per delivered frame; sequence sources accept exactly that
/// format back.
#[derive(Debug)]
pub struct ScriptedEngine {
    scenario: Scenario,
    next_handle: u32,
    pipelines: HashMap<PipelineHandle, PipelineState>,
    trackers: HashMap<TrackerHandle, TrackerState>,
    sources: HashMap<SourceHandle, SourceState>,
    polls_until_ready: Cell<u32>,
    log: CommandLog,
}

impl ScriptedEngine {
    pub fn new(scenario: Scenario) -> Self {
        let polls_until_ready = Cell::new(scenario.ready_after_polls);
        Self {
            scenario,
            next_handle: 1,
            pipelines: HashMap::new(),
            trackers: HashMap::new(),
            sources: HashMap::new(),
            polls_until_ready,
            log: CommandLog::default(),
        }
    }

    /// Handle onto the command log that stays valid after the engine has been
    /// moved into a pipeline.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Appends a frame to the live camera feed.
    pub fn push_camera_frame(&mut self, frame: ScriptedFrame) {
        self.scenario.frames.push(frame);
    }

    pub fn is_running(&self, source: SourceHandle) -> bool {
        self.sources
            .get(&source)
            .map(|state| state.running)
            .unwrap_or(false)
    }

    fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn current_frame(&self, pipeline: PipelineHandle) -> Option<&ScriptedFrame> {
        self.pipelines
            .get(&pipeline)
            .and_then(|state| state.current.as_ref())
    }

    fn detected(&self, tracker: TrackerHandle) -> &[ScriptedAnchor] {
        self.trackers
            .get(&tracker)
            .filter(|state| state.enabled)
            .and_then(|state| self.current_frame(state.pipeline))
            .map(|frame| frame.anchors.as_slice())
            .unwrap_or(&[])
    }

    fn target(&self, tracker: TrackerHandle, index: usize) -> Option<&ScriptedTarget> {
        self.trackers
            .get(&tracker)
            .and_then(|state| state.targets.get(index))
    }

    fn scalar(
        &self,
        tracker: TrackerHandle,
        index: usize,
        field: impl Fn(&ScriptedTarget) -> Option<f32>,
    ) -> f32 {
        self.target(tracker, index).and_then(field).unwrap_or(-1.0)
    }

    fn next_frame(&mut self, source: SourceHandle) -> Option<ScriptedFrame> {
        let camera_frames = &self.scenario.frames;
        let state = self.sources.get_mut(&source)?;
        match &mut state.feed {
            Feed::Camera { cursor, .. } => {
                let frame = camera_frames.get(*cursor)?.clone();
                *cursor += 1;
                Some(frame)
            }
            Feed::Sequence {
                frames,
                cursor,
                seek,
                last_seek,
            } => match *seek {
                Some(index) => {
                    if *last_seek == Some(index) {
                        return None;
                    }
                    let frame = frames.get(index)?.clone();
                    *last_seek = Some(index);
                    *cursor = index + 1;
                    Some(frame)
                }
                None => {
                    let frame = frames.get(*cursor)?.clone();
                    *cursor += 1;
                    Some(frame)
                }
            },
        }
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new(Scenario::default())
    }
}

impl VisionEngine for ScriptedEngine {
    fn pipeline_create(&mut self) -> PipelineHandle {
        let handle = PipelineHandle(self.allocate());
        self.pipelines.insert(
            handle,
            PipelineState {
                frame_number: NEVER_ADVANCED,
                current: None,
                recording: false,
                record: Vec::new(),
            },
        );
        handle
    }

    fn pipeline_destroy(&mut self, pipeline: PipelineHandle) {
        if self.pipelines.remove(&pipeline).is_some() {
            self.log.push(EngineCommand::PipelineDestroyed(pipeline));
        }
    }

    fn pipeline_frame_update(&mut self, pipeline: PipelineHandle) {
        let running: Vec<SourceHandle> = self
            .sources
            .iter()
            .filter(|(_, state)| state.pipeline == pipeline && state.running)
            .map(|(handle, _)| *handle)
            .collect();
        if running.len() > 1 {
            tracing::warn!(count = running.len(), "more than one source running");
        }
        let Some(source) = running.first().copied() else {
            return;
        };
        let Some(frame) = self.next_frame(source) else {
            return;
        };
        let first_frame_number = self.scenario.first_frame_number;
        let Some(state) = self.pipelines.get_mut(&pipeline) else {
            return;
        };

        state.frame_number = if state.frame_number == NEVER_ADVANCED {
            first_frame_number
        } else {
            state.frame_number + 1
        };
        if state.recording {
            match serde_json::to_vec(&frame) {
                Ok(mut line) => {
                    line.push(b'\n');
                    state.record.extend_from_slice(&line);
                }
                Err(err) => tracing::warn!(%err, "failed to record frame"),
            }
        }
        state.current = Some(frame);

        let frame_number = state.frame_number;
        self.log.push(EngineCommand::FrameDelivered {
            source,
            frame_number,
        });
    }

    fn pipeline_frame_number(&self, pipeline: PipelineHandle) -> i64 {
        self.pipelines
            .get(&pipeline)
            .map(|state| state.frame_number)
            .unwrap_or(NEVER_ADVANCED)
    }

    fn pipeline_camera_model(&self, pipeline: PipelineHandle) -> CameraModel {
        match self.current_frame(pipeline) {
            Some(_) => self.scenario.camera_model.unwrap_or(DEFAULT_CAMERA_MODEL),
            None => [f32::NAN; 6],
        }
    }

    fn pipeline_camera_pose_default(&self, pipeline: PipelineHandle) -> Mat4 {
        match self.current_frame(pipeline) {
            Some(_) => IDENTITY,
            None => UNAVAILABLE,
        }
    }

    fn pipeline_camera_pose_with_attitude(&self, pipeline: PipelineHandle, mirror: bool) -> Mat4 {
        match self.current_frame(pipeline) {
            Some(_) => mirror_if(IDENTITY, mirror),
            None => UNAVAILABLE,
        }
    }

    fn pipeline_camera_pose_with_origin(&self, pipeline: PipelineHandle, origin: &Mat4) -> Mat4 {
        match self.current_frame(pipeline) {
            Some(_) => rigid_inverse(origin),
            None => UNAVAILABLE,
        }
    }

    fn pipeline_camera_frame_user_facing(&self, pipeline: PipelineHandle) -> bool {
        self.current_frame(pipeline)
            .map(|frame| frame.user_facing)
            .unwrap_or(false)
    }

    fn pipeline_sequence_record_start(&mut self, pipeline: PipelineHandle, expected_frames: usize) {
        if let Some(state) = self.pipelines.get_mut(&pipeline) {
            // Rough per-frame size of one JSON line with a couple of anchors.
            state.record.reserve(expected_frames.saturating_mul(256));
            state.recording = true;
        }
    }

    fn pipeline_sequence_record_stop(&mut self, pipeline: PipelineHandle) {
        if let Some(state) = self.pipelines.get_mut(&pipeline) {
            state.recording = false;
        }
    }

    fn pipeline_sequence_record_clear(&mut self, pipeline: PipelineHandle) {
        if let Some(state) = self.pipelines.get_mut(&pipeline) {
            state.record.clear();
        }
    }

    fn pipeline_sequence_record_data(&self, pipeline: PipelineHandle) -> Vec<u8> {
        self.pipelines
            .get(&pipeline)
            .map(|state| state.record.clone())
            .unwrap_or_default()
    }

    fn image_tracker_create(&mut self, pipeline: PipelineHandle) -> TrackerHandle {
        let handle = TrackerHandle(self.allocate());
        self.trackers.insert(
            handle,
            TrackerState {
                pipeline,
                enabled: true,
                targets: Vec::new(),
            },
        );
        handle
    }

    fn image_tracker_destroy(&mut self, tracker: TrackerHandle) {
        if self.trackers.remove(&tracker).is_some() {
            self.log.push(EngineCommand::TrackerDestroyed(tracker));
        }
    }

    fn image_tracker_target_load_from_memory(&mut self, tracker: TrackerHandle, data: &[u8]) {
        let Some(state) = self.trackers.get_mut(&tracker) else {
            return;
        };
        match serde_json::from_slice::<Vec<ScriptedTarget>>(data) {
            Ok(targets) => state.targets = targets,
            Err(err) => tracing::warn!(%err, "target file rejected by engine"),
        }
    }

    fn image_tracker_enabled(&self, tracker: TrackerHandle) -> bool {
        self.trackers
            .get(&tracker)
            .map(|state| state.enabled)
            .unwrap_or(false)
    }

    fn image_tracker_enabled_set(&mut self, tracker: TrackerHandle, enabled: bool) {
        if let Some(state) = self.trackers.get_mut(&tracker) {
            state.enabled = enabled;
        }
    }

    fn image_tracker_anchor_count(&self, tracker: TrackerHandle) -> usize {
        self.detected(tracker).len()
    }

    fn image_tracker_anchor_id(&self, tracker: TrackerHandle, index: usize) -> AnchorId {
        self.detected(tracker)
            .get(index)
            .map(|anchor| anchor.id)
            .unwrap_or(AnchorId(u64::MAX))
    }

    fn image_tracker_anchor_pose_camera_relative(
        &self,
        tracker: TrackerHandle,
        index: usize,
        mirror: bool,
    ) -> Mat4 {
        self.detected(tracker)
            .get(index)
            .map(|anchor| mirror_if(anchor.pose, mirror))
            .unwrap_or(UNAVAILABLE)
    }

    fn image_tracker_anchor_pose(
        &self,
        tracker: TrackerHandle,
        index: usize,
        camera_pose: &Mat4,
        mirror: bool,
    ) -> Mat4 {
        self.detected(tracker)
            .get(index)
            .map(|anchor| multiply(camera_pose, &mirror_if(anchor.pose, mirror)))
            .unwrap_or(UNAVAILABLE)
    }

    fn image_tracker_target_count(&self, tracker: TrackerHandle) -> usize {
        self.trackers
            .get(&tracker)
            .map(|state| state.targets.len())
            .unwrap_or(0)
    }

    fn image_tracker_target_physical_scale_factor(
        &self,
        tracker: TrackerHandle,
        index: usize,
    ) -> f32 {
        self.scalar(tracker, index, |target| target.physical_scale_factor)
    }

    fn image_tracker_target_radius_top(&self, tracker: TrackerHandle, index: usize) -> f32 {
        self.scalar(tracker, index, |target| target.radius_top)
    }

    fn image_tracker_target_radius_bottom(&self, tracker: TrackerHandle, index: usize) -> f32 {
        self.scalar(tracker, index, |target| target.radius_bottom)
    }

    fn image_tracker_target_side_length(&self, tracker: TrackerHandle, index: usize) -> f32 {
        self.scalar(tracker, index, |target| target.side_length)
    }

    fn image_tracker_target_image(&self, tracker: TrackerHandle, index: usize) -> Vec<u8> {
        self.target(tracker, index)
            .map(|target| target.image.clone())
            .unwrap_or_default()
    }

    fn image_tracker_target_preview_mesh_vertices(
        &self,
        tracker: TrackerHandle,
        index: usize,
    ) -> Vec<f32> {
        self.target(tracker, index)
            .and_then(|target| target.preview.as_ref())
            .map(|mesh| mesh.vertices.clone())
            .unwrap_or_default()
    }

    fn image_tracker_target_preview_mesh_indices(
        &self,
        tracker: TrackerHandle,
        index: usize,
    ) -> Vec<u16> {
        self.target(tracker, index)
            .and_then(|target| target.preview.as_ref())
            .map(|mesh| mesh.indices.clone())
            .unwrap_or_default()
    }

    fn image_tracker_target_preview_mesh_uvs(
        &self,
        tracker: TrackerHandle,
        index: usize,
    ) -> Vec<f32> {
        self.target(tracker, index)
            .and_then(|target| target.preview.as_ref())
            .map(|mesh| mesh.uvs.clone())
            .unwrap_or_default()
    }

    fn camera_default_device_id(&self, user_facing: bool) -> String {
        if user_facing {
            FRONT_CAMERA.to_string()
        } else {
            REAR_CAMERA.to_string()
        }
    }

    fn camera_source_create(&mut self, pipeline: PipelineHandle, device_id: &str) -> SourceHandle {
        let handle = SourceHandle(self.allocate());
        self.sources.insert(
            handle,
            SourceState {
                pipeline,
                running: false,
                feed: Feed::Camera {
                    device_id: device_id.to_string(),
                    cursor: 0,
                },
            },
        );
        handle
    }

    fn sequence_source_create(&mut self, pipeline: PipelineHandle) -> SourceHandle {
        let handle = SourceHandle(self.allocate());
        self.sources.insert(
            handle,
            SourceState {
                pipeline,
                running: false,
                feed: Feed::Sequence {
                    frames: Vec::new(),
                    cursor: 0,
                    seek: None,
                    last_seek: None,
                },
            },
        );
        handle
    }

    fn source_destroy(&mut self, source: SourceHandle) {
        if self.sources.remove(&source).is_some() {
            self.log.push(EngineCommand::SourceDestroyed(source));
        }
    }

    fn source_start(&mut self, source: SourceHandle) {
        if let Some(state) = self.sources.get_mut(&source) {
            if let Feed::Camera { device_id, .. } = &state.feed {
                tracing::debug!(device_id = %device_id, "camera started");
            }
            state.running = true;
            self.log.push(EngineCommand::SourceStarted(source));
        }
    }

    fn source_pause(&mut self, source: SourceHandle) {
        if let Some(state) = self.sources.get_mut(&source) {
            state.running = false;
            self.log.push(EngineCommand::SourcePaused(source));
        }
    }

    fn sequence_source_load_from_memory(&mut self, source: SourceHandle, data: &[u8]) {
        let Some(SourceState {
            feed: Feed::Sequence {
                frames,
                cursor,
                seek,
                last_seek,
            },
            ..
        }) = self.sources.get_mut(&source)
        else {
            return;
        };

        frames.clear();
        for line in data.split(|byte| *byte == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<ScriptedFrame>(line) {
                Ok(frame) => frames.push(frame),
                Err(err) => tracing::warn!(%err, "skipping unreadable sequence frame"),
            }
        }
        *cursor = 0;
        *seek = None;
        *last_seek = None;
    }

    fn sequence_source_time_set(&mut self, source: SourceHandle, time_ms: f64) {
        if let Some(SourceState {
            feed: Feed::Sequence { frames, seek, .. },
            ..
        }) = self.sources.get_mut(&source)
        {
            *seek = if time_ms < 0.0 || frames.is_empty() {
                None
            } else {
                let index = (time_ms / FRAME_INTERVAL_MS).floor() as usize;
                Some(index.min(frames.len() - 1))
            };
        }
    }

    fn loaded(&self) -> bool {
        let remaining = self.polls_until_ready.get();
        if remaining == 0 {
            return true;
        }
        self.polls_until_ready.set(remaining - 1);
        false
    }
}

/// Conjugates `m` by a reflection in the X axis.
fn mirror_if(mut m: Mat4, mirror: bool) -> Mat4 {
    if mirror {
        for index in [1, 2, 3, 4, 8, 12] {
            m[index] = -m[index];
        }
    }
    m
}

fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

/// Inverse of a rotation + translation transform.
fn rigid_inverse(m: &Mat4) -> Mat4 {
    let mut out = IDENTITY;
    for col in 0..3 {
        for row in 0..3 {
            out[col * 4 + row] = m[row * 4 + col];
        }
    }
    for row in 0..3 {
        out[12 + row] = -(0..3).map(|k| m[row * 4 + k] * m[12 + k]).sum::<f32>();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation(x: f32, y: f32, z: f32) -> Mat4 {
        let mut m = IDENTITY;
        m[12] = x;
        m[13] = y;
        m[14] = z;
        m
    }

    #[test]
    fn camera_delivers_frames_in_order_then_stalls() {
        let mut engine = ScriptedEngine::new(Scenario::from_anchor_ids(3, &[&[1], &[2]]));
        let pipeline = engine.pipeline_create();
        let camera = engine.camera_source_create(pipeline, "rear");
        engine.source_start(camera);

        engine.pipeline_frame_update(pipeline);
        assert_eq!(engine.pipeline_frame_number(pipeline), 3);
        engine.pipeline_frame_update(pipeline);
        assert_eq!(engine.pipeline_frame_number(pipeline), 4);
        engine.pipeline_frame_update(pipeline);
        assert_eq!(engine.pipeline_frame_number(pipeline), 4);
    }

    #[test]
    fn paused_source_produces_no_frames() {
        let mut engine = ScriptedEngine::new(Scenario::from_anchor_ids(0, &[&[1]]));
        let pipeline = engine.pipeline_create();
        engine.camera_source_create(pipeline, "rear");

        engine.pipeline_frame_update(pipeline);
        assert_eq!(engine.pipeline_frame_number(pipeline), NEVER_ADVANCED);
        assert!(engine
            .pipeline_camera_pose_default(pipeline)
            .iter()
            .all(|v| v.is_nan()));
    }

    #[test]
    fn disabled_tracker_detects_nothing() {
        let mut engine = ScriptedEngine::new(Scenario::from_anchor_ids(0, &[&[1, 2]]));
        let pipeline = engine.pipeline_create();
        let tracker = engine.image_tracker_create(pipeline);
        let camera = engine.camera_source_create(pipeline, "rear");
        engine.source_start(camera);
        engine.pipeline_frame_update(pipeline);

        assert_eq!(engine.image_tracker_anchor_count(tracker), 2);
        engine.image_tracker_enabled_set(tracker, false);
        assert_eq!(engine.image_tracker_anchor_count(tracker), 0);
    }

    #[test]
    fn recorded_frames_replay_through_a_sequence() {
        let mut engine = ScriptedEngine::new(Scenario::from_anchor_ids(0, &[&[4], &[4, 9]]));
        let pipeline = engine.pipeline_create();
        let camera = engine.camera_source_create(pipeline, "rear");
        engine.source_start(camera);
        engine.pipeline_sequence_record_start(pipeline, 2);
        engine.pipeline_frame_update(pipeline);
        engine.pipeline_frame_update(pipeline);
        engine.pipeline_sequence_record_stop(pipeline);
        let data = engine.pipeline_sequence_record_data(pipeline);

        let sequence = engine.sequence_source_create(pipeline);
        engine.sequence_source_load_from_memory(sequence, &data);
        engine.source_pause(camera);
        engine.source_start(sequence);
        engine.sequence_source_time_set(sequence, 40.0);
        engine.pipeline_frame_update(pipeline);

        let tracker = engine.image_tracker_create(pipeline);
        assert_eq!(engine.image_tracker_anchor_count(tracker), 2);
        assert_eq!(engine.image_tracker_anchor_id(tracker, 1), AnchorId(9));
    }

    #[test]
    fn rigid_inverse_undoes_translation() {
        let origin = translation(1.0, -2.0, 3.0);
        let inverse = rigid_inverse(&origin);
        assert_eq!(multiply(&origin, &inverse), IDENTITY);
    }

    #[test]
    fn ready_after_configured_polls() {
        let engine = ScriptedEngine::new(Scenario {
            ready_after_polls: 2,
            ..Default::default()
        });

        assert!(!engine.loaded());
        assert!(!engine.loaded());
        assert!(engine.loaded());
    }
}
