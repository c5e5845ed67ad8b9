//! The frame clock.
//!
//! A [`Pipeline`] owns the vision engine and advances it once per external
//! tick. When the engine reports a frame number different from the last one
//! observed, the pipeline notifies internal listeners (trackers) first and
//! public listeners second, so application code always sees anchor state
//! that already reflects the new frame.

use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
    sync::Arc,
    thread,
};

use crate::{
    config::PipelineConfig,
    engine::{finite, CameraModel, Mat4, PipelineHandle, NEVER_ADVANCED},
    event::Event,
    loader::{
        self, Apply, DataSource, Fetch, LoadHandle, LoadQueue, LoadState, ReferenceFetcher,
    },
    record::{RecordingState, SequenceRecorder},
    source::SourceCoordinator,
    VisionEngine,
};

/// State shared between a pipeline and the trackers and sources attached
/// to it.
pub(crate) struct Shared<E> {
    pub(crate) engine: RefCell<E>,
    pub(crate) handle: PipelineHandle,
    pub(crate) frame_update_internal: Event,
    pub(crate) sources: SourceCoordinator,
    loads: LoadQueue<E>,
    advancing: Cell<bool>,
}

impl<E: VisionEngine> Shared<E> {
    pub(crate) fn submit_load(&self, source: DataSource, apply: Apply<E>) -> LoadHandle {
        self.loads.submit(&self.engine, self.advancing.get(), source, apply)
    }
}

/// Advances the engine and broadcasts frame updates.
pub struct Pipeline<E: VisionEngine> {
    shared: Rc<Shared<E>>,
    config: PipelineConfig,
    recorder: SequenceRecorder,
    last_frame_number: Cell<i64>,
    on_frame_update: Event,
}

impl<E: VisionEngine> Pipeline<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, PipelineConfig::default())
    }

    pub fn with_config(engine: E, config: PipelineConfig) -> Self {
        let fetcher = Arc::new(ReferenceFetcher::new(&config.loader));
        Self::with_fetcher(engine, config, fetcher)
    }

    /// Creates a pipeline whose reference loads are resolved by `fetcher`.
    pub fn with_fetcher(mut engine: E, config: PipelineConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let handle = engine.pipeline_create();
        tracing::info!(?handle, "pipeline created");
        Self {
            shared: Rc::new(Shared {
                engine: RefCell::new(engine),
                handle,
                frame_update_internal: Event::new(),
                sources: SourceCoordinator::default(),
                loads: LoadQueue::new(fetcher),
                advancing: Cell::new(false),
            }),
            recorder: SequenceRecorder::new(config.recording.clone()),
            config,
            last_frame_number: Cell::new(NEVER_ADVANCED),
            on_frame_update: Event::new(),
        }
    }

    /// Releases the engine pipeline. Trackers and sources created from this
    /// pipeline must not be used to drive frames afterwards.
    pub fn destroy(self) {}

    /// Processes the next available frame.
    ///
    /// Returns `true` when the engine produced a new frame number, in which
    /// case trackers have already updated and [`on_frame_update`] has fired.
    /// Listeners still read the previous value from [`frame_number`] while
    /// the notification is in flight.
    ///
    /// [`on_frame_update`]: Self::on_frame_update
    /// [`frame_number`]: Self::frame_number
    pub fn advance(&self) -> bool {
        if self.shared.advancing.replace(true) {
            tracing::warn!("advance() called from within a frame update; ignored");
            return false;
        }

        self.shared.loads.drain(&self.shared.engine);

        let frame_number = {
            let mut engine = self.shared.engine.borrow_mut();
            engine.pipeline_frame_update(self.shared.handle);
            engine.pipeline_frame_number(self.shared.handle)
        };

        let updated = frame_number != self.last_frame_number.get();
        if updated {
            tracing::trace!(frame_number, "frame updated");
            self.shared.frame_update_internal.emit();
            self.on_frame_update.emit();
            self.last_frame_number.set(frame_number);
        }

        self.shared.advancing.set(false);
        updated
    }

    /// Fired once per distinct frame, after every tracker has updated.
    pub fn on_frame_update(&self) -> &Event {
        &self.on_frame_update
    }

    /// Last frame number observed by [`advance`](Self::advance), or `-1`.
    pub fn frame_number(&self) -> i64 {
        self.last_frame_number.get()
    }

    pub fn camera_model(&self) -> Option<CameraModel> {
        finite(self.engine().pipeline_camera_model(self.shared.handle))
    }

    /// Camera fixed at the origin looking down negative Z.
    pub fn camera_pose_default(&self) -> Option<Mat4> {
        finite(self.engine().pipeline_camera_pose_default(self.shared.handle))
    }

    /// Camera at the origin, rotating with the device.
    pub fn camera_pose_with_attitude(&self, mirror: bool) -> Option<Mat4> {
        finite(
            self.engine()
                .pipeline_camera_pose_with_attitude(self.shared.handle, mirror),
        )
    }

    /// Camera pose relative to `origin`, typically an anchor's
    /// camera-relative pose.
    pub fn camera_pose_with_origin(&self, origin: &Mat4) -> Option<Mat4> {
        finite(
            self.engine()
                .pipeline_camera_pose_with_origin(self.shared.handle, origin),
        )
    }

    pub fn camera_frame_user_facing(&self) -> bool {
        self.engine().pipeline_camera_frame_user_facing(self.shared.handle)
    }

    /// Device id of the engine's preferred front (`user_facing`) or rear
    /// camera, for use with [`CameraSource::new`](crate::CameraSource::new).
    pub fn camera_default_device_id(&self, user_facing: bool) -> String {
        self.engine().camera_default_device_id(user_facing)
    }

    /// Starts recording frames. Without `expected_frames` the buffer is sized
    /// from the configured recording settings.
    pub fn sequence_record_start(&self, expected_frames: Option<usize>) {
        let mut engine = self.engine_mut();
        self.recorder.start(&mut *engine, self.shared.handle, expected_frames);
    }

    pub fn sequence_record_stop(&self) {
        self.recorder.stop(&mut *self.engine_mut(), self.shared.handle);
    }

    pub fn sequence_record_clear(&self) {
        self.recorder.clear(&mut *self.engine_mut(), self.shared.handle);
    }

    pub fn sequence_record_data(&self) -> Vec<u8> {
        self.recorder.data(&*self.engine(), self.shared.handle)
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    /// Whether the engine has finished initialising.
    pub fn loaded(&self) -> bool {
        self.engine().loaded()
    }

    /// Blocks until [`loaded`](Self::loaded) reports true, polling at the
    /// configured interval.
    pub fn wait_until_loaded(&self) {
        loader::poll_until(self.config.loader.ready_poll_interval(), || self.loaded());
    }

    /// Applies finished loads without advancing a frame.
    pub fn poll_loads(&self) {
        if self.shared.advancing.get() {
            return;
        }
        self.shared.loads.drain(&self.shared.engine);
    }

    /// Blocks until `load` settles, applying it to the engine on completion.
    ///
    /// Loads are never applied mid-frame, so when called from a frame
    /// handler this returns the current state without waiting.
    pub fn wait_for(&self, load: &LoadHandle) -> LoadState {
        if self.shared.advancing.get() {
            tracing::warn!("wait_for() called from within a frame update; not waiting");
            return load.state();
        }
        while load.is_pending() {
            self.poll_loads();
            if load.is_pending() {
                thread::sleep(self.config.loader.ready_poll_interval());
            }
        }
        load.state()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> Ref<'_, E> {
        self.shared.engine.borrow()
    }

    pub(crate) fn engine_mut(&self) -> RefMut<'_, E> {
        self.shared.engine.borrow_mut()
    }

    pub(crate) fn shared(&self) -> &Rc<Shared<E>> {
        &self.shared
    }
}

impl<E: VisionEngine> Drop for Pipeline<E> {
    fn drop(&mut self) {
        self.engine_mut().pipeline_destroy(self.shared.handle);
        tracing::info!(handle = ?self.shared.handle, "pipeline destroyed");
    }
}

impl<E: VisionEngine> fmt::Debug for Pipeline<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("handle", &self.shared.handle)
            .field("frame_number", &self.last_frame_number.get())
            .field("recording", &self.recorder.state())
            .field("pending_loads", &self.shared.loads.len())
            .finish()
    }
}
