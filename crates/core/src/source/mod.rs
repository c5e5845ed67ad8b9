//! Frame producers attached to a pipeline.
//!
//! A pipeline has at most one active producer. Starting a [`CameraSource`] or
//! [`SequenceSource`] pauses whichever source was active before the engine
//! is asked to start the new one, so no frame from the new source can be
//! delivered while the old one is still running.

use std::{cell::Cell, fmt, rc::Rc};

use crate::{
    engine::SourceHandle,
    loader::{DataSource, LoadHandle},
    pipeline::{Pipeline, Shared},
    PipelineError, Result, VisionEngine,
};

/// Tracks which source currently feeds the pipeline.
#[derive(Debug, Default)]
pub(crate) struct SourceCoordinator {
    active: Cell<Option<SourceHandle>>,
}

impl SourceCoordinator {
    pub(crate) fn start<E: VisionEngine>(&self, engine: &mut E, source: SourceHandle) {
        if let Some(previous) = self.active.replace(Some(source)) {
            if previous != source {
                engine.source_pause(previous);
                tracing::debug!(?previous, next = ?source, "paused previous source");
            }
        }
        engine.source_start(source);
    }

    pub(crate) fn pause<E: VisionEngine>(&self, engine: &mut E, source: SourceHandle) {
        if self.active.get() == Some(source) {
            self.active.set(None);
        }
        engine.source_pause(source);
    }

    pub(crate) fn release<E: VisionEngine>(&self, engine: &mut E, source: SourceHandle) {
        if self.active.get() == Some(source) {
            self.active.set(None);
            engine.source_pause(source);
        }
        engine.source_destroy(source);
    }

    pub(crate) fn is_active(&self, source: SourceHandle) -> bool {
        self.active.get() == Some(source)
    }
}

struct Attached<E: VisionEngine> {
    shared: Rc<Shared<E>>,
    handle: SourceHandle,
    /// Set once the engine source is destroyed; pending loads check it.
    released: Rc<Cell<bool>>,
}

impl<E: VisionEngine> Attached<E> {
    fn new(shared: Rc<Shared<E>>, handle: SourceHandle) -> Self {
        Self {
            shared,
            handle,
            released: Rc::new(Cell::new(false)),
        }
    }

    fn start(&self) {
        self.shared
            .sources
            .start(&mut *self.shared.engine.borrow_mut(), self.handle);
    }

    fn pause(&self) {
        self.shared
            .sources
            .pause(&mut *self.shared.engine.borrow_mut(), self.handle);
    }

    fn is_active(&self) -> bool {
        self.shared.sources.is_active(self.handle)
    }
}

impl<E: VisionEngine> Drop for Attached<E> {
    fn drop(&mut self) {
        self.released.set(true);
        self.shared
            .sources
            .release(&mut *self.shared.engine.borrow_mut(), self.handle);
    }
}

/// Live camera feed.
pub struct CameraSource<E: VisionEngine> {
    attached: Attached<E>,
    device_id: String,
}

impl<E: VisionEngine> CameraSource<E> {
    pub fn new(pipeline: &Pipeline<E>, device_id: &str) -> Self {
        let shared = Rc::clone(pipeline.shared());
        let handle = shared
            .engine
            .borrow_mut()
            .camera_source_create(shared.handle, device_id);
        tracing::info!(?handle, device_id, "camera source created");
        Self {
            attached: Attached::new(shared, handle),
            device_id: device_id.to_string(),
        }
    }

    /// Starts the camera, pausing any other source on the same pipeline.
    pub fn start(&self) {
        self.attached.start();
    }

    pub fn pause(&self) {
        self.attached.pause();
    }

    pub fn is_active(&self) -> bool {
        self.attached.is_active()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn handle(&self) -> SourceHandle {
        self.attached.handle
    }

    pub fn destroy(self) {}
}

impl<E: VisionEngine> fmt::Debug for CameraSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraSource")
            .field("handle", &self.attached.handle)
            .field("device_id", &self.device_id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Plays back camera and motion data captured with sequence recording.
pub struct SequenceSource<E: VisionEngine> {
    attached: Attached<E>,
}

impl<E: VisionEngine + 'static> SequenceSource<E> {
    pub fn new(pipeline: &Pipeline<E>) -> Self {
        let shared = Rc::clone(pipeline.shared());
        let handle = shared
            .engine
            .borrow_mut()
            .sequence_source_create(shared.handle);
        tracing::info!(?handle, "sequence source created");
        Self {
            attached: Attached::new(shared, handle),
        }
    }

    /// Loads recorded data. Playback has nothing to deliver until the
    /// returned handle completes.
    pub fn load(&self, source: impl Into<DataSource>) -> LoadHandle {
        let handle = self.attached.handle;
        let released = Rc::clone(&self.attached.released);
        self.attached.shared.submit_load(
            source.into(),
            Box::new(move |engine: &mut E, data: &[u8]| -> Result<()> {
                if released.get() {
                    return Err(PipelineError::Released);
                }
                engine.sequence_source_load_from_memory(handle, data);
                tracing::info!(?handle, bytes = data.len(), "sequence loaded");
                Ok(())
            }),
        )
    }

    /// Seeks to `time_ms`, or resumes wall-clock playback with `None`.
    pub fn set_time(&self, time_ms: Option<f64>) {
        self.attached
            .shared
            .engine
            .borrow_mut()
            .sequence_source_time_set(self.attached.handle, time_ms.unwrap_or(-1.0));
    }

    /// Starts playback, pausing any other source on the same pipeline.
    pub fn start(&self) {
        self.attached.start();
    }

    pub fn pause(&self) {
        self.attached.pause();
    }

    pub fn is_active(&self) -> bool {
        self.attached.is_active()
    }

    pub fn handle(&self) -> SourceHandle {
        self.attached.handle
    }

    pub fn destroy(self) {}
}

impl<E: VisionEngine> fmt::Debug for SequenceSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceSource")
            .field("handle", &self.attached.handle)
            .field("active", &self.attached.is_active())
            .finish()
    }
}
