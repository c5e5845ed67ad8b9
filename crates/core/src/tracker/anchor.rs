use std::{cell::Cell, fmt, rc::Rc};

use crate::{
    engine::{finite, AnchorId, Mat4, TrackerHandle},
    event::Event,
    pipeline::Shared,
    VisionEngine,
};

/// A tracked image instance.
///
/// Anchors are created the first time the engine reports their id and stay
/// registered for the lifetime of the tracker, so the same `Rc<Anchor>` is
/// handed out on every later transition.
pub struct Anchor<E: VisionEngine> {
    id: AnchorId,
    visible: Cell<bool>,
    /// Engine-side index from the most recent scan in which the anchor was
    /// seen. Only valid for that frame.
    index: Cell<Option<usize>>,
    tracker: TrackerHandle,
    shared: Rc<Shared<E>>,
    on_visible: Event,
    on_not_visible: Event,
}

impl<E: VisionEngine> Anchor<E> {
    pub(crate) fn new(id: AnchorId, tracker: TrackerHandle, shared: Rc<Shared<E>>) -> Self {
        Self {
            id,
            visible: Cell::new(false),
            index: Cell::new(None),
            tracker,
            shared,
            on_visible: Event::new(),
            on_not_visible: Event::new(),
        }
    }

    pub fn id(&self) -> AnchorId {
        self.id
    }

    /// Whether the anchor was seen in the last scanned frame.
    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    /// Fired when this anchor goes from not visible to visible.
    pub fn on_visible(&self) -> &Event {
        &self.on_visible
    }

    /// Fired when this anchor was visible in the previous frame but not in
    /// the current one.
    pub fn on_not_visible(&self) -> &Event {
        &self.on_not_visible
    }

    /// Pose relative to the camera, or `None` when the anchor is not in the
    /// current frame or the engine has no pose for it.
    pub fn pose_camera_relative(&self, mirror: bool) -> Option<Mat4> {
        let engine = self.shared.engine.borrow();
        let index = self.resolve_index(&engine)?;
        finite(engine.image_tracker_anchor_pose_camera_relative(self.tracker, index, mirror))
    }

    /// World pose given a camera pose from the pipeline.
    pub fn pose(&self, camera_pose: &Mat4, mirror: bool) -> Option<Mat4> {
        let engine = self.shared.engine.borrow();
        let index = self.resolve_index(&engine)?;
        finite(engine.image_tracker_anchor_pose(self.tracker, index, camera_pose, mirror))
    }

    pub(crate) fn mark_visible(&self, index: usize) {
        self.visible.set(true);
        self.index.set(Some(index));
    }

    pub(crate) fn mark_not_visible(&self) {
        self.visible.set(false);
        self.index.set(None);
    }

    /// Checks the cached index against the engine's current list and falls
    /// back to a search by id.
    fn resolve_index(&self, engine: &E) -> Option<usize> {
        let cached = self.index.get()?;
        let count = engine.image_tracker_anchor_count(self.tracker);
        if cached < count && engine.image_tracker_anchor_id(self.tracker, cached) == self.id {
            return Some(cached);
        }
        (0..count).find(|index| engine.image_tracker_anchor_id(self.tracker, *index) == self.id)
    }
}

impl<E: VisionEngine> fmt::Debug for Anchor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("id", &self.id)
            .field("visible", &self.visible.get())
            .field("index", &self.index.get())
            .finish()
    }
}
