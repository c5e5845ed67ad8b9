//! Image tracking and the per-tracker anchor registry.
//!
//! On every internal frame update the tracker rescans the engine's list of
//! anchors in view and compares it with the previous frame's list. Two
//! visible-set buffers swap roles each frame instead of being reallocated.
//! Events go out in a fixed order:
//!
//! 1. `on_new_anchor` for each anchor discovered this frame, in engine order;
//! 2. `on_visible` (tracker, then anchor) for each anchor in view now but not
//!    in the previous frame;
//! 3. `on_not_visible` (tracker, then anchor) for each anchor in view in the
//!    previous frame but not now.
//!
//! Anchors that stay in view produce no events.

mod anchor;
mod target;

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt,
    rc::{Rc, Weak},
};

pub use anchor::Anchor;
pub use target::{ImageTarget, TargetPreview};

use crate::{
    engine::{AnchorId, TrackerHandle},
    event::{Event1, Subscription},
    loader::{DataSource, LoadHandle},
    pipeline::{Pipeline, Shared},
    PipelineError, Result, VisionEngine,
};

/// Anchors in view during one frame, in discovery order.
struct VisibleSet<E: VisionEngine> {
    order: Vec<Rc<Anchor<E>>>,
    members: HashSet<AnchorId>,
}

impl<E: VisionEngine> VisibleSet<E> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            members: HashSet::new(),
        }
    }

    fn insert(&mut self, anchor: Rc<Anchor<E>>) {
        if self.members.insert(anchor.id()) {
            self.order.push(anchor);
        }
    }

    fn contains(&self, id: AnchorId) -> bool {
        self.members.contains(&id)
    }

    /// Drops membership only; `remaining` skips the anchor afterwards.
    fn remove(&mut self, id: AnchorId) -> bool {
        self.members.remove(&id)
    }

    fn remaining(&self) -> impl Iterator<Item = &Rc<Anchor<E>>> {
        self.order
            .iter()
            .filter(|anchor| self.members.contains(&anchor.id()))
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

struct Registry<E: VisionEngine> {
    anchors: HashMap<AnchorId, Rc<Anchor<E>>>,
    visible: VisibleSet<E>,
    visible_last_frame: VisibleSet<E>,
    created: Vec<Rc<Anchor<E>>>,
    shown: Vec<Rc<Anchor<E>>>,
    hidden: Vec<Rc<Anchor<E>>>,
}

impl<E: VisionEngine> Registry<E> {
    fn new() -> Self {
        Self {
            anchors: HashMap::new(),
            visible: VisibleSet::new(),
            visible_last_frame: VisibleSet::new(),
            created: Vec::new(),
            shown: Vec::new(),
            hidden: Vec::new(),
        }
    }

    /// Rebuilds the visible set from the engine and fills the transition
    /// lists.
    fn scan(&mut self, engine: &E, tracker: TrackerHandle, shared: &Rc<Shared<E>>) {
        std::mem::swap(&mut self.visible, &mut self.visible_last_frame);
        self.visible.clear();

        let count = engine.image_tracker_anchor_count(tracker);
        for index in 0..count {
            let id = engine.image_tracker_anchor_id(tracker, index);
            let anchor = match self.anchors.get(&id) {
                Some(anchor) => Rc::clone(anchor),
                None => {
                    let anchor = Rc::new(Anchor::new(id, tracker, Rc::clone(shared)));
                    self.anchors.insert(id, Rc::clone(&anchor));
                    self.created.push(Rc::clone(&anchor));
                    anchor
                }
            };
            anchor.mark_visible(index);
            self.visible.insert(anchor);
        }

        for anchor in &self.visible.order {
            if !self.visible_last_frame.remove(anchor.id()) {
                self.shown.push(Rc::clone(anchor));
            }
        }
        for anchor in self.visible_last_frame.remaining() {
            anchor.mark_not_visible();
            self.hidden.push(Rc::clone(anchor));
        }
    }
}

struct TrackerInner<E: VisionEngine> {
    shared: Rc<Shared<E>>,
    handle: TrackerHandle,
    on_new_anchor: Event1<Rc<Anchor<E>>>,
    on_visible: Event1<Rc<Anchor<E>>>,
    on_not_visible: Event1<Rc<Anchor<E>>>,
    registry: RefCell<Registry<E>>,
    targets: RefCell<Option<Rc<[ImageTarget<E>]>>>,
}

impl<E: VisionEngine> TrackerInner<E> {
    fn frame_update(&self) {
        let (mut created, mut shown, mut hidden) = {
            let engine = self.shared.engine.borrow();
            if !engine.image_tracker_enabled(self.handle) {
                return;
            }
            let mut registry = self.registry.borrow_mut();
            registry.scan(&engine, self.handle, &self.shared);
            (
                std::mem::take(&mut registry.created),
                std::mem::take(&mut registry.shown),
                std::mem::take(&mut registry.hidden),
            )
        };

        if !(created.is_empty() && shown.is_empty() && hidden.is_empty()) {
            tracing::debug!(
                tracker = ?self.handle,
                new = created.len(),
                visible = shown.len(),
                not_visible = hidden.len(),
                "anchor transitions"
            );
        }

        for anchor in &created {
            self.on_new_anchor.emit(anchor);
        }
        for anchor in &shown {
            self.on_visible.emit(anchor);
            anchor.on_visible().emit();
        }
        for anchor in &hidden {
            self.on_not_visible.emit(anchor);
            anchor.on_not_visible().emit();
        }

        // Hand the buffers back so their capacity is reused next frame.
        created.clear();
        shown.clear();
        hidden.clear();
        let mut registry = self.registry.borrow_mut();
        registry.created = created;
        registry.shown = shown;
        registry.hidden = hidden;
    }
}

/// Tracks images from a loaded target file and reports anchor visibility.
pub struct ImageTracker<E: VisionEngine> {
    inner: Rc<TrackerInner<E>>,
    frame_subscription: Subscription,
}

impl<E: VisionEngine + 'static> ImageTracker<E> {
    pub fn new(pipeline: &Pipeline<E>) -> Self {
        let shared = Rc::clone(pipeline.shared());
        let handle = shared.engine.borrow_mut().image_tracker_create(shared.handle);
        let inner = Rc::new(TrackerInner {
            shared,
            handle,
            on_new_anchor: Event1::new(),
            on_visible: Event1::new(),
            on_not_visible: Event1::new(),
            registry: RefCell::new(Registry::new()),
            targets: RefCell::new(None),
        });

        let weak: Weak<TrackerInner<E>> = Rc::downgrade(&inner);
        let frame_subscription = inner.shared.frame_update_internal.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                inner.frame_update();
            }
        });
        tracing::info!(?handle, "image tracker created");

        Self {
            inner,
            frame_subscription,
        }
    }

    /// Creates a tracker and starts loading `target`.
    pub fn with_target(
        pipeline: &Pipeline<E>,
        target: impl Into<DataSource>,
    ) -> (Self, LoadHandle) {
        let tracker = Self::new(pipeline);
        let load = tracker.load_target(target);
        (tracker, load)
    }

    /// Loads a target file.
    ///
    /// Detection keeps running on the previously loaded data until the load
    /// completes, and the engine may take a few more frames before it
    /// reports anchors for the new targets.
    pub fn load_target(&self, source: impl Into<DataSource>) -> LoadHandle {
        let weak = Rc::downgrade(&self.inner);
        let handle = self.inner.handle;
        self.inner.shared.submit_load(
            source.into(),
            Box::new(move |engine: &mut E, data: &[u8]| -> Result<()> {
                let inner = weak.upgrade().ok_or(PipelineError::Released)?;
                engine.image_tracker_target_load_from_memory(handle, data);
                inner.targets.borrow_mut().take();
                tracing::info!(?handle, bytes = data.len(), "target file loaded");
                Ok(())
            }),
        )
    }
}

impl<E: VisionEngine> ImageTracker<E> {
    pub fn enabled(&self) -> bool {
        self.inner
            .shared
            .engine
            .borrow()
            .image_tracker_enabled(self.inner.handle)
    }

    /// Enables or disables detection. While disabled the registry is not
    /// rescanned, so anchors keep the visibility they had when detection
    /// stopped.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner
            .shared
            .engine
            .borrow_mut()
            .image_tracker_enabled_set(self.inner.handle, enabled);
    }

    /// Fired for each anchor seen for the first time.
    pub fn on_new_anchor(&self) -> &Event1<Rc<Anchor<E>>> {
        &self.inner.on_new_anchor
    }

    /// Fired when an anchor becomes visible.
    pub fn on_visible(&self) -> &Event1<Rc<Anchor<E>>> {
        &self.inner.on_visible
    }

    /// Fired when an anchor visible in the previous frame is not visible in
    /// the current one.
    pub fn on_not_visible(&self) -> &Event1<Rc<Anchor<E>>> {
        &self.inner.on_not_visible
    }

    /// Anchors visible in the current frame, in engine order.
    pub fn visible(&self) -> Vec<Rc<Anchor<E>>> {
        self.inner.registry.borrow().visible.order.clone()
    }

    pub fn is_visible(&self, id: AnchorId) -> bool {
        self.inner.registry.borrow().visible.contains(id)
    }

    pub fn anchor(&self, id: AnchorId) -> Option<Rc<Anchor<E>>> {
        self.inner.registry.borrow().anchors.get(&id).cloned()
    }

    /// Every anchor discovered so far, ordered by id.
    pub fn anchors(&self) -> Vec<Rc<Anchor<E>>> {
        let mut anchors: Vec<_> = self
            .inner
            .registry
            .borrow()
            .anchors
            .values()
            .cloned()
            .collect();
        anchors.sort_by_key(|anchor| anchor.id());
        anchors
    }

    pub fn anchor_count(&self) -> usize {
        self.inner.registry.borrow().anchors.len()
    }

    /// Targets in the loaded target file. The list is built on first access
    /// and rebuilt after the next target load.
    pub fn targets(&self) -> Rc<[ImageTarget<E>]> {
        if let Some(targets) = self.inner.targets.borrow().as_ref() {
            return Rc::clone(targets);
        }

        let targets: Rc<[ImageTarget<E>]> = {
            let engine = self.inner.shared.engine.borrow();
            let count = engine.image_tracker_target_count(self.inner.handle);
            (0..count)
                .map(|index| {
                    ImageTarget::read(
                        &*engine,
                        Rc::clone(&self.inner.shared),
                        self.inner.handle,
                        index,
                    )
                })
                .collect()
        };
        *self.inner.targets.borrow_mut() = Some(Rc::clone(&targets));
        targets
    }

    pub fn handle(&self) -> TrackerHandle {
        self.inner.handle
    }

    pub fn destroy(self) {}
}

impl<E: VisionEngine> Drop for ImageTracker<E> {
    fn drop(&mut self) {
        self.inner
            .shared
            .frame_update_internal
            .unsubscribe(self.frame_subscription);
        {
            let mut registry = self.inner.registry.borrow_mut();
            registry.anchors.clear();
            registry.visible.clear();
            registry.visible_last_frame.clear();
        }
        self.inner.targets.borrow_mut().take();
        self.inner
            .shared
            .engine
            .borrow_mut()
            .image_tracker_destroy(self.inner.handle);
        tracing::info!(handle = ?self.inner.handle, "image tracker destroyed");
    }
}

impl<E: VisionEngine> fmt::Debug for ImageTracker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.borrow();
        f.debug_struct("ImageTracker")
            .field("handle", &self.inner.handle)
            .field("anchors", &registry.anchors.len())
            .field("visible", &registry.visible.order.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::BTreeSet};

    use proptest::prelude::*;

    use super::*;
    use crate::{
        engine::{EngineCommand, ScriptedMesh, ScriptedTarget, IDENTITY},
        CameraSource, Fetch, LoadState, PipelineConfig, PipelineError, Result, Scenario,
        ScriptedEngine,
    };

    struct SlowTargets(Vec<u8>);

    impl Fetch for SlowTargets {
        fn fetch(&self, _reference: &str) -> Result<Vec<u8>> {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(self.0.clone())
        }
    }

    fn single_target_file() -> Vec<u8> {
        ScriptedTarget::encode_all(&[ScriptedTarget {
            side_length: Some(1.0),
            ..Default::default()
        }])
        .unwrap()
    }

    struct Unreachable;

    impl Fetch for Unreachable {
        fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
            Err(PipelineError::msg(format!("{reference} is unreachable")))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Seen {
        New(u64),
        Visible(u64),
        NotVisible(u64),
        AnchorVisible(u64),
        AnchorNotVisible(u64),
    }

    struct Harness {
        pipeline: Pipeline<ScriptedEngine>,
        _camera: CameraSource<ScriptedEngine>,
        tracker: ImageTracker<ScriptedEngine>,
        events: Rc<RefCell<Vec<Seen>>>,
    }

    impl Harness {
        fn new(first_frame_number: i64, frames: &[&[u64]]) -> Self {
            let pipeline = Pipeline::new(ScriptedEngine::new(Scenario::from_anchor_ids(
                first_frame_number,
                frames,
            )));
            let camera = CameraSource::new(&pipeline, "rear");
            camera.start();
            let tracker = ImageTracker::new(&pipeline);
            let events = Rc::new(RefCell::new(Vec::new()));

            {
                let events = Rc::clone(&events);
                tracker.on_new_anchor().subscribe(move |anchor| {
                    events.borrow_mut().push(Seen::New(anchor.id().0));
                    let per_anchor = Rc::clone(&events);
                    let id = anchor.id().0;
                    anchor
                        .on_visible()
                        .subscribe(move || per_anchor.borrow_mut().push(Seen::AnchorVisible(id)));
                    let per_anchor = Rc::clone(&events);
                    anchor.on_not_visible().subscribe(move || {
                        per_anchor.borrow_mut().push(Seen::AnchorNotVisible(id))
                    });
                });
            }
            {
                let events = Rc::clone(&events);
                tracker.on_visible().subscribe(move |anchor| {
                    events.borrow_mut().push(Seen::Visible(anchor.id().0))
                });
            }
            {
                let events = Rc::clone(&events);
                tracker.on_not_visible().subscribe(move |anchor| {
                    events.borrow_mut().push(Seen::NotVisible(anchor.id().0))
                });
            }

            Self {
                pipeline,
                _camera: camera,
                tracker,
                events,
            }
        }

        fn step(&self) -> Vec<Seen> {
            assert!(self.pipeline.advance(), "scenario ran out of frames");
            std::mem::take(&mut *self.events.borrow_mut())
        }
    }

    #[test]
    fn concrete_visibility_scenario() {
        let harness = Harness::new(10, &[&[5], &[5, 7], &[7], &[]]);

        assert_eq!(
            harness.step(),
            vec![Seen::New(5), Seen::Visible(5), Seen::AnchorVisible(5)]
        );
        assert_eq!(harness.pipeline.frame_number(), 10);
        assert_eq!(
            harness.step(),
            vec![Seen::New(7), Seen::Visible(7), Seen::AnchorVisible(7)]
        );
        assert_eq!(
            harness.step(),
            vec![Seen::NotVisible(5), Seen::AnchorNotVisible(5)]
        );
        assert_eq!(
            harness.step(),
            vec![Seen::NotVisible(7), Seen::AnchorNotVisible(7)]
        );
        assert_eq!(harness.pipeline.frame_number(), 13);
    }

    #[test]
    fn anchor_identity_survives_reappearance() {
        let harness = Harness::new(0, &[&[3], &[], &[3]]);

        harness.step();
        let first = harness.tracker.anchor(AnchorId(3)).unwrap();
        harness.step();
        assert!(!first.is_visible());
        assert_eq!(harness.tracker.anchor_count(), 1);

        assert_eq!(
            harness.step(),
            vec![Seen::Visible(3), Seen::AnchorVisible(3)]
        );
        let again = harness.tracker.anchor(AnchorId(3)).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        assert!(again.is_visible());
    }

    #[test]
    fn continuously_visible_anchor_is_silent() {
        let harness = Harness::new(0, &[&[1], &[1], &[1], &[1]]);

        assert_eq!(harness.step().len(), 3);
        for _ in 0..3 {
            assert!(harness.step().is_empty());
        }
    }

    #[test]
    fn public_listeners_see_the_updated_registry() {
        let harness = Harness::new(0, &[&[9]]);
        let tracker = Rc::new(harness.tracker);
        let observed = Rc::new(Cell::new(false));

        {
            let tracker = Rc::downgrade(&tracker);
            let observed = Rc::clone(&observed);
            harness.pipeline.on_frame_update().subscribe(move || {
                if let Some(tracker) = tracker.upgrade() {
                    observed.set(tracker.is_visible(AnchorId(9)));
                }
            });
        }
        harness.pipeline.advance();

        assert!(observed.get());
    }

    #[test]
    fn anchor_pose_follows_the_current_frame() {
        let harness = Harness::new(0, &[&[4, 5], &[5], &[]]);

        harness.step();
        let anchor = harness.tracker.anchor(AnchorId(5)).unwrap();
        assert_eq!(anchor.pose_camera_relative(false), Some(IDENTITY));

        harness.step();
        assert_eq!(anchor.pose(&IDENTITY, false), Some(IDENTITY));

        harness.step();
        assert_eq!(anchor.pose_camera_relative(false), None);
    }

    #[test]
    fn disabling_freezes_the_registry() {
        let harness = Harness::new(0, &[&[2], &[], &[]]);

        harness.step();
        harness.tracker.set_enabled(false);
        assert!(!harness.tracker.enabled());
        assert!(harness.step().is_empty());
        assert!(harness.tracker.anchor(AnchorId(2)).unwrap().is_visible());

        harness.tracker.set_enabled(true);
        assert_eq!(
            harness.step(),
            vec![Seen::NotVisible(2), Seen::AnchorNotVisible(2)]
        );
    }

    #[test]
    fn targets_are_lazy_and_reset_on_load() {
        let pipeline = Pipeline::new(ScriptedEngine::default());
        let tracker = ImageTracker::new(&pipeline);
        assert!(tracker.targets().is_empty());

        let file = ScriptedTarget::encode_all(&[ScriptedTarget {
            physical_scale_factor: Some(0.2),
            radius_top: None,
            radius_bottom: None,
            side_length: Some(1.5),
            image: vec![0x89, b'P', b'N', b'G'],
            preview: Some(ScriptedMesh {
                vertices: vec![0.0; 12],
                indices: vec![0, 1, 2, 2, 1, 3],
                uvs: vec![0.0; 8],
            }),
        }])
        .unwrap();
        assert!(tracker.load_target(file).is_complete());

        let targets = tracker.targets();
        assert_eq!(targets.len(), 1);
        let target = &targets[0];
        assert_eq!(target.physical_scale_factor(), Some(0.2));
        assert_eq!(target.radius_top(), None);
        assert_eq!(target.side_length(), Some(1.5));
        assert_eq!(target.image(), Some(&[0x89, b'P', b'N', b'G'][..]));
        assert_eq!(target.preview().map(|mesh| mesh.indices.len()), Some(6));
        assert!(Rc::ptr_eq(&targets, &tracker.targets()));

        let empty = ScriptedTarget::encode_all(&[ScriptedTarget::default()]).unwrap();
        tracker.load_target(empty);
        let reloaded = tracker.targets();
        assert!(!Rc::ptr_eq(&targets, &reloaded));
        assert_eq!(reloaded[0].image(), None);
        assert_eq!(reloaded[0].preview(), None);
        assert_eq!(reloaded[0].physical_scale_factor(), None);
    }

    #[test]
    fn failed_reference_load_keeps_current_targets() {
        let pipeline = Pipeline::with_fetcher(
            ScriptedEngine::default(),
            PipelineConfig::default(),
            std::sync::Arc::new(Unreachable),
        );
        let file = ScriptedTarget::encode_all(&[ScriptedTarget {
            side_length: Some(2.0),
            ..Default::default()
        }])
        .unwrap();
        let (tracker, first) = ImageTracker::with_target(&pipeline, file);
        assert!(first.is_complete());
        let before = tracker.targets();

        let load = tracker.load_target("remote/target.zpt");
        assert!(matches!(pipeline.wait_for(&load), LoadState::Failed(_)));

        assert!(Rc::ptr_eq(&before, &tracker.targets()));
        assert_eq!(tracker.targets()[0].side_length(), Some(2.0));
    }

    #[test]
    fn load_started_mid_frame_lands_on_the_next_advance() {
        let harness = Harness::new(0, &[&[], &[]]);
        let tracker = Rc::new(harness.tracker);
        let load = Rc::new(RefCell::new(None));

        {
            let tracker = Rc::downgrade(&tracker);
            let load = Rc::clone(&load);
            harness.pipeline.on_frame_update().subscribe(move || {
                let Some(tracker) = tracker.upgrade() else {
                    return;
                };
                if load.borrow().is_none() {
                    *load.borrow_mut() = Some(tracker.load_target(single_target_file()));
                }
            });
        }

        assert!(harness.pipeline.advance());
        let handle = load.borrow().clone().unwrap();
        assert!(handle.is_pending());
        assert!(tracker.targets().is_empty());

        assert!(harness.pipeline.advance());
        assert!(handle.is_complete());
        assert_eq!(tracker.targets().len(), 1);
    }

    #[test]
    fn waiting_inside_a_frame_handler_returns_without_blocking() {
        let pipeline = Pipeline::with_fetcher(
            ScriptedEngine::new(Scenario::from_anchor_ids(0, &[&[]])),
            PipelineConfig::default(),
            std::sync::Arc::new(SlowTargets(single_target_file())),
        );
        let camera = CameraSource::new(&pipeline, "rear");
        camera.start();
        let pipeline = Rc::new(pipeline);
        let tracker = Rc::new(ImageTracker::new(&pipeline));
        let load = Rc::new(RefCell::new(None));

        {
            let pipeline_ref = Rc::downgrade(&pipeline);
            let tracker = Rc::downgrade(&tracker);
            let load = Rc::clone(&load);
            pipeline.on_frame_update().subscribe(move || {
                let (Some(pipeline), Some(tracker)) = (pipeline_ref.upgrade(), tracker.upgrade())
                else {
                    return;
                };
                let handle = tracker.load_target("remote/target.zpt");
                let state = pipeline.wait_for(&handle);
                *load.borrow_mut() = Some((handle, state));
            });
        }
        assert!(pipeline.advance());

        let (handle, state) = load.borrow_mut().take().unwrap();
        assert!(matches!(state, LoadState::Pending));
        assert!(matches!(pipeline.wait_for(&handle), LoadState::Complete));
        assert_eq!(tracker.targets().len(), 1);
    }

    #[test]
    fn load_outliving_its_tracker_is_released() {
        let pipeline = Pipeline::with_fetcher(
            ScriptedEngine::default(),
            PipelineConfig::default(),
            std::sync::Arc::new(SlowTargets(single_target_file())),
        );
        let tracker = ImageTracker::new(&pipeline);
        let load = tracker.load_target("remote/target.zpt");
        tracker.destroy();

        let state = pipeline.wait_for(&load);
        assert!(matches!(state, LoadState::Failed(err) if matches!(*err, PipelineError::Released)));
    }

    #[test]
    fn destroy_unsubscribes_and_releases() {
        let engine = ScriptedEngine::new(Scenario::from_anchor_ids(0, &[&[1]]));
        let log = engine.command_log();
        let pipeline = Pipeline::new(engine);
        let tracker = ImageTracker::new(&pipeline);
        let handle = tracker.handle();
        assert_eq!(pipeline.shared().frame_update_internal.len(), 1);

        tracker.destroy();

        assert!(pipeline.shared().frame_update_internal.is_empty());
        assert!(log
            .entries()
            .contains(&EngineCommand::TrackerDestroyed(handle)));
    }

    fn frames_strategy() -> impl Strategy<Value = Vec<BTreeSet<u64>>> {
        prop::collection::vec(prop::collection::btree_set(0u64..8, 0..5), 1..12)
    }

    proptest! {
        #[test]
        fn transitions_match_set_differences(frames in frames_strategy()) {
            let ids: Vec<Vec<u64>> = frames.iter().map(|f| f.iter().copied().collect()).collect();
            let slices: Vec<&[u64]> = ids.iter().map(Vec::as_slice).collect();
            let harness = Harness::new(0, &slices);

            let mut prior = BTreeSet::new();
            let mut known = BTreeSet::new();
            for current in &frames {
                let events = harness.step();

                let new: BTreeSet<u64> = events.iter().filter_map(|e| match e {
                    Seen::New(id) => Some(*id),
                    _ => None,
                }).collect();
                let visible: BTreeSet<u64> = events.iter().filter_map(|e| match e {
                    Seen::Visible(id) => Some(*id),
                    _ => None,
                }).collect();
                let not_visible: BTreeSet<u64> = events.iter().filter_map(|e| match e {
                    Seen::NotVisible(id) => Some(*id),
                    _ => None,
                }).collect();

                let appeared: BTreeSet<u64> = current.difference(&known).copied().collect();
                let shown: BTreeSet<u64> = current.difference(&prior).copied().collect();
                let hidden: BTreeSet<u64> = prior.difference(current).copied().collect();
                prop_assert_eq!(&new, &appeared);
                prop_assert_eq!(&visible, &shown);
                prop_assert_eq!(&not_visible, &hidden);
                prop_assert!(visible.is_disjoint(&not_visible));

                for id in &new {
                    let new_at = events.iter().position(|e| *e == Seen::New(*id));
                    let visible_at = events.iter().position(|e| *e == Seen::Visible(*id));
                    prop_assert!(new_at < visible_at);
                }

                known.extend(current.iter().copied());
                prior = current.clone();
            }
        }
    }
}
