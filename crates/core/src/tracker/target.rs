use std::{cell::OnceCell, fmt, rc::Rc};

use crate::{
    engine::{non_negative, TrackerHandle},
    pipeline::Shared,
    VisionEngine,
};

/// A source image embedded in a loaded target file.
///
/// Scalar metadata is read once when the target is listed. The preview image
/// and mesh are read on first access and cached for the life of this value.
pub struct ImageTarget<E: VisionEngine> {
    shared: Rc<Shared<E>>,
    tracker: TrackerHandle,
    index: usize,
    physical_scale_factor: Option<f32>,
    radius_top: Option<f32>,
    radius_bottom: Option<f32>,
    side_length: Option<f32>,
    image: OnceCell<Option<Vec<u8>>>,
    preview: OnceCell<Option<TargetPreview>>,
}

/// Mesh approximating the shape of a target image.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPreview {
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
    pub uvs: Vec<f32>,
}

impl<E: VisionEngine> ImageTarget<E> {
    pub(crate) fn read(
        engine: &E,
        shared: Rc<Shared<E>>,
        tracker: TrackerHandle,
        index: usize,
    ) -> Self {
        Self {
            physical_scale_factor: non_negative(
                engine.image_tracker_target_physical_scale_factor(tracker, index),
            ),
            radius_top: non_negative(engine.image_tracker_target_radius_top(tracker, index)),
            radius_bottom: non_negative(engine.image_tracker_target_radius_bottom(tracker, index)),
            side_length: non_negative(engine.image_tracker_target_side_length(tracker, index)),
            shared,
            tracker,
            index,
            image: OnceCell::new(),
            preview: OnceCell::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn physical_scale_factor(&self) -> Option<f32> {
        self.physical_scale_factor
    }

    /// Top radius of a conical target.
    pub fn radius_top(&self) -> Option<f32> {
        self.radius_top
    }

    pub fn radius_bottom(&self) -> Option<f32> {
        self.radius_bottom
    }

    pub fn side_length(&self) -> Option<f32> {
        self.side_length
    }

    /// Encoded preview image, if the target file carries one.
    pub fn image(&self) -> Option<&[u8]> {
        self.image
            .get_or_init(|| {
                let data = self
                    .shared
                    .engine
                    .borrow()
                    .image_tracker_target_image(self.tracker, self.index);
                (!data.is_empty()).then_some(data)
            })
            .as_deref()
    }

    pub fn preview(&self) -> Option<&TargetPreview> {
        self.preview
            .get_or_init(|| {
                let engine = self.shared.engine.borrow();
                let vertices =
                    engine.image_tracker_target_preview_mesh_vertices(self.tracker, self.index);
                if vertices.is_empty() {
                    return None;
                }
                Some(TargetPreview {
                    vertices,
                    indices: engine
                        .image_tracker_target_preview_mesh_indices(self.tracker, self.index),
                    uvs: engine.image_tracker_target_preview_mesh_uvs(self.tracker, self.index),
                })
            })
            .as_ref()
    }
}

impl<E: VisionEngine> fmt::Debug for ImageTarget<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageTarget")
            .field("index", &self.index)
            .field("physical_scale_factor", &self.physical_scale_factor)
            .field("radius_top", &self.radius_top)
            .field("radius_bottom", &self.radius_bottom)
            .field("side_length", &self.side_length)
            .finish()
    }
}
