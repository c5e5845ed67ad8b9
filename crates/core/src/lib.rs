//! Core library for the AR pipeline.
//!
//! A [`Pipeline`] drives a [`VisionEngine`] one frame at a time. Trackers and
//! sources attach to a pipeline and share its engine:
//!
//! - [`CameraSource`] and [`SequenceSource`] feed frames, one at a time;
//! - [`ImageTracker`] turns the engine's per-frame detections into
//!   long-lived [`Anchor`]s with visibility events;
//! - the pipeline can record what it sees and a sequence source can play it
//!   back later.
//!
//! Everything runs on the thread that calls [`Pipeline::advance`]. Only the
//! fetching of referenced files happens on a background worker.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod tracker;

pub use config::{LoaderConfig, PipelineConfig, RecordingSettings};
pub use engine::{AnchorId, CameraModel, Mat4, Scenario, ScriptedEngine, VisionEngine, IDENTITY};
pub use error::{PipelineError, Result};
pub use event::{Event, Event1, Subscription};
pub use loader::{
    DataSource, Fetch, FsFetcher, HttpFetcher, LoadHandle, LoadState, ReferenceFetcher,
};
pub use pipeline::Pipeline;
pub use record::{RecordingState, SequenceRecorder};
pub use source::{CameraSource, SequenceSource};
pub use tracker::{Anchor, ImageTarget, ImageTracker, TargetPreview};
