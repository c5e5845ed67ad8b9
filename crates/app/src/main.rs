use std::{
    cell::Cell,
    path::{Path, PathBuf},
    rc::Rc,
};

use ar_pipeline_core::{
    CameraSource, ImageTracker, LoadState, Pipeline, PipelineConfig, PipelineError, Scenario,
    ScriptedEngine, SequenceSource,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> ar_pipeline_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            scenario,
            target,
            record,
        } => run_scenario(&scenario, target.as_deref(), record.as_deref(), config),
        Commands::Replay { sequence, target } => run_replay(&sequence, target.as_deref(), config),
    }
}

fn run_scenario(
    scenario: &Path,
    target: Option<&str>,
    record: Option<&Path>,
    config: PipelineConfig,
) -> ar_pipeline_core::Result<()> {
    tracing::info!(?scenario, "running scenario");

    let scenario = Scenario::from_json_file(scenario)?;
    let pipeline = Pipeline::with_config(ScriptedEngine::new(scenario), config);
    pipeline.wait_until_loaded();

    let tracker = ImageTracker::new(&pipeline);
    if let Some(target) = target {
        load_target(&pipeline, &tracker, target)?;
    }
    let frames = observe(&pipeline, &tracker);

    let camera = CameraSource::new(&pipeline, &pipeline.camera_default_device_id(false));
    camera.start();
    if record.is_some() {
        pipeline.sequence_record_start(None);
    }
    while pipeline.advance() {}
    camera.pause();

    if let Some(record) = record {
        pipeline.sequence_record_stop();
        let data = pipeline.sequence_record_data();
        std::fs::write(record, &data)?;
        tracing::info!(?record, bytes = data.len(), "sequence written");
    }

    print_summary(&pipeline, &tracker, frames.get())
}

fn run_replay(
    sequence: &str,
    target: Option<&str>,
    config: PipelineConfig,
) -> ar_pipeline_core::Result<()> {
    tracing::info!(?sequence, "replaying sequence");

    let pipeline = Pipeline::with_config(ScriptedEngine::default(), config);
    pipeline.wait_until_loaded();

    let tracker = ImageTracker::new(&pipeline);
    if let Some(target) = target {
        load_target(&pipeline, &tracker, target)?;
    }
    let frames = observe(&pipeline, &tracker);

    let source = SequenceSource::new(&pipeline);
    let load = source.load(sequence);
    if let LoadState::Failed(err) = pipeline.wait_for(&load) {
        return Err(PipelineError::msg(err.to_string()));
    }
    source.start();
    while pipeline.advance() {}
    source.pause();

    print_summary(&pipeline, &tracker, frames.get())
}

fn load_target(
    pipeline: &Pipeline<ScriptedEngine>,
    tracker: &ImageTracker<ScriptedEngine>,
    reference: &str,
) -> ar_pipeline_core::Result<()> {
    let load = tracker.load_target(reference);
    match pipeline.wait_for(&load) {
        LoadState::Failed(err) => Err(PipelineError::msg(err.to_string())),
        _ => {
            tracing::info!(targets = tracker.targets().len(), "targets ready");
            Ok(())
        }
    }
}

/// Logs anchor transitions and counts delivered frames.
fn observe(
    pipeline: &Pipeline<ScriptedEngine>,
    tracker: &ImageTracker<ScriptedEngine>,
) -> Rc<Cell<u64>> {
    tracker.on_new_anchor().subscribe(|anchor| {
        tracing::info!(anchor = %anchor.id(), "new anchor");
    });
    tracker.on_visible().subscribe(|anchor| {
        let pose = anchor.pose_camera_relative(false);
        tracing::info!(anchor = %anchor.id(), ?pose, "anchor visible");
    });
    tracker.on_not_visible().subscribe(|anchor| {
        tracing::info!(anchor = %anchor.id(), "anchor not visible");
    });

    let frames = Rc::new(Cell::new(0));
    let counter = Rc::clone(&frames);
    pipeline
        .on_frame_update()
        .subscribe(move || counter.set(counter.get() + 1));
    frames
}

fn print_summary(
    pipeline: &Pipeline<ScriptedEngine>,
    tracker: &ImageTracker<ScriptedEngine>,
    frames: u64,
) -> ar_pipeline_core::Result<()> {
    let anchors: Vec<_> = tracker
        .anchors()
        .iter()
        .map(|anchor| {
            serde_json::json!({
                "id": anchor.id(),
                "visible": anchor.is_visible(),
            })
        })
        .collect();
    let summary = serde_json::json!({
        "frames": frames,
        "last_frame_number": pipeline.frame_number(),
        "anchors": anchors,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Frame-driven AR tracking pipeline", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a scripted camera scenario through the pipeline.
    Run {
        /// Scenario file describing the anchors in view per frame.
        scenario: PathBuf,
        /// Image target file path or http(s) URL to load before the first frame.
        #[arg(short, long)]
        target: Option<String>,
        /// Write the recorded sequence to this path.
        #[arg(short, long)]
        record: Option<PathBuf>,
    },
    /// Play back a sequence written by `run --record`.
    Replay {
        /// Recorded sequence file path or http(s) URL.
        sequence: String,
        /// Image target file path or http(s) URL to load before the first frame.
        #[arg(short, long)]
        target: Option<String>,
    },
}
