//! Cooperative acquisition loop.

use super::{FramePipeline, PipelineError, PipelineStats};
use crate::capture::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop flag was raised.
    Requested,
    /// The frame limit was reached.
    FrameLimit,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub stats: PipelineStats,
}

/// Acquires and processes frames until `stop` is raised, `max_frames`
/// frames have been processed, or capture fails.
///
/// Any open clip is closed before returning, on every path. The camera is
/// left to its owner (see [`crate::capture::CameraGuard`]).
pub fn run<C: Camera + ?Sized>(
    camera: &mut C,
    pipeline: &mut FramePipeline,
    stop: &AtomicBool,
    max_frames: Option<u64>,
) -> Result<RunSummary, PipelineError> {
    let result = acquire(camera, pipeline, stop, max_frames);
    if let Some(path) = pipeline.shutdown() {
        info!(path = %path.display(), "Flushed open clip");
    }

    let stats = pipeline.stats().clone();
    match result {
        Ok(reason) => {
            info!(
                frames = stats.frames_processed,
                sessions = stats.sessions_completed,
                ?reason,
                "Pipeline stopped"
            );
            Ok(RunSummary { reason, stats })
        }
        Err(e) => {
            error!(frames = stats.frames_processed, "Pipeline aborted: {}", e);
            Err(e)
        }
    }
}

fn acquire<C: Camera + ?Sized>(
    camera: &mut C,
    pipeline: &mut FramePipeline,
    stop: &AtomicBool,
    max_frames: Option<u64>,
) -> Result<StopReason, PipelineError> {
    let mut processed = 0u64;
    loop {
        if stop.load(Ordering::SeqCst) {
            return Ok(StopReason::Requested);
        }
        if max_frames.is_some_and(|limit| processed >= limit) {
            return Ok(StopReason::FrameLimit);
        }

        let frame = camera.capture()?;

        pipeline.process_frame(&frame);
        processed += 1;
    }
}
