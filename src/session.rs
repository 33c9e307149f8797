// src/session.rs - Per-tick driver: frames in, inference, pipeline, playback
use crate::config::FrameConfig;
use crate::error::Result;
use crate::frames::{FrameBuffer, FrameTensor};
use crate::inference::{InferenceEngine, InferenceSlot};
use crate::pipeline::PosePipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Playback showed this snapshot index.
    Played(Option<usize>),
    Recorded {
        /// A finished inference went through decode and filtering.
        processed: bool,
        /// A new inference was started with the current window.
        submitted: bool,
    },
}

struct LiveInput {
    frames: FrameBuffer,
    slot: InferenceSlot,
}

pub struct Session {
    pipeline: PosePipeline,
    live: Option<LiveInput>,
    frames_processed: u64,
}

impl Session {
    /// The engine is only attached when the pipeline is recording; playback
    /// never touches inference.
    pub fn new(
        pipeline: PosePipeline,
        engine: Arc<dyn InferenceEngine>,
        frames: &FrameConfig,
    ) -> Self {
        let live = pipeline.is_recording().then(|| LiveInput {
            frames: FrameBuffer::new(frames.min_gap_secs),
            slot: InferenceSlot::new(engine),
        });
        Self {
            pipeline,
            live,
            frames_processed: 0,
        }
    }

    pub fn pipeline(&self) -> &PosePipeline {
        &self.pipeline
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub async fn tick(&mut self, elapsed: f64, frame: Option<FrameTensor>) -> Result<TickOutcome> {
        let Some(live) = self.live.as_mut() else {
            return Ok(TickOutcome::Played(self.pipeline.advance_playback(elapsed)?));
        };

        let mut processed = false;
        if let Some(output) = live.slot.collect_finished().await? {
            self.pipeline.on_inference(&output, elapsed)?;
            self.frames_processed += 1;
            processed = true;
        }

        let mut submitted = false;
        if let Some(frame) = frame {
            live.frames.push(frame, elapsed);
            if let Some(window) = live.frames.window() {
                submitted = live.slot.try_submit(window.clone());
            }
        }
        Ok(TickOutcome::Recorded { processed, submitted })
    }

    /// Drains the pending inference and flushes the recording. Must run
    /// before the process exits, including after a failed tick. A failure of
    /// the drained inference is logged and the recording is still written.
    pub async fn finish(mut self, elapsed: f64) -> Result<Option<PathBuf>> {
        if let Some(live) = self.live.as_mut() {
            let drained = match live.slot.wait().await {
                Ok(Some(output)) => self.pipeline.on_inference(&output, elapsed).map(|()| true),
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            };
            match drained {
                Ok(true) => self.frames_processed += 1,
                Ok(false) => {}
                Err(e) => warn!("Dropping last inference: {}", e),
            }
            info!(
                "Recording finished: {} frames processed, {} submissions dropped",
                self.frames_processed,
                live.slot.dropped()
            );
        }
        self.pipeline.shutdown()
    }
}
