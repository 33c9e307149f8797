// src/inference.rs - Inference collaborator seam and single-flight scheduling
use crate::config::GridConfig;
use crate::error::Result;
use crate::frames::FrameWindow;
use crate::volume::{Axis, VolumeShape, Voxel};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// The two volumes a network run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkOutput {
    /// `J x R^3`
    pub heatmap: Vec<f32>,
    /// `J x R^3 x 3`
    pub offsets: Vec<f32>,
}

/// Anything that turns the three most recent frames into heat map and offset
/// volumes. Runs on a blocking thread.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, frames: &FrameWindow) -> Result<NetworkOutput>;
}

/// Holds at most one inference in flight. Submissions made while busy are
/// dropped, never queued.
pub struct InferenceSlot {
    engine: Arc<dyn InferenceEngine>,
    in_flight: Option<JoinHandle<Result<NetworkOutput>>>,
    dropped: u64,
}

impl InferenceSlot {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            in_flight: None,
            dropped: 0,
        }
    }

    /// True until the current run's output has been collected.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Starts a run unless one is already pending. Returns whether it started.
    pub fn try_submit(&mut self, frames: FrameWindow) -> bool {
        if self.in_flight.is_some() {
            self.dropped += 1;
            debug!("Inference busy, dropping frame ({} dropped so far)", self.dropped);
            return false;
        }

        let engine = Arc::clone(&self.engine);
        self.in_flight = Some(tokio::task::spawn_blocking(move || engine.infer(&frames)));
        true
    }

    /// Output of the pending run if it has already completed.
    pub async fn collect_finished(&mut self) -> Result<Option<NetworkOutput>> {
        let finished = self.in_flight.as_ref().is_some_and(|h| h.is_finished());
        if !finished {
            return Ok(None);
        }
        self.wait().await
    }

    /// Waits for the pending run, if any.
    pub async fn wait(&mut self) -> Result<Option<NetworkOutput>> {
        match self.in_flight.take() {
            Some(handle) => Ok(Some(handle.await??)),
            None => Ok(None),
        }
    }
}

/// Deterministic stand-in for a real network: one sharp peak per joint that
/// drifts through the grid from call to call.
pub struct SimulatedEngine {
    shape: VolumeShape,
    calls: AtomicU64,
}

impl SimulatedEngine {
    pub fn new(grid: &GridConfig) -> Self {
        Self {
            shape: VolumeShape::from_grid(grid),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Peak voxel for `joint` on call `step`.
    pub fn peak_for(&self, joint: usize, step: u64) -> Voxel {
        let last = (self.shape.resolution - 1) as f32;
        let t = step as f32 * 0.1;
        let j = joint as f32;
        let wave = |phase: f32| (((phase.sin() + 1.0) / 2.0) * last).round() as usize;
        Voxel::new(wave(t + j), wave(t * 0.5 + j * 0.7), wave(j * 1.3))
    }

    pub fn generate(&self, step: u64) -> NetworkOutput {
        let shape = self.shape;
        let mut heatmap = vec![0.0; shape.heatmap_len()];
        let mut offsets = vec![0.0; shape.offset_len()];

        for joint in 0..shape.joints {
            let peak = self.peak_for(joint, step);
            heatmap[shape.heat_index(joint, peak)] = 0.9;
            if peak.x > 0 {
                heatmap[shape.heat_index(joint, Voxel::new(peak.x - 1, peak.y, peak.z))] = 0.4;
            }
            for axis in Axis::ALL {
                offsets[shape.offset_index(joint, axis, peak)] = 0.25;
            }
        }
        NetworkOutput { heatmap, offsets }
    }
}

impl InferenceEngine for SimulatedEngine {
    fn infer(&self, _frames: &FrameWindow) -> Result<NetworkOutput> {
        let step = self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.generate(step))
    }
}
