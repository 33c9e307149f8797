// src/pipeline.rs - Record/playback state machine over the live joint set
use crate::cache;
use crate::config::PipelineConfig;
use crate::decoder::GridDecoder;
use crate::error::{PoseError, Result};
use crate::filter::TemporalFilter;
use crate::inference::NetworkOutput;
use crate::joints::{JointIndex, Skeleton};
use crate::kinematics::derive_joints;
use crate::track::{JointSnapshot, PlaybackCursor, Track};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Live path: decode, derive, filter, then append to the track.
pub struct Recorder {
    decoder: GridDecoder,
    filter: TemporalFilter,
    track: Track,
}

impl Recorder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            decoder: GridDecoder::new(&config.grid),
            filter: TemporalFilter::new(&config.filter),
            track: Track::new(),
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Timestamps never go backwards: an `elapsed` earlier than the last
    /// snapshot is recorded at the last snapshot's time.
    pub fn process(
        &mut self,
        skeleton: &mut Skeleton,
        output: &NetworkOutput,
        elapsed: f64,
    ) -> Result<()> {
        if !elapsed.is_finite() {
            return Err(PoseError::NonFiniteTime(elapsed));
        }
        let timestamp = match self.track.snapshots().last() {
            Some(last) if elapsed < last.timestamp => {
                warn!(
                    "Clock went back from {:.4}s to {:.4}s, holding timestamp",
                    last.timestamp, elapsed
                );
                last.timestamp
            }
            _ => elapsed,
        };

        let decoded = self.decoder.decode(&output.heatmap, &output.offsets)?;
        for (joint, d) in JointIndex::ALL.iter().zip(decoded) {
            let point = skeleton.get_mut(*joint);
            point.raw_position = d.position;
            point.confidence = d.confidence;
        }

        derive_joints(skeleton);
        self.filter.apply(skeleton);
        self.track.push(JointSnapshot::capture(skeleton, timestamp));
        Ok(())
    }
}

/// Cached path: a denoised track and a forward-only cursor.
pub struct Player {
    track: Track,
    cursor: PlaybackCursor,
    reported_end: bool,
}

impl Player {
    pub fn new(track: Track) -> Self {
        Self {
            track,
            cursor: PlaybackCursor::new(),
            reported_end: false,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    /// Copies the snapshot current at `elapsed` into the skeleton. Returns its
    /// index, or `None` for an empty track.
    pub fn advance(&mut self, skeleton: &mut Skeleton, elapsed: f64) -> Option<usize> {
        let snapshot = self.cursor.advance(&self.track, elapsed)?;
        snapshot.apply_to(skeleton);

        if !self.reported_end && self.cursor.at_end(&self.track) && elapsed > snapshot.timestamp {
            debug!("Playback reached the last snapshot at {:.3}s, holding", snapshot.timestamp);
            self.reported_end = true;
        }
        Some(self.cursor.index())
    }
}

pub enum PipelineMode {
    Record(Recorder),
    Playback(Player),
}

pub struct PosePipeline {
    skeleton: Skeleton,
    mode: PipelineMode,
    cache_path: PathBuf,
}

impl PosePipeline {
    /// Chooses the mode once: playback when a track file already exists for
    /// `source`, recording otherwise.
    pub fn open(source: &Path, config: &PipelineConfig) -> Result<Self> {
        let cache_path = cache::cache_path_for(source, &config.cache);
        if cache_path.exists() {
            info!("Using cache {}", cache_path.display());
            Self::playback(cache_path, config)
        } else {
            info!("No cache for {}, recording to {}", source.display(), cache_path.display());
            Self::record(cache_path, config)
        }
    }

    pub fn record(cache_path: PathBuf, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            skeleton: Skeleton::new(config.filter.initial_covariance, config.filter.history_len),
            mode: PipelineMode::Record(Recorder::new(config)),
            cache_path,
        })
    }

    pub fn playback(cache_path: PathBuf, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let track = cache::load_for_playback(&cache_path, &config.cache)?;
        if track.is_empty() {
            warn!("Track {} holds no snapshots", cache_path.display());
        }
        Ok(Self {
            skeleton: Skeleton::new(config.filter.initial_covariance, config.filter.history_len),
            mode: PipelineMode::Playback(Player::new(track)),
            cache_path,
        })
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.mode, PipelineMode::Record(_))
    }

    pub fn mode(&self) -> &PipelineMode {
        &self.mode
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn track(&self) -> &Track {
        match &self.mode {
            PipelineMode::Record(recorder) => recorder.track(),
            PipelineMode::Playback(player) => player.track(),
        }
    }

    /// Runs one finished inference through the live path.
    pub fn on_inference(&mut self, output: &NetworkOutput, elapsed: f64) -> Result<()> {
        match &mut self.mode {
            PipelineMode::Record(recorder) => recorder.process(&mut self.skeleton, output, elapsed),
            PipelineMode::Playback(_) => Err(PoseError::WrongMode { expected: "record" }),
        }
    }

    /// Moves the playback cursor to `elapsed` and writes that snapshot into
    /// the live joints.
    pub fn advance_playback(&mut self, elapsed: f64) -> Result<Option<usize>> {
        match &mut self.mode {
            PipelineMode::Playback(player) => Ok(player.advance(&mut self.skeleton, elapsed)),
            PipelineMode::Record(_) => Err(PoseError::WrongMode { expected: "playback" }),
        }
    }

    /// Flushes a recording to its track file. Returns the path written, if any.
    pub fn shutdown(self) -> Result<Option<PathBuf>> {
        match self.mode {
            PipelineMode::Record(recorder) if recorder.track().is_empty() => {
                warn!("Nothing recorded, not writing {}", self.cache_path.display());
                Ok(None)
            }
            PipelineMode::Record(recorder) => {
                cache::flush(recorder.track(), &self.cache_path)?;
                Ok(Some(self.cache_path))
            }
            PipelineMode::Playback(_) => Ok(None),
        }
    }
}
