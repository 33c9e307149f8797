// src/export.rs - Analysis exports of a recorded track
use crate::error::Result;
use crate::joints::JointIndex;
use crate::track::Track;
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct JointRecord {
    frame: usize,
    timestamp: f64,
    joint: &'static str,
    x: f32,
    y: f32,
    z: f32,
    confidence: f32,
}

/// `~/Documents/PoseTracker`, or `./output` when there is no home directory.
pub fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("PoseTracker")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

pub struct TrackExporter {
    output_dir: PathBuf,
    session_name: String,
}

impl TrackExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// One row per joint per frame.
    pub fn export_csv(&self, track: &Track) -> Result<PathBuf> {
        let csv_path = self.output_dir.join(&self.session_name).join("track.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = Writer::from_writer(File::create(&csv_path)?);
        for (frame, snapshot) in track.snapshots().iter().enumerate() {
            for (i, sample) in snapshot.joints.iter().enumerate() {
                let joint = JointIndex::from_index(i).map(JointIndex::name).unwrap_or("unknown");
                writer.serialize(JointRecord {
                    frame,
                    timestamp: snapshot.timestamp,
                    joint,
                    x: sample.position.x,
                    y: sample.position.y,
                    z: sample.position.z,
                    confidence: sample.confidence,
                })?;
            }
        }
        writer.flush()?;
        Ok(csv_path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub frames: usize,
    pub duration: f64,
    /// Average frames per second over the recording.
    pub rate: f64,
    pub mean_confidence: Vec<(JointIndex, f32)>,
}

impl TrackSummary {
    pub fn from_track(track: &Track) -> Self {
        let frames = track.len();
        let duration = track.duration();
        let rate = if duration > 0.0 {
            frames.saturating_sub(1) as f64 / duration
        } else {
            0.0
        };

        let mean_confidence = JointIndex::ALL
            .iter()
            .map(|joint| {
                let total: f32 = track
                    .snapshots()
                    .iter()
                    .filter_map(|s| s.joints.get(joint.index()))
                    .map(|j| j.confidence)
                    .sum();
                let mean = if frames == 0 { 0.0 } else { total / frames as f32 };
                (*joint, mean)
            })
            .collect();

        Self {
            frames,
            duration,
            rate,
            mean_confidence,
        }
    }
}
