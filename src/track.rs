// src/track.rs - Recorded joint snapshots, their line format, denoising and playback
use crate::error::{PoseError, Result};
use crate::joints::Skeleton;
use csv::{ReaderBuilder, WriterBuilder};
use nalgebra::Vector3;
use std::io::{Read, Write};

/// Separates joint records within a line.
pub const JOINT_DELIMITER: u8 = b'\t';
/// Separates the numeric fields of one joint record.
pub const FIELD_DELIMITER: char = ',';

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    pub position: Vector3<f32>,
    pub confidence: f32,
}

impl JointSample {
    pub fn new(position: Vector3<f32>, confidence: f32) -> Self {
        Self {
            position,
            confidence,
        }
    }

    /// `x,y,z,confidence,timestamp`, shortest round-trip formatting.
    pub fn to_field(&self, timestamp: f64) -> String {
        let p = &self.position;
        format!(
            "{}{d}{}{d}{}{d}{}{d}{}",
            p.x,
            p.y,
            p.z,
            self.confidence,
            timestamp,
            d = FIELD_DELIMITER
        )
    }

    pub fn parse_field(field: &str, line: usize) -> Result<(Self, f64)> {
        let parts: Vec<&str> = field.split(FIELD_DELIMITER).collect();
        if parts.len() != 5 {
            return Err(PoseError::MalformedTrack {
                line,
                reason: format!("joint record has {} fields, expected 5", parts.len()),
            });
        }

        let number = |s: &str| {
            s.trim().parse::<f32>().map_err(|e| PoseError::MalformedTrack {
                line,
                reason: format!("bad number {:?}: {}", s, e),
            })
        };
        let timestamp = parts[4].trim().parse::<f64>().map_err(|e| PoseError::MalformedTrack {
            line,
            reason: format!("bad timestamp {:?}: {}", parts[4], e),
        })?;

        let sample = JointSample::new(
            Vector3::new(number(parts[0])?, number(parts[1])?, number(parts[2])?),
            number(parts[3])?,
        );
        Ok((sample, timestamp))
    }
}

/// One frame of the track. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSnapshot {
    pub timestamp: f64,
    pub joints: Vec<JointSample>,
}

impl JointSnapshot {
    pub fn capture(skeleton: &Skeleton, timestamp: f64) -> Self {
        Self {
            timestamp,
            joints: skeleton
                .points()
                .iter()
                .map(|p| JointSample::new(p.filtered_position, p.confidence))
                .collect(),
        }
    }

    /// Writes the cached values straight into the live joints.
    pub fn apply_to(&self, skeleton: &mut Skeleton) {
        for (point, sample) in skeleton.points_mut().iter_mut().zip(&self.joints) {
            point.filtered_position = sample.position;
            point.confidence = sample.confidence;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    snapshots: Vec<JointSnapshot>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: JointSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn snapshots(&self) -> &[JointSnapshot] {
        &self.snapshots
    }

    pub fn get(&self, index: usize) -> Option<&JointSnapshot> {
        self.snapshots.get(index)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn duration(&self) -> f64 {
        match (self.snapshots.first(), self.snapshots.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// One line per snapshot, joint records separated by tabs.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(JOINT_DELIMITER)
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(writer);

        for snapshot in &self.snapshots {
            writer.write_record(snapshot.joints.iter().map(|j| j.to_field(snapshot.timestamp)))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Parses a track without denoising. Every line must carry
    /// `joint_count` records and timestamps must be finite and non-decreasing.
    pub fn read_from<R: Read>(reader: R, joint_count: usize) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(JOINT_DELIMITER)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut track = Track::new();
        let mut last_timestamp = f64::NEG_INFINITY;
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(track.len() + 1);

            if record.len() != joint_count {
                return Err(PoseError::MalformedTrack {
                    line,
                    reason: format!("{} joint records, expected {}", record.len(), joint_count),
                });
            }

            let mut joints = Vec::with_capacity(joint_count);
            let mut timestamp = None;
            for field in record.iter() {
                let (sample, t) = JointSample::parse_field(field, line)?;
                timestamp.get_or_insert(t);
                joints.push(sample);
            }

            let timestamp = timestamp.unwrap_or(last_timestamp);
            if !timestamp.is_finite() || timestamp < last_timestamp {
                return Err(PoseError::UnorderedTrack { line });
            }
            last_timestamp = timestamp;
            track.push(JointSnapshot { timestamp, joints });
        }
        Ok(track)
    }

    /// Replaces every snapshot's positions with the mean over all snapshots
    /// whose timestamp lies strictly within `window` seconds of it. Clusters
    /// are formed from the values as loaded, not from earlier averages.
    pub fn denoise(&mut self, window: f64) -> Result<()> {
        let source = self.snapshots.clone();
        let n = source.len();
        let (mut lo, mut hi) = (0usize, 0usize);

        for (i, snapshot) in self.snapshots.iter_mut().enumerate() {
            let t = source[i].timestamp;
            while lo < n && source[lo].timestamp - t <= -window {
                lo += 1;
            }
            while hi < n && source[hi].timestamp - t < window {
                hi += 1;
            }

            let cluster = &source[lo.min(hi)..hi];
            if cluster.is_empty() {
                return Err(PoseError::NonFiniteAverage { index: i });
            }

            for (k, sample) in snapshot.joints.iter_mut().enumerate() {
                let sum = cluster.iter().fold(Vector3::<f64>::zeros(), |acc, s| {
                    acc + s.joints[k].position.cast::<f64>()
                });
                let mean = (sum / cluster.len() as f64).cast::<f32>();
                if !mean.iter().all(|v| v.is_finite()) {
                    return Err(PoseError::NonFiniteAverage { index: i });
                }
                sample.position = mean;
            }
        }
        Ok(())
    }
}

/// Playback position in a track. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    index: usize,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Moves to the last snapshot whose timestamp is not after `elapsed` and
    /// returns it. Past the end the final snapshot is held.
    pub fn advance<'t>(&mut self, track: &'t Track, elapsed: f64) -> Option<&'t JointSnapshot> {
        let snapshots = track.snapshots();
        while self.index + 1 < snapshots.len() && snapshots[self.index + 1].timestamp <= elapsed {
            self.index += 1;
        }
        snapshots.get(self.index)
    }

    pub fn at_end(&self, track: &Track) -> bool {
        self.index + 1 >= track.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(timestamp: f64, positions: &[[f32; 3]]) -> JointSnapshot {
        JointSnapshot {
            timestamp,
            joints: positions
                .iter()
                .map(|p| JointSample::new(Vector3::new(p[0], p[1], p[2]), 0.5))
                .collect(),
        }
    }

    fn track_of(points: &[(f64, [f32; 3])]) -> Track {
        let mut track = Track::new();
        for (t, p) in points {
            track.push(snapshot(*t, &[*p]));
        }
        track
    }

    #[test]
    fn test_raw_values_round_trip() {
        let mut track = Track::new();
        for i in 0..20 {
            let f = i as f32;
            track.push(JointSnapshot {
                timestamp: i as f64 * 0.033_333_3 + 1e-9,
                joints: vec![
                    JointSample::new(Vector3::new(f * 0.1, -f / 3.0, 1.0e-7 * f), f.sqrt()),
                    JointSample::new(Vector3::new(123.456_79, f32::MIN_POSITIVE, -0.0), 0.0),
                ],
            });
        }

        let mut buf = Vec::new();
        track.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text.lines().count(), 20);
        assert_eq!(text.lines().next().unwrap().split('\t').count(), 2);

        let loaded = Track::read_from(buf.as_slice(), 2).unwrap();
        assert_eq!(loaded, track);
    }

    #[test]
    fn test_line_layout() {
        let track = track_of(&[(0.5, [1.0, 2.5, -3.0])]);
        let mut buf = Vec::new();
        track.write_to(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1,2.5,-3,0.5,0.5\n");
    }

    #[test]
    fn test_rejects_wrong_joint_count() {
        let text = "1,2,3,0.5,0.0\t1,2,3,0.5,0.0\n1,2,3,0.5,0.1\n";
        match Track::read_from(text.as_bytes(), 2) {
            Err(PoseError::MalformedTrack { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_numbers() {
        assert!(matches!(
            Track::read_from("1,2,x,0.5,0.0\n".as_bytes(), 1),
            Err(PoseError::MalformedTrack { .. })
        ));
        assert!(matches!(
            Track::read_from("1,2,3,0.5\n".as_bytes(), 1),
            Err(PoseError::MalformedTrack { .. })
        ));
    }

    #[test]
    fn test_rejects_backwards_timestamps() {
        let text = "0,0,0,1,0.5\n0,0,0,1,0.2\n";
        assert!(matches!(
            Track::read_from(text.as_bytes(), 1),
            Err(PoseError::UnorderedTrack { line: 2 })
        ));
    }

    #[test]
    fn test_denoise_clusters() {
        let mut track = track_of(&[
            (0.0, [0.0, 0.0, 0.0]),
            (0.05, [2.0, 0.0, 0.0]),
            (0.3, [10.0, 0.0, 0.0]),
        ]);
        track.denoise(0.1).unwrap();
        let xs: Vec<f32> = track.snapshots().iter().map(|s| s.joints[0].position.x).collect();
        assert_eq!(xs, vec![1.0, 1.0, 10.0]);
        assert_eq!(track.snapshots()[1].timestamp, 0.05);
        assert_eq!(track.snapshots()[1].joints[0].confidence, 0.5);
    }

    #[test]
    fn test_denoise_uses_loaded_values() {
        // A chain where each neighbour is in range but the ends are not.
        let mut track = track_of(&[
            (0.0, [0.0, 0.0, 0.0]),
            (0.08, [3.0, 0.0, 0.0]),
            (0.16, [6.0, 0.0, 0.0]),
        ]);
        track.denoise(0.1).unwrap();
        let xs: Vec<f32> = track.snapshots().iter().map(|s| s.joints[0].position.x).collect();
        assert_eq!(xs, vec![1.5, 3.0, 4.5]);
    }

    #[test]
    fn test_denoise_window_is_strict() {
        let mut track = track_of(&[(0.0, [0.0, 0.0, 0.0]), (0.5, [4.0, 0.0, 0.0])]);
        track.denoise(0.5).unwrap();
        assert_eq!(track.snapshots()[0].joints[0].position.x, 0.0);
        assert_eq!(track.snapshots()[1].joints[0].position.x, 4.0);
    }

    #[test]
    fn test_denoise_reports_non_finite() {
        let mut track = track_of(&[(0.0, [f32::NAN, 0.0, 0.0])]);
        assert!(matches!(
            track.denoise(0.1),
            Err(PoseError::NonFiniteAverage { index: 0 })
        ));
    }

    #[test]
    fn test_cursor_picks_last_not_after() {
        let track = track_of(&[
            (0.0, [0.0, 0.0, 0.0]),
            (1.0, [1.0, 0.0, 0.0]),
            (2.0, [2.0, 0.0, 0.0]),
        ]);
        let mut cursor = PlaybackCursor::new();
        assert_eq!(cursor.advance(&track, -1.0).map(|s| s.timestamp), Some(0.0));
        cursor.advance(&track, 1.5);
        assert_eq!(cursor.index(), 1);
        assert!(!cursor.at_end(&track));
        cursor.advance(&track, 5.0);
        assert_eq!(cursor.index(), 2);
        assert!(cursor.at_end(&track));

        // never moves backward
        cursor.advance(&track, 0.5);
        assert_eq!(cursor.index(), 2);
    }

    #[test]
    fn test_cursor_on_empty_track() {
        let mut cursor = PlaybackCursor::new();
        assert!(cursor.advance(&Track::new(), 3.0).is_none());
    }

    #[test]
    fn test_capture_and_apply() {
        let mut skeleton = Skeleton::new(0.01, 6);
        skeleton.points_mut()[3].filtered_position = Vector3::new(1.0, 2.0, 3.0);
        skeleton.points_mut()[3].confidence = 0.7;
        let snap = JointSnapshot::capture(&skeleton, 4.0);
        assert_eq!(snap.joints.len(), skeleton.points().len());

        let mut other = Skeleton::new(0.01, 6);
        snap.apply_to(&mut other);
        assert_eq!(other.points()[3].filtered_position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(other.points()[3].confidence, 0.7);
    }
}
