// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoseError>;

#[derive(Debug, Error)]
pub enum PoseError {
    #[error("{volume} volume has {actual} values, expected {expected}")]
    ShapeMismatch {
        volume: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("track file {} is missing or unreadable", path.display())]
    TrackUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed track at line {line}: {reason}")]
    MalformedTrack { line: usize, reason: String },

    #[error("track timestamps go backwards or are not finite at line {line}")]
    UnorderedTrack { line: usize },

    #[error("elapsed time {0} is not finite")]
    NonFiniteTime(f64),

    #[error("denoising produced a non-finite average for snapshot {index}")]
    NonFiniteAverage { index: usize },

    #[error("operation requires {expected} mode")]
    WrongMode { expected: &'static str },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("inference task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}
