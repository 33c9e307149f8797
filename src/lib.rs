// src/lib.rs
pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod export;
pub mod filter;
pub mod frames;
pub mod inference;
pub mod joints;
pub mod kinematics;
pub mod pipeline;
pub mod session;
pub mod track;
pub mod volume;

pub use config::PipelineConfig;
pub use error::{PoseError, Result};
pub use joints::{JointIndex, JointPoint, Skeleton};
pub use pipeline::PosePipeline;
pub use session::Session;
pub use track::{JointSnapshot, Track};
