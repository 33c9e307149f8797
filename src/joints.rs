// src/joints.rs - Fixed skeletal topology and live per-joint state
use nalgebra::Vector3;
use std::fmt;

/// Joints decoded directly from the network volumes.
pub const NETWORK_JOINTS: usize = 24;

/// Network joints plus the kinematically derived ones.
pub const JOINT_COUNT: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointIndex {
    RightShoulder,
    RightForearm,
    RightHand,
    RightThumb,
    RightMiddleFinger,
    LeftShoulder,
    LeftForearm,
    LeftHand,
    LeftThumb,
    LeftMiddleFinger,
    LeftEar,
    LeftEye,
    RightEar,
    RightEye,
    Nose,
    RightThigh,
    RightShin,
    RightFoot,
    RightToe,
    LeftThigh,
    LeftShin,
    LeftFoot,
    LeftToe,
    AbdomenUpper,
    // Derived
    Hip,
    Head,
    Neck,
    Spine,
}

impl JointIndex {
    pub const ALL: [JointIndex; JOINT_COUNT] = [
        JointIndex::RightShoulder,
        JointIndex::RightForearm,
        JointIndex::RightHand,
        JointIndex::RightThumb,
        JointIndex::RightMiddleFinger,
        JointIndex::LeftShoulder,
        JointIndex::LeftForearm,
        JointIndex::LeftHand,
        JointIndex::LeftThumb,
        JointIndex::LeftMiddleFinger,
        JointIndex::LeftEar,
        JointIndex::LeftEye,
        JointIndex::RightEar,
        JointIndex::RightEye,
        JointIndex::Nose,
        JointIndex::RightThigh,
        JointIndex::RightShin,
        JointIndex::RightFoot,
        JointIndex::RightToe,
        JointIndex::LeftThigh,
        JointIndex::LeftShin,
        JointIndex::LeftFoot,
        JointIndex::LeftToe,
        JointIndex::AbdomenUpper,
        JointIndex::Hip,
        JointIndex::Head,
        JointIndex::Neck,
        JointIndex::Spine,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_derived(self) -> bool {
        self.index() >= NETWORK_JOINTS
    }

    pub fn name(self) -> &'static str {
        match self {
            JointIndex::RightShoulder => "right_shoulder",
            JointIndex::RightForearm => "right_forearm",
            JointIndex::RightHand => "right_hand",
            JointIndex::RightThumb => "right_thumb",
            JointIndex::RightMiddleFinger => "right_middle_finger",
            JointIndex::LeftShoulder => "left_shoulder",
            JointIndex::LeftForearm => "left_forearm",
            JointIndex::LeftHand => "left_hand",
            JointIndex::LeftThumb => "left_thumb",
            JointIndex::LeftMiddleFinger => "left_middle_finger",
            JointIndex::LeftEar => "left_ear",
            JointIndex::LeftEye => "left_eye",
            JointIndex::RightEar => "right_ear",
            JointIndex::RightEye => "right_eye",
            JointIndex::Nose => "nose",
            JointIndex::RightThigh => "right_thigh",
            JointIndex::RightShin => "right_shin",
            JointIndex::RightFoot => "right_foot",
            JointIndex::RightToe => "right_toe",
            JointIndex::LeftThigh => "left_thigh",
            JointIndex::LeftShin => "left_shin",
            JointIndex::LeftFoot => "left_foot",
            JointIndex::LeftToe => "left_toe",
            JointIndex::AbdomenUpper => "abdomen_upper",
            JointIndex::Hip => "hip",
            JointIndex::Head => "head",
            JointIndex::Neck => "neck",
            JointIndex::Spine => "spine",
        }
    }
}

impl fmt::Display for JointIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Live state of one joint, carried across frames by the pipeline.
#[derive(Debug, Clone)]
pub struct JointPoint {
    /// Current-frame decoded (or derived) position.
    pub raw_position: Vector3<f32>,
    /// Output of the Kalman filter and low-pass cascade.
    pub filtered_position: Vector3<f32>,
    /// Peak heat map score this frame. Not normalized.
    pub confidence: f32,
    pub estimate: Vector3<f32>,
    pub error_covariance: Vector3<f32>,
    pub gain: Vector3<f32>,
    /// Low-pass stages, newest first.
    pub filter_history: Vec<Vector3<f32>>,
}

impl JointPoint {
    pub fn new(initial_covariance: f32, history_len: usize) -> Self {
        Self {
            raw_position: Vector3::zeros(),
            filtered_position: Vector3::zeros(),
            confidence: 0.0,
            estimate: Vector3::zeros(),
            error_covariance: Vector3::repeat(initial_covariance),
            gain: Vector3::zeros(),
            filter_history: vec![Vector3::zeros(); history_len.max(1)],
        }
    }
}

/// The full live joint set, indexed by [`JointIndex`].
#[derive(Debug, Clone)]
pub struct Skeleton {
    points: Vec<JointPoint>,
}

impl Skeleton {
    pub fn new(initial_covariance: f32, history_len: usize) -> Self {
        Self {
            points: (0..JOINT_COUNT)
                .map(|_| JointPoint::new(initial_covariance, history_len))
                .collect(),
        }
    }

    pub fn get(&self, joint: JointIndex) -> &JointPoint {
        &self.points[joint.index()]
    }

    pub fn get_mut(&mut self, joint: JointIndex) -> &mut JointPoint {
        &mut self.points[joint.index()]
    }

    pub fn raw(&self, joint: JointIndex) -> Vector3<f32> {
        self.points[joint.index()].raw_position
    }

    pub fn set_raw(&mut self, joint: JointIndex, position: Vector3<f32>) {
        self.points[joint.index()].raw_position = position;
    }

    pub fn points(&self) -> &[JointPoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [JointPoint] {
        &mut self.points
    }

    /// Filtered positions in joint order, as read by a rig.
    pub fn positions(&self) -> Vec<Vector3<f32>> {
        self.points.iter().map(|p| p.filtered_position).collect()
    }
}
