// src/filter.rs - Per-axis scalar Kalman filter and low-pass cascade
use crate::config::FilterConfig;
use crate::joints::{JointPoint, Skeleton};
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanParams {
    /// Process noise.
    pub q: f32,
    /// Measurement noise.
    pub r: f32,
}

impl KalmanParams {
    pub fn new(q: f32, r: f32) -> Self {
        Self { q, r }
    }

    /// Fixed point of the covariance recurrence, `P = R(P+Q)/(R+P+Q)`.
    pub fn steady_state_covariance(&self) -> f32 {
        let (q, r) = (self.q, self.r);
        (-q + (q * q + 4.0 * q * r).sqrt()) / 2.0
    }

    /// One covariance step: returns `(gain, next_covariance)` from the
    /// pre-update covariance.
    pub fn step(&self, covariance: f32) -> (f32, f32) {
        let predicted = covariance + self.q;
        let gain = predicted / (predicted + self.r);
        let next = self.r * predicted / (self.r + predicted);
        (gain, next)
    }
}

/// Runs one Kalman update on every axis of `point`, reading `raw_position`
/// and writing `filtered_position`. The estimate is only replaced after the
/// filtered value has been computed.
pub fn kalman_update(point: &mut JointPoint, params: &KalmanParams) {
    for axis in 0..3 {
        let (gain, covariance) = params.step(point.error_covariance[axis]);
        point.gain[axis] = gain;
        point.error_covariance[axis] = covariance;

        let estimate = point.estimate[axis];
        point.filtered_position[axis] = estimate + (point.raw_position[axis] - estimate) * gain;
    }
    point.estimate = point.filtered_position;
}

/// Pushes `filtered_position` through the cascade of single-pole stages and
/// replaces it with the last stage. `alpha` is the weight of the newer stage:
/// 1.0 passes the input straight through, 0.0 holds the last stage as is.
pub fn low_pass_update(point: &mut JointPoint, alpha: f32) {
    let history = &mut point.filter_history;
    if history.is_empty() {
        return;
    }
    history[0] = point.filtered_position;
    for i in 1..history.len() {
        history[i] = history[i - 1] * alpha + history[i] * (1.0 - alpha);
    }
    point.filtered_position = history[history.len() - 1];
}

/// The whole smoothing stage applied to a skeleton once per frame.
#[derive(Debug, Clone)]
pub struct TemporalFilter {
    kalman: KalmanParams,
    low_pass_alpha: Option<f32>,
}

impl TemporalFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            kalman: KalmanParams::new(config.kalman_q, config.kalman_r),
            low_pass_alpha: config.use_low_pass.then_some(config.low_pass_alpha),
        }
    }

    pub fn kalman(&self) -> &KalmanParams {
        &self.kalman
    }

    pub fn apply(&self, skeleton: &mut Skeleton) {
        for point in skeleton.points_mut() {
            kalman_update(point, &self.kalman);
            if let Some(alpha) = self.low_pass_alpha {
                low_pass_update(point, alpha);
            }
        }
    }
}
