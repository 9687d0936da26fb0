//! Constant-velocity Kalman filter over `(cx, cy, aspect, height)` boxes.
//!
//! State is `(cx, cy, a, h, vcx, vcy, va, vh)`; noise scales with the box
//! height so that large and small objects get comparable uncertainty.

use nalgebra as na;

use crate::bbox::{BBox, Xyah};
use crate::error::{Error, Result};

type Vector8 = na::SVector<f32, 8>;
type Matrix8 = na::SMatrix<f32, 8, 8>;
type Matrix4x8 = na::SMatrix<f32, 4, 8>;

/// 0.95 quantile of the chi-square distribution with 4 degrees of freedom.
pub const CHI2INV95_4: f32 = 9.4877;

#[derive(Debug, Clone, PartialEq)]
pub struct KalmanState {
    pub mean: Vector8,
    pub covariance: Matrix8,
}

impl KalmanState {
    #[inline]
    pub fn bbox(&self) -> BBox<Xyah> {
        BBox::xyah(self.mean[0], self.mean[1], self.mean[2], self.mean[3])
    }
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion: Matrix8,
    observation: Matrix4x8,
    std_weight_position: f32,
    std_weight_velocity: f32,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion = Matrix8::identity();
        for i in 0..4 {
            motion[(i, i + 4)] = 1.0;
        }

        Self {
            motion,
            observation: Matrix4x8::identity(),
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// New track state from an unassociated measurement, zero velocity.
    pub fn initiate(&self, measurement: &BBox<Xyah>) -> KalmanState {
        let z = measurement.as_slice();
        let mut mean = Vector8::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from_slice(z);

        let h = measurement.height();
        let (p, v) = (self.std_weight_position, self.std_weight_velocity);
        let std = [
            2.0 * p * h,
            2.0 * p * h,
            1e-2,
            2.0 * p * h,
            10.0 * v * h,
            10.0 * v * h,
            1e-5,
            10.0 * v * h,
        ];

        KalmanState {
            mean,
            covariance: Matrix8::from_diagonal(&Vector8::from_iterator(std.iter().map(|s| s * s))),
        }
    }

    pub fn predict(&self, state: &mut KalmanState) {
        let h = state.mean[3];
        let (p, v) = (self.std_weight_position, self.std_weight_velocity);
        let std = [p * h, p * h, 1e-2, p * h, v * h, v * h, 1e-5, v * h];
        let q = Matrix8::from_diagonal(&Vector8::from_iterator(std.iter().map(|s| s * s)));

        state.mean = self.motion * state.mean;
        state.covariance = self.motion * state.covariance * self.motion.transpose() + q;
    }

    /// State distribution projected into measurement space.
    pub fn project(&self, state: &KalmanState) -> (na::Vector4<f32>, na::Matrix4<f32>) {
        let h = state.mean[3];
        let p = self.std_weight_position;
        let std = [p * h, p * h, 1e-1, p * h];
        let r = na::Matrix4::from_diagonal(&na::Vector4::from_iterator(std.iter().map(|s| s * s)));

        let mean = self.observation * state.mean;
        let cov = self.observation * state.covariance * self.observation.transpose() + r;

        (mean, cov)
    }

    pub fn update(&self, state: &mut KalmanState, measurement: &BBox<Xyah>) -> Result<()> {
        let (proj_mean, proj_cov) = self.project(state);
        let s_inv = proj_cov
            .try_inverse()
            .ok_or_else(|| Error::Tracker("innovation covariance is singular".into()))?;

        let gain = state.covariance * self.observation.transpose() * s_inv;
        let innovation = na::Vector4::from_row_slice(measurement.as_slice()) - proj_mean;

        state.mean += gain * innovation;
        state.covariance -= gain * proj_cov * gain.transpose();

        Ok(())
    }

    /// Squared Mahalanobis distance from the state to each measurement.
    pub fn gating_distance(&self, state: &KalmanState, measurements: &[BBox<Xyah>]) -> Vec<f32> {
        let (mean, cov) = self.project(state);

        let Some(inv) = cov.try_inverse() else {
            return vec![f32::INFINITY; measurements.len()];
        };

        measurements
            .iter()
            .map(|m| {
                let d = na::Vector4::from_row_slice(m.as_slice()) - mean;
                (d.transpose() * inv * d)[(0, 0)]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn follows_constant_motion() {
        let kf = KalmanFilter::new();
        let mut state = kf.initiate(&BBox::xyah(100.0, 100.0, 0.5, 40.0));

        for step in 1..=10 {
            kf.predict(&mut state);
            let m = BBox::xyah(100.0 + 5.0 * step as f32, 100.0, 0.5, 40.0);
            kf.update(&mut state, &m).unwrap();
        }

        kf.predict(&mut state);
        // velocity has been learned, the prediction leads the last measurement
        assert!(state.mean[0] > 150.0);
        assert_abs_diff_eq!(state.mean[1], 100.0, epsilon = 0.5);
    }

    #[test]
    fn gating_prefers_close_measurements() {
        let kf = KalmanFilter::new();
        let state = kf.initiate(&BBox::xyah(50.0, 50.0, 0.5, 40.0));

        let d = kf.gating_distance(
            &state,
            &[BBox::xyah(51.0, 50.0, 0.5, 40.0), BBox::xyah(250.0, 50.0, 0.5, 40.0)],
        );

        assert!(d[0] < CHI2INV95_4);
        assert!(d[1] > CHI2INV95_4);
    }
}
