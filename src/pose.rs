//! Synthetic head pose from right-stick input.
//!
//! Pitch accumulates as a clamped angle, yaw as a running quaternion. The
//! position follows a rigid pivot: the eyes sit on a sphere of radius
//! `pitch_radius` around a pivot at `hmd_height`.

use crate::config::ControlParams;
use crate::types::{InputSnapshot, Pose};
use glam::{DQuat, DVec3};
use std::f64::consts::PI;

pub const PITCH_LIMIT_DEG: f64 = 90.0;

/// Zero values inside the deadzone and rescale the rest so the deadzone
/// edge maps to 0 and full deflection to ±1.
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone || deadzone >= 1.0 {
        return 0.0;
    }
    let magnitude = (value.abs() - deadzone) / (1.0 - deadzone);
    value.signum() * magnitude
}

/// Signed difference `a - b` wrapped into [-π, π].
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let mut diff = (a - b) % (2.0 * PI);
    if diff > PI {
        diff -= 2.0 * PI;
    } else if diff < -PI {
        diff += 2.0 * PI;
    }
    diff
}

/// Per-tick pose integrator. Owned by the pose task.
#[derive(Debug, Clone)]
pub struct PoseSynthesizer {
    pitch_deg: f64,
    yaw: DQuat,
    last_pitch: f64,
    last_yaw: f64,
    last_pose: Pose,
}

impl Default for PoseSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseSynthesizer {
    pub fn new() -> Self {
        Self {
            pitch_deg: 0.0,
            yaw: DQuat::IDENTITY,
            last_pitch: 0.0,
            last_yaw: 0.0,
            last_pose: Pose::default(),
        }
    }

    pub fn pitch_degrees(&self) -> f64 {
        self.pitch_deg
    }

    pub fn yaw_quat(&self) -> DQuat {
        self.yaw
    }

    pub fn last_pose(&self) -> &Pose {
        &self.last_pose
    }

    /// Advance one tick of `dt` seconds. A set `pose_reset` in `params`
    /// recentres the view; the caller clears the latch.
    pub fn step(&mut self, input: &InputSnapshot, params: &ControlParams, dt: f64) -> Pose {
        if params.pitch_enable && input.gamepad_connected {
            let y = apply_deadzone(input.analog_y, params.ctrl_deadzone);
            self.pitch_deg = (self.pitch_deg + (y * params.ctrl_sensitivity) as f64)
                .clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
        }

        if params.yaw_enable && input.gamepad_connected {
            let x = apply_deadzone(input.analog_x, params.ctrl_deadzone);
            let adjust_deg = -(x * params.ctrl_sensitivity) as f64;
            let adjust = DQuat::from_axis_angle(DVec3::Y, adjust_deg.to_radians());
            self.yaw = (adjust * self.yaw).normalize();
        }

        if params.pose_reset {
            self.pitch_deg = 0.0;
            self.yaw = DQuat::IDENTITY;
        }

        let pitch = self.pitch_deg.to_radians();
        let yaw = 2.0 * self.yaw.w.clamp(-1.0, 1.0).acos();

        let pitch_quat = DQuat::from_axis_angle(DVec3::X, pitch);
        let orientation = (self.yaw * pitch_quat).normalize();

        let radius = params.pitch_radius as f64;
        let height = params.hmd_height as f64;
        let position = DVec3::new(
            radius * pitch.cos() * yaw.sin() - radius * yaw.sin(),
            (height - radius * pitch.sin()).max(0.0),
            radius * pitch.cos() * yaw.cos() - radius * yaw.cos(),
        );

        let last = &self.last_pose;
        let (linear_velocity, angular_velocity, linear_accel, angular_accel) =
            if dt > 0.0 && dt.is_finite() {
                let velocity = (position - DVec3::from_array(last.position)) / dt;
                let angular = DVec3::new(
                    angle_difference(pitch, self.last_pitch) / dt,
                    angle_difference(yaw, self.last_yaw) / dt,
                    0.0,
                );
                let accel = (velocity - DVec3::from_array(last.linear_velocity)) / dt;
                let mut angular_accel = (angular - DVec3::from_array(last.angular_velocity)) / dt;
                angular_accel.z = 0.0;
                (velocity, angular, accel, angular_accel)
            } else {
                (DVec3::ZERO, DVec3::ZERO, DVec3::ZERO, DVec3::ZERO)
            };

        let pose = Pose {
            orientation: [orientation.w, orientation.x, orientation.y, orientation.z],
            position: position.to_array(),
            linear_velocity: linear_velocity.to_array(),
            angular_velocity: angular_velocity.to_array(),
            linear_accel: linear_accel.to_array(),
            angular_accel: angular_accel.to_array(),
            valid: true,
            connected: true,
        };

        self.last_pitch = pitch;
        self.last_yaw = yaw;
        self.last_pose = pose;
        pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ControlParams {
        ControlParams {
            pitch_enable: true,
            yaw_enable: true,
            ctrl_deadzone: 0.1,
            ctrl_sensitivity: 2.0,
            pitch_radius: 0.2,
            hmd_height: 1.5,
            pose_reset: false,
        }
    }

    fn stick(x: f32, y: f32) -> InputSnapshot {
        InputSnapshot {
            gamepad_connected: true,
            analog_x: x,
            analog_y: y,
            ..InputSnapshot::default()
        }
    }

    #[test]
    fn test_deadzone() {
        assert_eq!(apply_deadzone(0.05, 0.1), 0.0);
        assert_eq!(apply_deadzone(-0.09, 0.1), 0.0);
        assert!((apply_deadzone(0.1, 0.1)).abs() < 1e-6);
        assert!((apply_deadzone(1.0, 0.1) - 1.0).abs() < 1e-6);
        assert!((apply_deadzone(-1.0, 0.1) + 1.0).abs() < 1e-6);
        assert!((apply_deadzone(0.55, 0.1) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_angle_difference_wraps() {
        assert!((angle_difference(0.1, -0.1) - 0.2).abs() < 1e-12);
        assert!((angle_difference(0.1, 2.0 * PI - 0.1) - 0.2).abs() < 1e-9);
        assert!((angle_difference(2.0 * PI - 0.1, 0.1) + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut synth = PoseSynthesizer::new();
        for _ in 0..1000 {
            synth.step(&stick(0.0, 1.0), &params(), 0.008);
        }
        assert_eq!(synth.pitch_degrees(), PITCH_LIMIT_DEG);

        for _ in 0..2000 {
            synth.step(&stick(0.0, -1.0), &params(), 0.008);
        }
        assert_eq!(synth.pitch_degrees(), -PITCH_LIMIT_DEG);
    }

    #[test]
    fn test_yaw_quaternion_stays_normalized() {
        let mut synth = PoseSynthesizer::new();
        let mut p = params();
        p.ctrl_sensitivity = 3.7;
        for i in 0..10_000 {
            let x = if i % 3 == 0 { -0.8 } else { 0.95 };
            synth.step(&stick(x, 0.0), &p, 0.008);
        }
        assert!((synth.yaw_quat().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rest_pose_sits_at_pivot_height() {
        let mut synth = PoseSynthesizer::new();
        let pose = synth.step(&stick(0.0, 0.0), &params(), 0.008);
        assert!(pose.valid && pose.connected);
        assert_eq!(pose.orientation, [1.0, 0.0, 0.0, 0.0]);
        assert!(pose.position[0].abs() < 1e-12);
        assert!((pose.position[1] - 1.5).abs() < 1e-6);
        assert!(pose.position[2].abs() < 1e-12);
    }

    #[test]
    fn test_pitch_moves_head_on_pivot() {
        let mut synth = PoseSynthesizer::new();
        let mut p = params();
        p.ctrl_sensitivity = 30.0;
        p.ctrl_deadzone = 0.0;
        synth.step(&stick(0.0, 0.0), &p, 0.008);
        let pose = synth.step(&stick(0.0, 1.0), &p, 0.008);
        // 30 degrees up: y = H - R * sin(30°)
        assert!((pose.position[1] - (1.5 - 0.2 * 0.5)).abs() < 1e-6);
        assert!(pose.linear_velocity[1] < 0.0);
        assert!(pose.angular_velocity[0] > 0.0);
        assert_eq!(pose.angular_velocity[2], 0.0);
    }

    #[test]
    fn test_height_floors_at_zero() {
        let mut synth = PoseSynthesizer::new();
        let mut p = params();
        p.hmd_height = 0.1;
        p.pitch_radius = 1.0;
        p.ctrl_sensitivity = 90.0;
        p.ctrl_deadzone = 0.0;
        let pose = synth.step(&stick(0.0, 1.0), &p, 0.008);
        assert_eq!(pose.position[1], 0.0);
    }

    #[test]
    fn test_zero_dt_gives_zero_derivatives() {
        let mut synth = PoseSynthesizer::new();
        let pose = synth.step(&stick(1.0, 1.0), &params(), 0.0);
        assert_eq!(pose.linear_velocity, [0.0; 3]);
        assert_eq!(pose.angular_velocity, [0.0; 3]);
        assert_eq!(pose.linear_accel, [0.0; 3]);
        assert_eq!(pose.angular_accel, [0.0; 3]);
        assert!(pose.position.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_no_gamepad_no_motion() {
        let mut synth = PoseSynthesizer::new();
        let mut input = stick(1.0, 1.0);
        input.gamepad_connected = false;
        synth.step(&input, &params(), 0.008);
        assert_eq!(synth.pitch_degrees(), 0.0);
        assert_eq!(synth.yaw_quat(), DQuat::IDENTITY);
    }

    #[test]
    fn test_reset_recentres() {
        let mut synth = PoseSynthesizer::new();
        for _ in 0..20 {
            synth.step(&stick(1.0, 1.0), &params(), 0.008);
        }
        assert!(synth.pitch_degrees() > 0.0);

        let mut p = params();
        p.pose_reset = true;
        let pose = synth.step(&stick(0.0, 0.0), &p, 0.008);
        assert_eq!(synth.pitch_degrees(), 0.0);
        assert_eq!(synth.yaw_quat(), DQuat::IDENTITY);
        assert_eq!(pose.orientation, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_yaw_offset_is_lateral() {
        let mut synth = PoseSynthesizer::new();
        let mut p = params();
        p.pitch_enable = false;
        p.ctrl_deadzone = 0.0;
        p.ctrl_sensitivity = 10.0;
        let pose = synth.step(&stick(-1.0, 0.0), &p, 0.008);
        // Pitch zero keeps the head on the pivot axis whatever the yaw.
        assert!(pose.position[0].abs() < 1e-12);
        assert!(pose.position[2].abs() < 1e-12);
        assert!(pose.angular_velocity[1] > 0.0);
    }
}
