//! The fixed five-step control pipeline.
//!
//! One `execute` call runs, in order: target acquisition (strategy), current
//! orientation read, spherical interpolation, angular velocity, inverse
//! kinematics, and the PID step (strategy-overridable). Only the first and
//! last steps dispatch through the strategy; everything in between is
//! ordinary composed logic.

use crate::domain::models::{MotorCommand, StrategyKind};
use crate::domain::orientation::OrientationStore;
use crate::domain::quaternion::{self, shortest_path, Quaternion};
use crate::domain::strategy::Strategy;
use crate::infrastructure::hardware::actuator::MotorActuator;
use crate::infrastructure::hardware::encoder::EncoderCounter;
use std::time::Instant;
use tracing::trace;

/// Targets closer than this (in `1 - |dot|` distance) are treated as the
/// same approach; anything further starts a new one.
const TARGET_EPSILON: f32 = 1e-4;

/// Fixed actuation axes: three motors spaced 120 degrees around the equator
/// of the mechanism, tilted toward the pole so the matrix has full rank.
/// Placeholder geometry until the physical mechanism is measured.
const MOTOR_AXES: [[f32; 3]; 3] = [
    [0.816_496_6, 0.0, 0.577_350_3],
    [-0.408_248_3, 0.707_106_8, 0.577_350_3],
    [-0.408_248_3, -0.707_106_8, 0.577_350_3],
];

/// Everything the PID step may touch. Diagnostic strategies may ignore
/// `command` and drive the actuator directly.
pub struct PidContext<'a> {
    /// Per-motor command produced by the kinematics step.
    pub command: MotorCommand,
    pub actuator: &'a mut dyn MotorActuator,
    pub encoders: &'a dyn EncoderCounter,
}

/// Spherical interpolation toward the active target.
///
/// The interpolation factor ramps over the course of an approach:
/// `t = (initial - current) / initial`, where the initial angular distance
/// is captured once when a new target arrives. `t` is always clamped to
/// `[0, 1]`; a degenerate zero-length approach snaps straight to the target.
#[derive(Debug, Default)]
pub struct Interpolator {
    approach: Option<Approach>,
}

#[derive(Debug)]
struct Approach {
    target: Quaternion,
    initial_distance: f32,
}

impl Interpolator {
    pub fn step(&mut self, current: Quaternion, target: Quaternion) -> Quaternion {
        let current = current.normalized();
        let (corrected, dot) = shortest_path(current, target.normalized());
        let dot = dot.clamp(0.0, 1.0);
        let distance = 1.0 - dot;

        let initial = match &self.approach {
            Some(a) if 1.0 - a.target.dot(corrected).abs() <= TARGET_EPSILON => {
                a.initial_distance
            }
            _ => {
                self.approach = Some(Approach {
                    target: corrected,
                    initial_distance: distance,
                });
                distance
            }
        };

        let t = interpolation_factor(initial, distance);
        quaternion::slerp(current, corrected, t)
    }
}

fn interpolation_factor(initial: f32, current: f32) -> f32 {
    if initial <= f32::EPSILON {
        return 1.0;
    }
    ((initial - current) / initial).clamp(0.0, 1.0)
}

/// Finite-difference angular velocity from successive pipeline outputs.
#[derive(Debug, Default)]
pub struct VelocityEstimator {
    prev: Option<Quaternion>,
}

impl VelocityEstimator {
    /// Angular velocity (rad/s, body frame) between the previous call and
    /// this one. Zero on the first call or when no time has elapsed.
    pub fn update(&mut self, orientation: Quaternion, dt_secs: f32) -> [f32; 3] {
        let prev = match self.prev.replace(orientation) {
            Some(prev) => prev,
            None => return [0.0; 3],
        };
        if dt_secs <= 0.0 {
            return [0.0; 3];
        }

        let delta = prev.conjugate() * orientation;
        let delta = if delta.w < 0.0 { delta.negated() } else { delta };
        let w = delta.w.clamp(-1.0, 1.0);
        let angle = 2.0 * w.acos();
        let sin_half = (1.0 - w * w).sqrt();
        if sin_half < 1e-6 || angle < 1e-6 {
            return [0.0; 3];
        }

        let scale = angle / (sin_half * dt_secs);
        [delta.x * scale, delta.y * scale, delta.z * scale]
    }
}

/// Project angular velocity onto the motor axes and scale to duty counts,
/// clamped to what the actuator can represent.
pub fn apply_inverse_kinematics(omega: [f32; 3], gain: f32, max_duty: u16) -> MotorCommand {
    let limit = f32::from(max_duty.min(i16::MAX as u16));
    let mut command = [0i16; 3];
    for (slot, axis) in command.iter_mut().zip(MOTOR_AXES.iter()) {
        let projected = axis[0] * omega[0] + axis[1] * omega[1] + axis[2] * omega[2];
        *slot = (projected * gain).clamp(-limit, limit) as i16;
    }
    command
}

/// Orchestrator side of the control-algorithm bridge. Owns its strategy
/// exclusively and drops it when the orchestrator is replaced.
pub struct ControlAlgo {
    strategy: Box<dyn Strategy>,
    interpolator: Interpolator,
    velocity: VelocityEstimator,
    velocity_gain: f32,
    last_tick: Option<Instant>,
}

impl ControlAlgo {
    pub(crate) fn new(strategy: Box<dyn Strategy>, velocity_gain: f32) -> Self {
        Self {
            strategy,
            interpolator: Interpolator::default(),
            velocity: VelocityEstimator::default(),
            velocity_gain,
            last_tick: None,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Run one control cycle.
    pub fn execute(
        &mut self,
        store: &OrientationStore,
        actuator: &mut dyn MotorActuator,
        encoders: &dyn EncoderCounter,
    ) {
        let target = self.strategy.target_quaternion();
        let (current, valid) = store.get();
        if !valid {
            trace!("no orientation sample received yet, holding at identity");
        }

        let interpolated = self.interpolator.step(current, target);

        let now = Instant::now();
        let dt = self
            .last_tick
            .replace(now)
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        let omega = self.velocity.update(interpolated, dt);

        let command = apply_inverse_kinematics(omega, self.velocity_gain, actuator.max_duty());
        trace!(?omega, ?command, "pipeline cycle");

        self.strategy.pid(PidContext {
            command,
            actuator,
            encoders,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quaternion::Quaternion;

    #[test]
    fn interpolation_factor_is_clamped() {
        assert_eq!(interpolation_factor(1.0, 0.0), 1.0);
        assert_eq!(interpolation_factor(1.0, 1.0), 0.0);
        assert_eq!(interpolation_factor(1.0, 2.0), 0.0); // further than the baseline
        assert_eq!(interpolation_factor(0.5, -0.1), 1.0);
    }

    #[test]
    fn interpolation_factor_degenerate_baseline_snaps_to_target() {
        assert_eq!(interpolation_factor(0.0, 0.0), 1.0);
    }

    #[test]
    fn interpolator_tracks_mechanism_progress_toward_a_fixed_target() {
        let mut interp = Interpolator::default();
        let target = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 1.0);
        let mut current = Quaternion::IDENTITY;

        // t starts at zero: the first output holds at the current orientation.
        let out = interp.step(current, target);
        assert!(out.dot(current).abs() > 0.9999);

        // As the mechanism closes the distance, the output ramps to the target.
        for _ in 0..40 {
            current = quaternion::slerp(current, target, 0.3);
            let out = interp.step(current, target);
            assert!((out.magnitude() - 1.0).abs() < 1e-4);
        }
        let out = interp.step(current, target);
        assert!(out.dot(target).abs() > 0.999);
    }

    #[test]
    fn interpolator_restarts_baseline_on_new_target() {
        let mut interp = Interpolator::default();
        let first = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.8);
        let out = interp.step(Quaternion::IDENTITY, first);
        assert!((out.magnitude() - 1.0).abs() < 1e-5);

        // A fresh target resets the baseline, so the first step toward it
        // stays at the current orientation (t = 0).
        let second = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 1.2);
        let held = interp.step(out, second);
        assert!(held.dot(out).abs() > 0.9999);
    }

    #[test]
    fn velocity_is_zero_on_first_cycle_and_when_steady() {
        let mut estimator = VelocityEstimator::default();
        let q = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.3);
        assert_eq!(estimator.update(q, 0.02), [0.0; 3]);
        assert_eq!(estimator.update(q, 0.02), [0.0; 3]);
    }

    #[test]
    fn velocity_matches_a_known_rotation_rate() {
        let mut estimator = VelocityEstimator::default();
        estimator.update(Quaternion::IDENTITY, 0.0);
        // 0.1 rad about z over 0.02 s => 5 rad/s about z.
        let next = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.1);
        let omega = estimator.update(next, 0.02);
        assert!(omega[0].abs() < 1e-3);
        assert!(omega[1].abs() < 1e-3);
        assert!((omega[2] - 5.0).abs() < 0.05);
    }

    #[test]
    fn kinematics_clamps_to_the_duty_range() {
        let command = apply_inverse_kinematics([1_000.0, 1_000.0, 1_000.0], 1_000.0, 1_023);
        for value in command {
            assert!(value.unsigned_abs() <= 1_023);
        }
    }

    #[test]
    fn kinematics_is_zero_for_zero_velocity() {
        assert_eq!(apply_inverse_kinematics([0.0; 3], 300.0, 1_023), [0; 3]);
    }
}
