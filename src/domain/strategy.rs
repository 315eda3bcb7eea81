//! Control strategies and the switch-driven selector.
//!
//! The C-style bridge from the mechanism's first firmware becomes a trait
//! seam: the orchestrator runs the fixed pipeline and dispatches only target
//! acquisition and the PID step through `Strategy`.

use crate::domain::models::StrategyKind;
use crate::domain::pipeline::{ControlAlgo, PidContext};
use crate::domain::quaternion::Quaternion;
use crate::domain::settings::ControlSettings;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Overridable steps of the control pipeline.
pub trait Strategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Produce the target orientation for this cycle. Must be (close to) a
    /// unit quaternion.
    fn target_quaternion(&mut self) -> Quaternion;

    /// Final pipeline step. The default drives the actuator with the
    /// kinematics output; diagnostic strategies may bypass it entirely.
    fn pid(&mut self, ctx: PidContext<'_>) {
        ctx.actuator.set_motor_speeds(ctx.command);
    }
}

/// Externally fed target orientation, shared with an operator-input or
/// perception task. Identity until the producer writes.
#[derive(Debug, Clone)]
pub struct TargetFeed {
    inner: Arc<Mutex<Quaternion>>,
}

impl TargetFeed {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Quaternion::IDENTITY)),
        }
    }

    pub fn set(&self, quat: Quaternion) {
        *self.inner.lock().unwrap() = quat;
    }

    pub fn get(&self) -> Quaternion {
        *self.inner.lock().unwrap()
    }
}

impl Default for TargetFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Motor patterns for the wiring diagnostic: each motor alone, then pairs.
const DBT2_PATTERNS: [[bool; 3]; 6] = [
    [true, false, false],
    [false, true, false],
    [false, false, true],
    [true, true, false],
    [false, true, true],
    [true, false, true],
];

/// Drive-by-test 2: validates wiring and motor direction, not closed-loop
/// control. Overrides the PID step to sequence fixed motor patterns at half
/// duty, holding each for a fixed dwell and bypassing kinematics.
pub struct Dbt2 {
    dwell: Duration,
    started: Option<Instant>,
}

impl Dbt2 {
    pub fn new(dwell: Duration) -> Self {
        debug!("dbt2 created");
        Self {
            dwell,
            started: None,
        }
    }

    fn step_index(&self, elapsed: Duration) -> usize {
        let dwell_ms = self.dwell.as_millis().max(1);
        (elapsed.as_millis() / dwell_ms) as usize % DBT2_PATTERNS.len()
    }
}

impl Strategy for Dbt2 {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dbt2
    }

    fn target_quaternion(&mut self) -> Quaternion {
        // Unused; the PID override ignores the pipeline output.
        Quaternion::IDENTITY
    }

    fn pid(&mut self, ctx: PidContext<'_>) {
        let elapsed = self.started.get_or_insert_with(Instant::now).elapsed();
        let pattern = DBT2_PATTERNS[self.step_index(elapsed)];
        let duty = (ctx.actuator.max_duty().min(i16::MAX as u16) / 2) as i16;

        let mut command = [0i16; 3];
        for (slot, on) in command.iter_mut().zip(pattern) {
            if on {
                *slot = duty;
            }
        }
        ctx.actuator.set_motor_speeds(command);
    }
}

/// Follows a precomputed looping list of unit quaternions, holding each
/// keyframe for a fixed number of cycles.
pub struct PathFollowing {
    path: Vec<Quaternion>,
    hold: u32,
    index: usize,
    cycles_on_keyframe: u32,
}

impl PathFollowing {
    pub fn new(path: Vec<Quaternion>, hold: u32) -> Self {
        debug!(keyframes = path.len(), "path following created");
        Self {
            path,
            hold: hold.max(1),
            index: 0,
            cycles_on_keyframe: 0,
        }
    }
}

impl Strategy for PathFollowing {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PathFollowing
    }

    fn target_quaternion(&mut self) -> Quaternion {
        let Some(&keyframe) = self.path.get(self.index) else {
            return Quaternion::IDENTITY;
        };
        self.cycles_on_keyframe += 1;
        if self.cycles_on_keyframe >= self.hold {
            self.cycles_on_keyframe = 0;
            self.index = (self.index + 1) % self.path.len();
        }
        keyframe
    }
}

/// Target from operator joystick input.
pub struct Joystick {
    feed: TargetFeed,
}

impl Joystick {
    pub fn new(feed: TargetFeed) -> Self {
        debug!("joystick created");
        Self { feed }
    }
}

impl Strategy for Joystick {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Joystick
    }

    fn target_quaternion(&mut self) -> Quaternion {
        self.feed.get().normalized()
    }
}

/// Target from the perception system (face tracking).
pub struct Sentient {
    feed: TargetFeed,
}

impl Sentient {
    pub fn new(feed: TargetFeed) -> Self {
        debug!("sentient created");
        Self { feed }
    }
}

impl Strategy for Sentient {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sentient
    }

    fn target_quaternion(&mut self) -> Quaternion {
        self.feed.get().normalized()
    }
}

/// Builds orchestrators from the 3-bit mode-switch reading.
pub struct AlgoFactory {
    settings: ControlSettings,
    path: Vec<Quaternion>,
    joystick: TargetFeed,
    perception: TargetFeed,
}

impl AlgoFactory {
    pub fn new(settings: &ControlSettings, joystick: TargetFeed, perception: TargetFeed) -> Self {
        Self {
            settings: settings.clone(),
            path: demo_gaze_path(),
            joystick,
            perception,
        }
    }

    /// Deterministic priority: switch 0 wins, then 1, then 2; all clear
    /// selects the perception-driven default.
    pub fn selected_kind(switches: [bool; 3]) -> StrategyKind {
        if switches[0] {
            StrategyKind::Dbt2
        } else if switches[1] {
            StrategyKind::PathFollowing
        } else if switches[2] {
            StrategyKind::Joystick
        } else {
            StrategyKind::Sentient
        }
    }

    pub fn make_control_algo(&self, switches: [bool; 3]) -> ControlAlgo {
        let kind = Self::selected_kind(switches);
        debug!(?kind, "building control algorithm");
        let strategy: Box<dyn Strategy> = match kind {
            StrategyKind::Dbt2 => {
                Box::new(Dbt2::new(Duration::from_millis(self.settings.dbt2_dwell_ms)))
            }
            StrategyKind::PathFollowing => Box::new(PathFollowing::new(self.path.clone(), 25)),
            StrategyKind::Joystick => Box::new(Joystick::new(self.joystick.clone())),
            StrategyKind::Sentient => Box::new(Sentient::new(self.perception.clone())),
        };
        ControlAlgo::new(strategy, self.settings.velocity_gain)
    }
}

/// Small figure-eight gaze sweep used when no path has been uploaded.
fn demo_gaze_path() -> Vec<Quaternion> {
    let mut path = Vec::new();
    for i in 0..8 {
        let phase = i as f32 / 8.0 * std::f32::consts::TAU;
        let yaw = 0.35 * phase.sin();
        let pitch = 0.2 * (2.0 * phase).sin();
        path.push(
            Quaternion::from_axis_angle([0.0, 0.0, 1.0], yaw)
                * Quaternion::from_axis_angle([0.0, 1.0, 0.0], pitch),
        );
    }
    path
}
