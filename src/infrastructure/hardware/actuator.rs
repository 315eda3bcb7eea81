//! Motor actuation.
//!
//! The control core only ever hands the actuator a 3-element signed command
//! array; pin wiring and the PWM timer live behind this seam.

use crate::domain::models::MotorCommand;
use crate::domain::settings::ActuatorSettings;
use crate::error::ActuatorError;
use tracing::{info, trace};

/// Highest GPIO usable as an output on the target board.
const MAX_OUTPUT_PIN: u8 = 39;
/// LEDC timer ceiling.
const MAX_PWM_FREQUENCY: u32 = 40_000_000;

/// Three-motor actuator. Sign selects direction, magnitude is the duty,
/// bounded by the configured resolution.
pub trait MotorActuator: Send {
    /// Apply one signed duty command per motor.
    fn set_motor_speeds(&mut self, speeds: MotorCommand);

    /// Largest duty magnitude the timer can represent.
    fn max_duty(&self) -> u16;

    fn forward(&mut self) {
        let duty = self.max_duty().min(i16::MAX as u16) as i16;
        self.set_motor_speeds([duty; 3]);
    }

    fn backward(&mut self) {
        let duty = self.max_duty().min(i16::MAX as u16) as i16;
        self.set_motor_speeds([-duty; 3]);
    }

    fn stop(&mut self) {
        self.set_motor_speeds([0; 3]);
    }
}

/// PWM motor bank. Pin and timer parameters are validated up front; an
/// invalid configuration is fatal for actuator bring-up and the caller is
/// expected to halt rather than run with an unconfigured actuator.
#[derive(Debug, PartialEq)]
pub struct PwmMotorBank {
    resolution: u8,
    last_command: MotorCommand,
}

impl PwmMotorBank {
    pub fn new(settings: &ActuatorSettings) -> Result<Self, ActuatorError> {
        for (motor, pins) in settings.motor_pins.iter().enumerate() {
            for &pin in pins {
                if pin > MAX_OUTPUT_PIN {
                    return Err(ActuatorError::InvalidPin { motor, pin });
                }
            }
        }
        if settings.pwm_frequency > MAX_PWM_FREQUENCY {
            return Err(ActuatorError::InvalidFrequency(settings.pwm_frequency));
        }
        if !(1..=16).contains(&settings.pwm_resolution) {
            return Err(ActuatorError::InvalidResolution(settings.pwm_resolution));
        }

        info!(
            pins = ?settings.motor_pins,
            frequency = settings.pwm_frequency,
            resolution = settings.pwm_resolution,
            "motor bank initialized"
        );
        Ok(Self {
            resolution: settings.pwm_resolution,
            last_command: [0; 3],
        })
    }

    /// Last command actually applied, after clamping.
    pub fn last_command(&self) -> MotorCommand {
        self.last_command
    }
}

impl MotorActuator for PwmMotorBank {
    fn set_motor_speeds(&mut self, speeds: MotorCommand) {
        let limit = i32::from(self.max_duty().min(i16::MAX as u16));
        let mut applied = [0i16; 3];
        for (motor, (&speed, slot)) in speeds.iter().zip(applied.iter_mut()).enumerate() {
            let clamped = i32::from(speed).clamp(-limit, limit) as i16;
            trace!(
                motor,
                duty = clamped.unsigned_abs(),
                reverse = clamped < 0,
                "pwm write"
            );
            *slot = clamped;
        }
        self.last_command = applied;
    }

    fn max_duty(&self) -> u16 {
        ((1u32 << self.resolution) - 1).min(u32::from(u16::MAX)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ActuatorSettings {
        ActuatorSettings::default()
    }

    #[test]
    fn valid_configuration_initializes() {
        let bank = PwmMotorBank::new(&settings()).unwrap();
        assert_eq!(bank.max_duty(), 1_023);
    }

    #[test]
    fn out_of_range_pin_is_fatal() {
        let mut s = settings();
        s.motor_pins[1][0] = 40;
        assert_eq!(
            PwmMotorBank::new(&s),
            Err(ActuatorError::InvalidPin { motor: 1, pin: 40 })
        );
    }

    #[test]
    fn excessive_frequency_is_fatal() {
        let mut s = settings();
        s.pwm_frequency = 40_000_001;
        assert_eq!(
            PwmMotorBank::new(&s),
            Err(ActuatorError::InvalidFrequency(40_000_001))
        );
    }

    #[test]
    fn resolution_must_be_one_through_sixteen() {
        let mut s = settings();
        s.pwm_resolution = 0;
        assert_eq!(
            PwmMotorBank::new(&s),
            Err(ActuatorError::InvalidResolution(0))
        );
        s.pwm_resolution = 17;
        assert_eq!(
            PwmMotorBank::new(&s),
            Err(ActuatorError::InvalidResolution(17))
        );
    }

    #[test]
    fn commands_clamp_to_the_duty_range() {
        let mut bank = PwmMotorBank::new(&settings()).unwrap();
        bank.set_motor_speeds([5_000, -5_000, 100]);
        assert_eq!(bank.last_command(), [1_023, -1_023, 100]);
    }

    #[test]
    fn named_motions_use_full_duty() {
        let mut bank = PwmMotorBank::new(&settings()).unwrap();
        bank.forward();
        assert_eq!(bank.last_command(), [1_023; 3]);
        bank.backward();
        assert_eq!(bank.last_command(), [-1_023; 3]);
        bank.stop();
        assert_eq!(bank.last_command(), [0; 3]);
    }
}
