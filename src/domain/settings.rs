use crate::domain::models::ScanParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "eyeball_controller".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Wireless link configuration. The UUIDs must match the ones the IMU
/// peripheral advertises or the client will never leave scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_imu_char_uuid")]
    pub imu_characteristic_uuid: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_scan")]
    pub scan: ScanParams,
    /// Link task tick in milliseconds.
    #[serde(default = "default_link_tick_ms")]
    pub tick_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            imu_characteristic_uuid: default_imu_char_uuid(),
            device_name: default_device_name(),
            scan: default_scan(),
            tick_ms: default_link_tick_ms(),
        }
    }
}

fn default_service_uuid() -> String {
    "da2aa210-e2ab-4d96-8d94-8536ec5a2728".to_string()
}
fn default_imu_char_uuid() -> String {
    "72b9a4be-85fe-4cd5-ae42-f32414542c5a".to_string()
}
fn default_device_name() -> String {
    "Eyeball Controller".to_string()
}
fn default_scan() -> ScanParams {
    ScanParams {
        duration_ms: 5_000,
        window: 100,
        interval: 100,
    }
}
fn default_link_tick_ms() -> u64 {
    10
}

/// Motor driver parameters. Pins are `[direction, pwm]` per motor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorSettings {
    #[serde(default = "default_motor_pins")]
    pub motor_pins: [[u8; 2]; 3],
    #[serde(default = "default_pwm_frequency")]
    pub pwm_frequency: u32,
    #[serde(default = "default_pwm_resolution")]
    pub pwm_resolution: u8,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            motor_pins: default_motor_pins(),
            pwm_frequency: default_pwm_frequency(),
            pwm_resolution: default_pwm_resolution(),
        }
    }
}

fn default_motor_pins() -> [[u8; 2]; 3] {
    [[25, 26], [27, 14], [12, 13]]
}
fn default_pwm_frequency() -> u32 {
    20_000
}
fn default_pwm_resolution() -> u8 {
    10
}

/// Control loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Outer control tick in milliseconds.
    #[serde(default = "default_control_tick_ms")]
    pub tick_ms: u64,
    /// Scale from angular velocity (rad/s) to duty counts.
    #[serde(default = "default_velocity_gain")]
    pub velocity_gain: f32,
    /// How long the wiring diagnostic holds each motor pattern.
    #[serde(default = "default_dbt2_dwell_ms")]
    pub dbt2_dwell_ms: u64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_control_tick_ms(),
            velocity_gain: default_velocity_gain(),
            dbt2_dwell_ms: default_dbt2_dwell_ms(),
        }
    }
}

fn default_control_tick_ms() -> u64 {
    20
}
fn default_velocity_gain() -> f32 {
    300.0
}
fn default_dbt2_dwell_ms() -> u64 {
    1_500
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub link: LinkSettings,
    #[serde(default)]
    pub actuator: ActuatorSettings,
    #[serde(default)]
    pub control: ControlSettings,
    #[serde(default)]
    pub log_settings: LogSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("EyeballController");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.link.service_uuid, default_service_uuid());
        assert_eq!(settings.link.scan.duration_ms, 5_000);
        assert_eq!(settings.actuator.pwm_resolution, 10);
        assert_eq!(settings.control.tick_ms, 20);
    }

    #[test]
    fn partial_document_keeps_remaining_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"control": {"tick_ms": 50}}"#).unwrap();
        assert_eq!(settings.control.tick_ms, 50);
        assert_eq!(settings.control.dbt2_dwell_ms, 1_500);
        assert_eq!(settings.link.device_name, "Eyeball Controller");
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = Settings::default();
        let json = serde_json::to_string_pretty(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.link.imu_characteristic_uuid,
            settings.link.imu_characteristic_uuid
        );
        assert_eq!(back.actuator.motor_pins, settings.actuator.motor_pins);
    }
}
