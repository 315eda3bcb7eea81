//! Brain of the motorized eyeball mechanism.
//!
//! Two long-running tasks: the wireless link keeps the orientation estimate
//! fresh from the remote IMU peripheral, and the control loop turns the
//! selected strategy's target orientation into motor commands once per
//! tick. The radio backend here is the simulated stack with a demo
//! peripheral attached, so the whole pipeline runs without hardware.

mod domain;
mod error;
mod infrastructure;

use crate::domain::orientation::OrientationStore;
use crate::domain::pipeline::ControlAlgo;
use crate::domain::quaternion::Quaternion;
use crate::domain::settings::SettingsService;
use crate::domain::strategy::{AlgoFactory, TargetFeed};
use crate::infrastructure::hardware::actuator::{MotorActuator, PwmMotorBank};
use crate::infrastructure::hardware::encoder::SharedEncoders;
use crate::infrastructure::hardware::switches::{FixedSwitches, SwitchInput};
use crate::infrastructure::logging;
use crate::infrastructure::radio::protocol::{self, Uuid};
use crate::infrastructure::radio::stack::{
    CharacteristicProps, SimulatedCharacteristic, SimulatedPeripheral, SimulatedRadio,
};
use crate::infrastructure::radio::{LinkConfig, WirelessLink};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();
    let _logging = logging::init_logger(&settings.log_settings)?;
    info!("Starting eyeball mechanism controller");

    let service = Uuid::parse(&settings.link.service_uuid)?;
    let characteristic = Uuid::parse(&settings.link.imu_characteristic_uuid)?;

    // Wireless link to the IMU, on its own task.
    let store = OrientationStore::new();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let radio = SimulatedRadio::new(event_tx);
    radio.add_peripheral(SimulatedPeripheral {
        address: 0x00EB_0001,
        local_name: "Eyeball IMU".to_string(),
        advertised_services: vec![service],
        services: vec![(
            service,
            vec![SimulatedCharacteristic {
                uuid: characteristic,
                props: CharacteristicProps {
                    read: true,
                    notify: true,
                },
            }],
        )],
    });

    let mut link = WirelessLink::new(radio.clone(), event_rx, store.clone());
    let link_status = link.status();
    link.initialize(LinkConfig::from_settings(&settings.link)?)?;
    tokio::spawn(link.run());

    // Demo IMU: stream a slow gaze sweep through the simulated radio.
    tokio::spawn(stream_demo_orientation(radio, characteristic));

    // Fatal if the pin/PWM configuration is invalid; nothing to drive then.
    let mut actuator = PwmMotorBank::new(&settings.actuator)?;
    let encoders = SharedEncoders::new();
    let mut switches = FixedSwitches::new([false, true, false]);

    let joystick = TargetFeed::new();
    let perception = TargetFeed::new();
    let factory = AlgoFactory::new(&settings.control, joystick, perception);

    let mut algo: Option<ControlAlgo> = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(settings.control.tick_ms));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reading = switches.sample();
                let kind = AlgoFactory::selected_kind(reading);
                if algo.as_ref().map(ControlAlgo::kind) != Some(kind) {
                    info!(?kind, link = ?link_status.get(), "switching control strategy");
                    algo = Some(factory.make_control_algo(reading));
                }
                if let Some(algo) = algo.as_mut() {
                    algo.execute(&store, &mut actuator, &encoders);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping motors");
                actuator.stop();
                break;
            }
        }
    }

    Ok(())
}

/// Plays the part of the remote peripheral: a gentle yaw sweep at 20 Hz.
async fn stream_demo_orientation(radio: SimulatedRadio, characteristic: Uuid) {
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    let mut phase = 0.0f32;
    loop {
        ticker.tick().await;
        phase += 0.02;
        let quat = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.3 * phase.sin());
        radio.push_notification(characteristic, protocol::encode_quaternion(quat).to_vec());
    }
}
