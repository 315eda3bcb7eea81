//! Wireless link to the remote IMU peripheral.
//!
//! Reconnect-forever state machine: scan for the configured service, connect
//! to the first matching advertiser, verify the IMU characteristic,
//! subscribe, and fall back to scanning whenever anything drops. Decoded
//! notifications land in the shared [`OrientationStore`]; the control loop
//! never talks to the radio directly.

use crate::domain::models::{LinkState, PeripheralHandle, ScanParams};
use crate::domain::orientation::OrientationStore;
use crate::domain::settings::LinkSettings;
use crate::error::LinkError;
use crate::infrastructure::radio::protocol::{self, Uuid};
use crate::infrastructure::radio::stack::{ConnectionParams, RadioEvent, RadioStack};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Link configuration, fixed at `initialize` time. Rescans reuse the same
/// scan parameters for the lifetime of the link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub service_uuid: Uuid,
    pub imu_characteristic_uuid: Uuid,
    pub device_name: String,
    pub scan: ScanParams,
    pub connection: ConnectionParams,
    pub tick: Duration,
}

impl LinkConfig {
    pub fn from_settings(settings: &LinkSettings) -> anyhow::Result<Self> {
        Ok(Self {
            service_uuid: Uuid::parse(&settings.service_uuid)?,
            imu_characteristic_uuid: Uuid::parse(&settings.imu_characteristic_uuid)?,
            device_name: settings.device_name.clone(),
            scan: settings.scan,
            connection: ConnectionParams::default(),
            tick: Duration::from_millis(settings.tick_ms),
        })
    }
}

/// Shared, read-only view of the link state for the control side.
#[derive(Debug, Clone)]
pub struct LinkStatus {
    inner: Arc<Mutex<LinkState>>,
}

impl LinkStatus {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LinkState::Idle)),
        }
    }

    pub fn get(&self) -> LinkState {
        *self.inner.lock().unwrap()
    }

    fn set(&self, state: LinkState) {
        let mut current = self.inner.lock().unwrap();
        if *current != state {
            debug!(from = ?*current, to = ?state, "link state");
            *current = state;
        }
    }
}

/// The client side of the wireless link.
pub struct WirelessLink<R: RadioStack> {
    radio: R,
    events: mpsc::UnboundedReceiver<RadioEvent>,
    store: OrientationStore,
    status: LinkStatus,
    config: Option<LinkConfig>,
    peer: Option<PeripheralHandle>,
    connect_requested: bool,
}

impl<R: RadioStack> WirelessLink<R> {
    pub fn new(
        radio: R,
        events: mpsc::UnboundedReceiver<RadioEvent>,
        store: OrientationStore,
    ) -> Self {
        Self {
            radio,
            events,
            store,
            status: LinkStatus::new(),
            config: None,
            peer: None,
            connect_requested: false,
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status.clone()
    }

    /// Power the radio and start discovery. Callable exactly once; a second
    /// call is a programming error and is rejected.
    pub fn initialize(&mut self, config: LinkConfig) -> Result<(), LinkError> {
        if self.config.is_some() {
            return Err(LinkError::AlreadyInitialized);
        }

        self.radio.power_on(&config.device_name)?;
        self.radio.start_scan(config.scan)?;
        self.status.set(LinkState::Scanning);
        info!(
            service = %config.service_uuid,
            characteristic = %config.imu_characteristic_uuid,
            "wireless link scanning"
        );
        self.config = Some(config);
        Ok(())
    }

    /// Manage the connection forever on a fixed short tick.
    pub async fn run(mut self) {
        let tick = self
            .config
            .as_ref()
            .map_or(Duration::from_millis(10), |c| c.tick);
        let mut ticker = tokio::time::interval(tick);
        loop {
            ticker.tick().await;
            self.poll();
        }
    }

    /// One scheduler tick: drain pending radio events, then honor a pending
    /// connect request. The request flag clears regardless of outcome; a
    /// failed attempt is retried on the next matching advertisement rather
    /// than in a tight loop.
    pub fn poll(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }

        if self.connect_requested {
            self.connect_requested = false;
            match self.connect_to_peer() {
                Ok(()) => info!("connected to the IMU peripheral"),
                Err(err) => {
                    warn!("connection attempt failed: {err}");
                    self.resume_scanning();
                }
            }
        }
    }

    fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Advertisement {
                address,
                local_name,
                services,
            } => self.handle_advertisement(address, local_name, services),
            RadioEvent::Disconnected { address, reason } => {
                warn!("peer {address:#x} disconnected (reason {reason}), rescanning");
                self.status.set(LinkState::Disconnected);
                self.resume_scanning();
            }
            RadioEvent::Notification {
                characteristic,
                payload,
            } => self.handle_notification(characteristic, &payload),
        }
    }

    fn handle_advertisement(&mut self, address: u64, local_name: String, services: Vec<Uuid>) {
        let Some(config) = &self.config else { return };
        if self.status.get() != LinkState::Scanning {
            return;
        }
        trace!("advertisement from {local_name} ({address:#x})");

        if services.contains(&config.service_uuid) {
            debug!(%local_name, "advertiser carries the configured service");
            self.radio.stop_scan();
            self.peer = Some(PeripheralHandle {
                address,
                local_name,
            });
            self.connect_requested = true;
            self.status.set(LinkState::Connecting);
        }
    }

    fn handle_notification(&mut self, characteristic: Uuid, payload: &[u8]) {
        let Some(config) = &self.config else { return };
        if characteristic != config.imu_characteristic_uuid {
            warn!(%characteristic, "notification from an unexpected characteristic");
            return;
        }

        match protocol::decode_quaternion(payload) {
            Ok(quat) => {
                trace!(w = quat.w, x = quat.x, y = quat.y, z = quat.z, "orientation sample");
                self.store.set(quat);
            }
            Err(err) => {
                warn!("discarding notification: {err}");
                self.store.record_rejection();
            }
        }
    }

    /// Attempt to connect to the recorded peer, reusing an existing client
    /// when one is known for the address. Every failure tears the attempt
    /// down and reports a transient error; the caller falls back to
    /// scanning.
    fn connect_to_peer(&mut self) -> Result<(), LinkError> {
        let config = self.config.clone().ok_or(LinkError::NoPeer)?;
        let peer = self.peer.clone().ok_or(LinkError::NoPeer)?;

        if self.radio.has_client(peer.address) {
            // Known device; try to reconnect the existing client.
            self.radio.reconnect(peer.address)?;
            debug!("reconnected existing client");
        } else {
            if self.radio.client_count() >= self.radio.max_clients() {
                return Err(LinkError::MaxClients);
            }
            if let Err(err) = self.radio.connect(peer.address, config.connection) {
                self.radio.drop_client(peer.address);
                return Err(err.into());
            }
            debug!("new client connected");
        }
        info!("client connected to {} ({:#x})", peer.local_name, peer.address);

        if !self.radio.has_service(peer.address, config.service_uuid) {
            self.radio.disconnect(peer.address);
            return Err(LinkError::ServiceMissing);
        }

        let props = match self.radio.characteristic_props(
            peer.address,
            config.service_uuid,
            config.imu_characteristic_uuid,
        ) {
            Some(props) => props,
            None => {
                self.radio.disconnect(peer.address);
                return Err(LinkError::CharacteristicMissing);
            }
        };
        if !props.read {
            self.radio.disconnect(peer.address);
            return Err(LinkError::ReadUnsupported);
        }

        if props.notify {
            self.status.set(LinkState::Subscribing);
            if self
                .radio
                .subscribe(
                    peer.address,
                    config.service_uuid,
                    config.imu_characteristic_uuid,
                )
                .is_err()
            {
                self.radio.disconnect(peer.address);
                return Err(LinkError::SubscribeFailed);
            }
        }

        self.status.set(LinkState::Connected);
        Ok(())
    }

    /// Restart discovery with the initialize-time scan parameters.
    fn resume_scanning(&mut self) {
        let Some(config) = &self.config else { return };
        if let Err(err) = self.radio.start_scan(config.scan) {
            error!("failed to restart discovery: {err}");
        }
        self.status.set(LinkState::Scanning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::radio::protocol::{
        encode_quaternion, IMU_CHARACTERISTIC_UUID, SERVICE_UUID,
    };
    use crate::infrastructure::radio::stack::{
        CharacteristicProps, SimulatedCharacteristic, SimulatedPeripheral, SimulatedRadio,
    };
    use crate::domain::quaternion::Quaternion;

    const PEER: u64 = 0x00EB_0001;

    fn service() -> Uuid {
        Uuid::parse(SERVICE_UUID).unwrap()
    }

    fn characteristic() -> Uuid {
        Uuid::parse(IMU_CHARACTERISTIC_UUID).unwrap()
    }

    fn config() -> LinkConfig {
        LinkConfig::from_settings(&LinkSettings::default()).unwrap()
    }

    fn imu_peripheral() -> SimulatedPeripheral {
        SimulatedPeripheral {
            address: PEER,
            local_name: "Eyeball IMU".to_string(),
            advertised_services: vec![service()],
            services: vec![(
                service(),
                vec![SimulatedCharacteristic {
                    uuid: characteristic(),
                    props: CharacteristicProps {
                        read: true,
                        notify: true,
                    },
                }],
            )],
        }
    }

    fn link_with(
        peripheral: SimulatedPeripheral,
    ) -> (WirelessLink<SimulatedRadio>, SimulatedRadio, OrientationStore) {
        let (tx, rx) = mpsc::unbounded_channel();
        let radio = SimulatedRadio::new(tx);
        radio.add_peripheral(peripheral);
        let store = OrientationStore::new();
        let link = WirelessLink::new(radio.clone(), rx, store.clone());
        (link, radio, store)
    }

    #[test]
    fn happy_path_reaches_connected_only_after_subscribing() {
        let (mut link, radio, _store) = link_with(imu_peripheral());
        link.initialize(config()).unwrap();
        assert_eq!(link.status().get(), LinkState::Scanning);

        link.poll();
        assert_eq!(link.status().get(), LinkState::Connected);
        assert!(radio.is_connected(PEER));
        assert!(radio.is_subscribed(PEER, characteristic()));
    }

    #[test]
    fn double_initialize_is_rejected() {
        let (mut link, _radio, _store) = link_with(imu_peripheral());
        link.initialize(config()).unwrap();
        assert_eq!(
            link.initialize(config()),
            Err(LinkError::AlreadyInitialized)
        );
    }

    #[test]
    fn foreign_service_advertisements_never_leave_scanning() {
        let mut peripheral = imu_peripheral();
        let foreign = Uuid::parse("00000000-0000-0000-0000-00000000beef").unwrap();
        peripheral.advertised_services = vec![foreign];
        let (mut link, radio, _store) = link_with(peripheral);
        link.initialize(config()).unwrap();

        link.poll();
        link.poll();
        assert_eq!(link.status().get(), LinkState::Scanning);
        assert!(!radio.is_connected(PEER));
    }

    #[test]
    fn notifications_update_the_store() {
        let (mut link, radio, store) = link_with(imu_peripheral());
        link.initialize(config()).unwrap();
        link.poll();

        let sent = Quaternion::new(0.5, 0.5, 0.5, 0.5);
        radio.push_notification(characteristic(), encode_quaternion(sent).to_vec());
        link.poll();

        let (quat, valid) = store.get();
        assert!(valid);
        assert_eq!(quat, sent);
    }

    #[test]
    fn short_payload_is_counted_and_leaves_the_sample_alone() {
        let (mut link, radio, store) = link_with(imu_peripheral());
        link.initialize(config()).unwrap();
        link.poll();

        let prior = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        radio.push_notification(characteristic(), encode_quaternion(prior).to_vec());
        link.poll();

        radio.push_notification(characteristic(), vec![0u8; 15]);
        link.poll();

        let (quat, valid) = store.get();
        assert!(valid);
        assert_eq!(quat, prior);
        assert_eq!(store.rejections(), 1);
    }

    #[test]
    fn disconnect_rescans_with_the_original_parameters() {
        let (mut link, radio, _store) = link_with(imu_peripheral());
        let cfg = config();
        link.initialize(cfg.clone()).unwrap();
        link.poll();
        assert_eq!(link.status().get(), LinkState::Connected);

        radio.drop_connection(PEER, -1);
        // First poll observes the disconnect and restarts discovery; the
        // rescan re-advertises, so the link reconnects on a later poll.
        link.poll();
        assert!(radio.scan_count() >= 2);
        assert_eq!(radio.last_scan_params(), Some(cfg.scan));
        assert_eq!(link.status().get(), LinkState::Connected);
    }

    #[test]
    fn missing_characteristic_falls_back_to_scanning() {
        let mut peripheral = imu_peripheral();
        peripheral.services = vec![(service(), Vec::new())];
        let (mut link, radio, _store) = link_with(peripheral);
        link.initialize(config()).unwrap();

        link.poll();
        assert_eq!(link.status().get(), LinkState::Scanning);
        assert!(!radio.is_connected(PEER));
    }

    #[test]
    fn unreadable_characteristic_falls_back_to_scanning() {
        let mut peripheral = imu_peripheral();
        peripheral.services = vec![(
            service(),
            vec![SimulatedCharacteristic {
                uuid: characteristic(),
                props: CharacteristicProps {
                    read: false,
                    notify: true,
                },
            }],
        )];
        let (mut link, _radio, _store) = link_with(peripheral);
        link.initialize(config()).unwrap();

        link.poll();
        assert_eq!(link.status().get(), LinkState::Scanning);
    }

    #[test]
    fn subscribe_failure_disconnects_and_falls_back() {
        let (mut link, radio, _store) = link_with(imu_peripheral());
        radio.set_fail_subscribe(true);
        link.initialize(config()).unwrap();

        link.poll();
        assert_eq!(link.status().get(), LinkState::Scanning);
        assert!(!radio.is_connected(PEER));
        assert!(!radio.is_subscribed(PEER, characteristic()));
    }

    #[test]
    fn notify_less_characteristic_still_connects_without_subscription() {
        let mut peripheral = imu_peripheral();
        peripheral.services = vec![(
            service(),
            vec![SimulatedCharacteristic {
                uuid: characteristic(),
                props: CharacteristicProps {
                    read: true,
                    notify: false,
                },
            }],
        )];
        let (mut link, radio, _store) = link_with(peripheral);
        link.initialize(config()).unwrap();

        link.poll();
        assert_eq!(link.status().get(), LinkState::Connected);
        assert!(!radio.is_subscribed(PEER, characteristic()));
    }

    #[test]
    fn failed_connect_is_retried_on_a_later_advertisement() {
        let (mut link, radio, _store) = link_with(imu_peripheral());
        radio.set_fail_connect(true);
        link.initialize(config()).unwrap();

        link.poll();
        assert_eq!(link.status().get(), LinkState::Scanning);
        assert!(!radio.is_connected(PEER));

        // Peer becomes reachable again; the rescan already re-advertised.
        radio.set_fail_connect(false);
        link.poll();
        assert_eq!(link.status().get(), LinkState::Connected);
    }
}
