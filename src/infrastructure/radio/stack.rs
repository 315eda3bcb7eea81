//! Radio backend abstraction.
//!
//! The link state machine drives a [`RadioStack`] and receives asynchronous
//! radio activity as [`RadioEvent`]s over a channel, the same shape the
//! callbacks take in the platform stacks this fronts. The in-tree
//! implementation is a deterministic simulated stack, used both by the demo
//! wiring and by the state-machine tests; real platform backends are
//! integration work outside this crate.

use crate::domain::models::ScanParams;
use crate::error::RadioError;
use crate::infrastructure::radio::protocol::Uuid;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Asynchronous activity reported by the radio.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    /// An advertisement was observed while scanning.
    Advertisement {
        address: u64,
        local_name: String,
        services: Vec<Uuid>,
    },
    /// An established connection dropped on the peer's side.
    Disconnected { address: u64, reason: i32 },
    /// A subscribed characteristic pushed a new value.
    Notification { characteristic: Uuid, payload: Vec<u8> },
}

/// Read/notify support of a remote characteristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProps {
    pub read: bool,
    pub notify: bool,
}

/// Connection parameters applied when a new client is created. Units follow
/// the usual BLE conventions (1.25 ms interval steps, 10 ms timeout steps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParams {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
    pub connect_timeout_ms: u32,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            min_interval: 12,
            max_interval: 12,
            latency: 0,
            supervision_timeout: 51,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Narrow surface of the platform radio stack the link drives.
pub trait RadioStack: Send {
    /// Power on the controller-side radio under the given device name.
    fn power_on(&mut self, device_name: &str) -> Result<(), RadioError>;

    fn start_scan(&mut self, params: ScanParams) -> Result<(), RadioError>;

    fn stop_scan(&mut self);

    /// Number of client objects currently held.
    fn client_count(&self) -> usize;

    /// Cap on concurrently held clients.
    fn max_clients(&self) -> usize;

    /// Whether a client object already exists for the peer.
    fn has_client(&self, address: u64) -> bool;

    /// Reconnect an existing client to its peer.
    fn reconnect(&mut self, address: u64) -> Result<(), RadioError>;

    /// Create a client and connect it.
    fn connect(&mut self, address: u64, params: ConnectionParams) -> Result<(), RadioError>;

    /// Discard the client object after a failed connection attempt.
    fn drop_client(&mut self, address: u64);

    /// Tear down an established connection, keeping the client for reuse.
    fn disconnect(&mut self, address: u64);

    fn has_service(&self, address: u64, service: Uuid) -> bool;

    fn characteristic_props(
        &self,
        address: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Option<CharacteristicProps>;

    /// Subscribe to notifications on a characteristic.
    fn subscribe(
        &mut self,
        address: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), RadioError>;
}

/// One characteristic of a simulated peripheral.
#[derive(Debug, Clone)]
pub struct SimulatedCharacteristic {
    pub uuid: Uuid,
    pub props: CharacteristicProps,
}

/// Definition of a peripheral the simulated stack will "discover".
#[derive(Debug, Clone)]
pub struct SimulatedPeripheral {
    pub address: u64,
    pub local_name: String,
    pub advertised_services: Vec<Uuid>,
    /// Service table exposed after connecting.
    pub services: Vec<(Uuid, Vec<SimulatedCharacteristic>)>,
}

#[derive(Debug, Default)]
struct Client {
    connected: bool,
}

#[derive(Debug, Default)]
struct SimState {
    powered: bool,
    scanning: bool,
    scan_count: u32,
    last_scan_params: Option<ScanParams>,
    peripherals: Vec<SimulatedPeripheral>,
    clients: HashMap<u64, Client>,
    subscriptions: Vec<(u64, Uuid)>,
    fail_connect: bool,
    fail_reconnect: bool,
    fail_subscribe: bool,
}

/// Deterministic in-process radio. Advertisements for every registered
/// peripheral are emitted as soon as a scan starts, so discovery is
/// instantaneous and repeatable. Cloning yields another handle onto the
/// same simulated air, which is how tests and the demo peripheral inject
/// traffic after the link has taken ownership of the stack.
#[derive(Clone)]
pub struct SimulatedRadio {
    state: Arc<Mutex<SimState>>,
    events: mpsc::UnboundedSender<RadioEvent>,
}

impl SimulatedRadio {
    pub fn new(events: mpsc::UnboundedSender<RadioEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            events,
        }
    }

    pub fn add_peripheral(&self, peripheral: SimulatedPeripheral) {
        self.state.lock().unwrap().peripherals.push(peripheral);
    }

    /// Push a notification from the peripheral side. Dropped unless some
    /// client has subscribed to the characteristic.
    pub fn push_notification(&self, characteristic: Uuid, payload: Vec<u8>) {
        let state = self.state.lock().unwrap();
        if state
            .subscriptions
            .iter()
            .any(|(_, uuid)| *uuid == characteristic)
        {
            let _ = self.events.send(RadioEvent::Notification {
                characteristic,
                payload,
            });
        }
    }

    /// Drop an established connection from the peer side.
    pub fn drop_connection(&self, address: u64, reason: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(client) = state.clients.get_mut(&address) {
            if client.connected {
                client.connected = false;
                state.subscriptions.retain(|(addr, _)| *addr != address);
                let _ = self
                    .events
                    .send(RadioEvent::Disconnected { address, reason });
            }
        }
    }

    pub fn is_connected(&self, address: u64) -> bool {
        self.state
            .lock()
            .unwrap()
            .clients
            .get(&address)
            .is_some_and(|c| c.connected)
    }

    pub fn is_subscribed(&self, address: u64, characteristic: Uuid) -> bool {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .contains(&(address, characteristic))
    }

    pub fn is_scanning(&self) -> bool {
        self.state.lock().unwrap().scanning
    }

    pub fn scan_count(&self) -> u32 {
        self.state.lock().unwrap().scan_count
    }

    pub fn last_scan_params(&self) -> Option<ScanParams> {
        self.state.lock().unwrap().last_scan_params
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    pub fn set_fail_reconnect(&self, fail: bool) {
        self.state.lock().unwrap().fail_reconnect = fail;
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state.lock().unwrap().fail_subscribe = fail;
    }

    fn find_peripheral<'a>(
        state: &'a SimState,
        address: u64,
    ) -> Option<&'a SimulatedPeripheral> {
        state.peripherals.iter().find(|p| p.address == address)
    }
}

impl RadioStack for SimulatedRadio {
    fn power_on(&mut self, device_name: &str) -> Result<(), RadioError> {
        debug!(device_name, "simulated radio powered on");
        self.state.lock().unwrap().powered = true;
        Ok(())
    }

    fn start_scan(&mut self, params: ScanParams) -> Result<(), RadioError> {
        let adverts: Vec<RadioEvent> = {
            let mut state = self.state.lock().unwrap();
            if !state.powered {
                return Err(RadioError::NotPoweredOn);
            }
            state.scanning = true;
            state.scan_count += 1;
            state.last_scan_params = Some(params);
            state
                .peripherals
                .iter()
                .map(|p| RadioEvent::Advertisement {
                    address: p.address,
                    local_name: p.local_name.clone(),
                    services: p.advertised_services.clone(),
                })
                .collect()
        };
        for advert in adverts {
            let _ = self.events.send(advert);
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.state.lock().unwrap().scanning = false;
    }

    fn client_count(&self) -> usize {
        self.state.lock().unwrap().clients.len()
    }

    fn max_clients(&self) -> usize {
        3
    }

    fn has_client(&self, address: u64) -> bool {
        self.state.lock().unwrap().clients.contains_key(&address)
    }

    fn reconnect(&mut self, address: u64) -> Result<(), RadioError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reconnect {
            return Err(RadioError::ConnectFailed { address });
        }
        match state.clients.get_mut(&address) {
            Some(client) => {
                client.connected = true;
                Ok(())
            }
            None => Err(RadioError::UnknownClient { address }),
        }
    }

    fn connect(&mut self, address: u64, _params: ConnectionParams) -> Result<(), RadioError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect || Self::find_peripheral(&state, address).is_none() {
            return Err(RadioError::ConnectFailed { address });
        }
        state
            .clients
            .insert(address, Client { connected: true });
        Ok(())
    }

    fn drop_client(&mut self, address: u64) {
        let mut state = self.state.lock().unwrap();
        state.clients.remove(&address);
        state.subscriptions.retain(|(addr, _)| *addr != address);
    }

    fn disconnect(&mut self, address: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(client) = state.clients.get_mut(&address) {
            client.connected = false;
        }
        state.subscriptions.retain(|(addr, _)| *addr != address);
    }

    fn has_service(&self, address: u64, service: Uuid) -> bool {
        let state = self.state.lock().unwrap();
        Self::find_peripheral(&state, address)
            .is_some_and(|p| p.services.iter().any(|(uuid, _)| *uuid == service))
    }

    fn characteristic_props(
        &self,
        address: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Option<CharacteristicProps> {
        let state = self.state.lock().unwrap();
        let peripheral = Self::find_peripheral(&state, address)?;
        let (_, characteristics) = peripheral.services.iter().find(|(uuid, _)| *uuid == service)?;
        characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .map(|c| c.props)
    }

    fn subscribe(
        &mut self,
        address: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), RadioError> {
        let props = self
            .characteristic_props(address, service, characteristic)
            .ok_or(RadioError::SubscribeRejected)?;

        let mut state = self.state.lock().unwrap();
        let connected = state
            .clients
            .get(&address)
            .is_some_and(|c| c.connected);
        if state.fail_subscribe || !connected || !props.notify {
            return Err(RadioError::SubscribeRejected);
        }
        state.subscriptions.push((address, characteristic));
        Ok(())
    }
}
