// Scripted device used to drive the pairing and sync state machines.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};

use poolsync_api::{Credential, Error, PairingStatus};
use poolsync_core::DeviceApi;

pub const ADDRESS: &str = "192.168.1.50";

#[derive(Default)]
struct State {
    starts: Mutex<VecDeque<Result<Value, Error>>>,
    polls: Mutex<VecDeque<Result<PairingStatus, Error>>>,
    fetches: Mutex<VecDeque<Result<Value, Error>>>,
    patches: Mutex<VecDeque<Result<Value, Error>>>,
    device: Mutex<Value>,
    patch_log: Mutex<Vec<(String, String, i64)>>,
    fetch_delay: Mutex<Option<Duration>>,
    poll_count: AtomicUsize,
    fetch_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Cloneable handle; clones share the script and counters.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    state: Arc<State>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        let device = Self::default();
        *device.state.device.lock().unwrap() = sample_snapshot();
        device
    }

    pub fn script_start(&self, result: Result<Value, Error>) -> &Self {
        self.state.starts.lock().unwrap().push_back(result);
        self
    }

    pub fn script_poll(&self, result: Result<PairingStatus, Error>) -> &Self {
        self.state.polls.lock().unwrap().push_back(result);
        self
    }

    pub fn script_fetch(&self, result: Result<Value, Error>) -> &Self {
        self.state.fetches.lock().unwrap().push_back(result);
        self
    }

    pub fn script_patch(&self, result: Result<Value, Error>) -> &Self {
        self.state.patches.lock().unwrap().push_back(result);
        self
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.state.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn poll_count(&self) -> usize {
        self.state.poll_count.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetch_count.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn patches(&self) -> Vec<(String, String, i64)> {
        self.state.patch_log.lock().unwrap().clone()
    }
}

impl DeviceApi for ScriptedDevice {
    fn address(&self) -> &str {
        ADDRESS
    }

    async fn start_pairing(&self) -> Result<Value, Error> {
        self.state
            .starts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }

    async fn poll_pairing_status(&self) -> Result<PairingStatus, Error> {
        self.state.poll_count.fetch_add(1, Ordering::SeqCst);
        self.state
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PairingStatus::Waiting { time_remaining: None }))
    }

    async fn fetch_snapshot(&self, credential: &Credential) -> Result<Value, Error> {
        assert!(!credential.is_empty());
        self.state.fetch_count.fetch_add(1, Ordering::SeqCst);
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.state.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.state.fetches.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| Ok(self.state.device.lock().unwrap().clone()));
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn patch_field(
        &self,
        device_id: &str,
        field_key: &str,
        value: i64,
        _credential: &Credential,
    ) -> Result<Value, Error> {
        self.state
            .patch_log
            .lock()
            .unwrap()
            .push((device_id.to_owned(), field_key.to_owned(), value));
        if let Some(result) = self.state.patches.lock().unwrap().pop_front() {
            return result;
        }
        let mut device = self.state.device.lock().unwrap();
        device["devices"][device_id]["config"][field_key] = json!(value);
        Ok(Value::Null)
    }
}

pub fn sample_snapshot() -> Value {
    json!({
        "poolSync": {
            "config": { "name": "PoolSync®", "serviceMode": 0 },
            "status": { "online": true, "rssi": -60, "boardTemp": 30 },
            "system": { "fwVersion": "1.4.0", "hwVersion": "2", "macAddress": "AA:BB:CC:DD:EE:FF" },
            "faults": 0
        },
        "devices": {
            "0": {
                "config": { "mode": 1, "setpoint": 28 },
                "status": { "waterTemp": 26, "stateFlags": 300, "ctrlFlags": 397 },
                "nodeAttr": { "online": 1, "name": "HeatPump" },
                "faults": [0]
            },
            "-1": {
                "config": { "chlorOutput": 40 },
                "status": { "saltPPM": 3300, "waterTemp": 26 },
                "nodeAttr": { "online": 1 },
                "faults": [0]
            }
        },
        "deviceType": { "0": "heatPump", "-1": "chlorSync" }
    })
}

pub fn credential() -> Credential {
    Credential::new(SecretString::from("s3cret".to_string()), "AA:BB:CC:DD:EE:FF")
}

pub fn communication_error() -> Error {
    Error::Communication {
        message: "connection refused".into(),
    }
}

pub fn auth_error() -> Error {
    Error::Authentication {
        status: Some(401),
        message: "device answered HTTP 401".into(),
    }
}

pub fn protocol_error() -> Error {
    Error::Protocol {
        message: "snapshot is missing the 'devices' section".into(),
        status: None,
        body: None,
    }
}

pub fn waiting(secs: i64) -> Result<PairingStatus, Error> {
    Ok(PairingStatus::Waiting {
        time_remaining: Some(secs),
    })
}

pub fn linked(secret: &str, identifier: Option<&str>) -> Result<PairingStatus, Error> {
    Ok(PairingStatus::Linked {
        secret: SecretString::from(secret.to_string()),
        identifier: identifier.map(String::from),
    })
}
