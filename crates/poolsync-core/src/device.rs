// ── Device API seam ──
//
// Pairing and synchronization only need four calls from the device. The
// trait lets tests drive both state machines with scripted responses.

use std::future::Future;

use serde_json::Value;

use poolsync_api::{Credential, DeviceClient, Error, PairingStatus};

/// The device operations used by [`PairingSession`](crate::PairingSession)
/// and [`SyncCoordinator`](crate::SyncCoordinator).
pub trait DeviceApi: Send + Sync + 'static {
    /// Network address, used for logging and synthesized identifiers.
    fn address(&self) -> &str;

    fn start_pairing(&self) -> impl Future<Output = Result<Value, Error>> + Send;

    fn poll_pairing_status(&self) -> impl Future<Output = Result<PairingStatus, Error>> + Send;

    fn fetch_snapshot(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Value, Error>> + Send;

    fn patch_field(
        &self,
        device_id: &str,
        field_key: &str,
        value: i64,
        credential: &Credential,
    ) -> impl Future<Output = Result<Value, Error>> + Send;
}

impl DeviceApi for DeviceClient {
    fn address(&self) -> &str {
        DeviceClient::address(self)
    }

    fn start_pairing(&self) -> impl Future<Output = Result<Value, Error>> + Send {
        DeviceClient::start_pairing(self)
    }

    fn poll_pairing_status(&self) -> impl Future<Output = Result<PairingStatus, Error>> + Send {
        DeviceClient::poll_pairing_status(self)
    }

    fn fetch_snapshot(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        DeviceClient::fetch_snapshot(self, credential)
    }

    fn patch_field(
        &self,
        device_id: &str,
        field_key: &str,
        value: i64,
        credential: &Credential,
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        DeviceClient::patch_field(self, device_id, field_key, value, credential)
    }
}
