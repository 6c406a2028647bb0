// ── Device registry ──
//
// Explicit map of running coordinators keyed by device identifier. The
// host process builds one at startup and passes it by reference.

use dashmap::DashMap;
use tracing::debug;

use crate::coordinator::SyncCoordinator;
use crate::device::DeviceApi;

pub struct DeviceRegistry<A: DeviceApi> {
    coordinators: DashMap<String, SyncCoordinator<A>>,
}

impl<A: DeviceApi> Default for DeviceRegistry<A> {
    fn default() -> Self {
        Self {
            coordinators: DashMap::new(),
        }
    }
}

impl<A: DeviceApi> DeviceRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `coordinator` under its credential identifier, returning
    /// any coordinator it replaced.
    pub fn insert(&self, coordinator: SyncCoordinator<A>) -> Option<SyncCoordinator<A>> {
        let identifier = coordinator.identifier();
        debug!(%identifier, "registering device");
        self.coordinators.insert(identifier, coordinator)
    }

    pub fn get(&self, identifier: &str) -> Option<SyncCoordinator<A>> {
        self.coordinators.get(identifier).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.coordinators.contains_key(identifier)
    }

    /// Remove and shut down the coordinator for `identifier`.
    pub async fn remove(&self, identifier: &str) -> bool {
        let Some((_, coordinator)) = self.coordinators.remove(identifier) else {
            return false;
        };
        coordinator.shutdown().await;
        debug!(%identifier, "device removed");
        true
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.coordinators.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }

    /// Shut down every coordinator and clear the map.
    pub async fn shutdown_all(&self) {
        for identifier in self.identifiers() {
            self.remove(&identifier).await;
        }
    }
}
