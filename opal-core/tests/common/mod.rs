#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use opal_core::async_trait;
use opal_core::lease_store::memory::MemoryStore;
use opal_core::prelude::*;

pub const AUTHORITY: &str = "opal:am";

/// 2h allocated / 5h provisioned, the maxima the scenarios are written for
pub fn durations() -> LeaseDurations {
    LeaseDurations {
        max_allocated_secs: 2 * 60 * 60,
        max_provisioned_secs: 5 * 60 * 60,
    }
}

pub fn aggregate() -> (
    Aggregate<MemoryStore, TestController>,
    MemoryStore,
    TestController,
) {
    let store = MemoryStore::new();
    let controller = TestController::new();
    let agg = Aggregate::new(store.clone(), controller.clone(), durations(), AUTHORITY);
    (agg, store, controller)
}

pub fn slice_urn(name: &str) -> String {
    opal_core::urn::slice_urn(AUTHORITY, name)
}

pub fn sliver_urn(slice: &str, res_type: &str, res_name: &str) -> String {
    format!("urn:publicid:IDN+{AUTHORITY}+sliver+{slice}.{res_type}.{res_name}")
}

pub fn request(res_type: &str, res_name: &str, connections: &[&str]) -> ResourceRequest {
    ResourceRequest {
        res_type: res_type.to_owned(),
        res_name: res_name.to_owned(),
        connections: connections.iter().map(|c| ConnectionId::new(*c)).collect(),
    }
}

#[derive(Debug, Default)]
struct Inner {
    connections: Mutex<HashMap<(String, String), Vec<ConnectionId>>>,
    unavailable: Mutex<HashSet<(String, String)>>,
    fail_list: Mutex<HashSet<(String, String)>>,
    fail_create: Mutex<HashSet<ConnectionId>>,
}

/// In-memory stand-in for the NaaS controller.
#[derive(Debug, Default, Clone)]
pub struct TestController {
    inner: Arc<Inner>,
}

impl TestController {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(res_type: &str, res_name: &str) -> (String, String) {
        (res_type.to_owned(), res_name.to_owned())
    }

    /// seed the resource's currently active connection set
    pub fn set_active(&self, res_type: &str, res_name: &str, connections: &[&str]) {
        self.inner.connections.lock().unwrap().insert(
            Self::key(res_type, res_name),
            connections.iter().map(|c| ConnectionId::new(*c)).collect(),
        );
    }

    pub fn active(&self, res_type: &str, res_name: &str) -> Vec<ConnectionId> {
        self.inner
            .connections
            .lock()
            .unwrap()
            .get(&Self::key(res_type, res_name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn mark_unavailable(&self, res_type: &str, res_name: &str) {
        self.inner
            .unavailable
            .lock()
            .unwrap()
            .insert(Self::key(res_type, res_name));
    }

    /// make connection listing for one resource answer an error body
    pub fn fail_list_for(&self, res_type: &str, res_name: &str) {
        self.inner
            .fail_list
            .lock()
            .unwrap()
            .insert(Self::key(res_type, res_name));
    }

    /// make creation of one specific connection fail
    pub fn fail_create_of(&self, id: &str) {
        self.inner
            .fail_create
            .lock()
            .unwrap()
            .insert(ConnectionId::new(id));
    }
}

#[async_trait]
impl Controller for TestController {
    async fn list_resources(&self) -> Result<Vec<(String, Vec<String>)>, ControllerError> {
        let conns = self.inner.connections.lock().unwrap();
        let mut by_type: HashMap<String, Vec<String>> = HashMap::new();
        for (res_type, res_name) in conns.keys() {
            by_type
                .entry(res_type.clone())
                .or_default()
                .push(res_name.clone());
        }
        Ok(by_type.into_iter().collect())
    }

    async fn check_availability(
        &self,
        res_type: &str,
        res_name: &str,
    ) -> Result<bool, ControllerError> {
        Ok(!self
            .inner
            .unavailable
            .lock()
            .unwrap()
            .contains(&Self::key(res_type, res_name)))
    }

    async fn list_connections(
        &self,
        res_type: &str,
        res_name: &str,
    ) -> Result<Vec<ConnectionId>, ControllerError> {
        let key = Self::key(res_type, res_name);
        if self.inner.fail_list.lock().unwrap().contains(&key) {
            return Err(ControllerError::Remote(
                "Error: resource is not started".to_owned(),
            ));
        }
        Ok(self
            .inner
            .connections
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_connection(
        &self,
        res_type: &str,
        res_name: &str,
        id: &ConnectionId,
        _params: &ConnectionParams,
    ) -> Result<(), ControllerError> {
        if self.inner.fail_create.lock().unwrap().contains(id) {
            return Err(ControllerError::Remote(format!("cannot create {id}")));
        }
        self.inner
            .connections
            .lock()
            .unwrap()
            .entry(Self::key(res_type, res_name))
            .or_default()
            .push(id.clone());
        Ok(())
    }

    async fn remove_connection(
        &self,
        res_type: &str,
        res_name: &str,
        id: &ConnectionId,
    ) -> Result<(), ControllerError> {
        if let Some(conns) = self
            .inner
            .connections
            .lock()
            .unwrap()
            .get_mut(&Self::key(res_type, res_name))
        {
            conns.retain(|c| c != id);
        }
        Ok(())
    }
}
