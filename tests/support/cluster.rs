// ABOUTME: In-memory cluster membership for restart tests.
// ABOUTME: A listener joins and leaves members by pid; a connector serves their membership attributes.

use async_trait::async_trait;
use foreman::Application;
use foreman::application::ApplicationListener;
use foreman::cluster::{ManagementConnector, MemberAddress};
use foreman::deferred::{BoxError, ChannelError, ManagementChannel};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Members currently in the cluster, keyed by process id.
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    members: BTreeMap<u64, String>,
    joined: u64,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn join(&self, pid: u64) -> String {
        let mut state = self.state.lock();
        state.joined += 1;
        let uid = format!("member-{}", state.joined);
        state.members.insert(pid, uid.clone());
        uid
    }

    pub fn leave(&self, pid: u64) {
        self.state.lock().members.remove(&pid);
    }

    pub fn uids(&self) -> Vec<String> {
        self.state.lock().members.values().cloned().collect()
    }

    pub fn uid_of(&self, pid: u64) -> Option<String> {
        self.state.lock().members.get(&pid).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().members.len()
    }
}

/// Joins members when realized and removes them once closed.
pub struct RegistryListener(pub Arc<Registry>);

impl ApplicationListener for RegistryListener {
    fn on_realized(&self, application: &Application) -> Result<(), BoxError> {
        self.0.join(application.id());
        Ok(())
    }

    fn on_closed(&self, application: &Application) -> Result<(), BoxError> {
        self.0.leave(application.id());
        Ok(())
    }
}

pub struct RegistryConnector(pub Arc<Registry>);

#[async_trait]
impl ManagementConnector for RegistryConnector {
    async fn connect(&self, address: &MemberAddress) -> Result<Arc<dyn ManagementChannel>, ChannelError> {
        if self.0.uid_of(address.pid).is_none() {
            return Err(ChannelError::NotRegistered(address.application.clone()));
        }
        Ok(Arc::new(RegistryChannel {
            registry: Arc::clone(&self.0),
            pid: address.pid,
        }))
    }
}

struct RegistryChannel {
    registry: Arc<Registry>,
    pid: u64,
}

#[async_trait]
impl ManagementChannel for RegistryChannel {
    async fn attribute(&self, name: &str) -> Result<Value, ChannelError> {
        match name {
            "ClusterSize" => Ok(json!(self.registry.len())),
            "LocalMemberUid" => self
                .registry
                .uid_of(self.pid)
                .map(Value::from)
                .ok_or(ChannelError::NotConnected),
            "MemberUids" => Ok(json!(self.registry.uids())),
            other => Err(ChannelError::Unsupported(other.to_string())),
        }
    }
}
