// ABOUTME: Cluster members expose their membership view through a management channel.
// ABOUTME: ManagedMember reads size and member uids as deferred attributes on every query.

use crate::application::{Application, ApplicationSchema, AsApplication, LaunchSchema};
use crate::deferred::{ChannelError, Deferred, DeferredAttribute, ManagementChannel, Unavailable};
use crate::types::MemberUid;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// An application that is part of a cluster and can report its view of it.
#[async_trait]
pub trait ClusterMember: AsApplication {
    /// Number of members this member currently sees, itself included.
    async fn cluster_size(&self) -> Result<usize, Unavailable>;

    /// The identity the cluster assigned to this member.
    async fn local_member_uid(&self) -> Result<MemberUid, Unavailable>;

    /// Identities of every member this member currently sees.
    async fn cluster_member_uids(&self) -> Result<BTreeSet<MemberUid>, Unavailable>;
}

/// Enough about a running member to open a management connection to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberAddress {
    pub application: String,
    pub host: String,
    pub pid: u64,
    pub environment: BTreeMap<String, String>,
}

impl MemberAddress {
    pub fn of(application: &Application) -> Self {
        Self {
            application: application.name().to_string(),
            host: application.platform().hostname(),
            pid: application.id(),
            environment: application.environment().clone(),
        }
    }
}

/// Opens management channels; how is up to the product being managed.
#[async_trait]
pub trait ManagementConnector: Send + Sync {
    async fn connect(&self, address: &MemberAddress) -> Result<Arc<dyn ManagementChannel>, ChannelError>;
}

/// Names of the management attributes that describe membership.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MembershipAttributes {
    pub cluster_size: String,
    pub local_member_uid: String,
    pub member_uids: String,
}

impl Default for MembershipAttributes {
    fn default() -> Self {
        Self {
            cluster_size: "ClusterSize".to_string(),
            local_member_uid: "LocalMemberUid".to_string(),
            member_uids: "MemberUids".to_string(),
        }
    }
}

/// Connects afresh on every resolution.
struct ManagementLink {
    connector: Arc<dyn ManagementConnector>,
    address: MemberAddress,
}

impl fmt::Display for ManagementLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Management<{}@{}>", self.address.application, self.address.host)
    }
}

#[async_trait]
impl Deferred<Arc<dyn ManagementChannel>> for ManagementLink {
    async fn get(&self) -> Result<Arc<dyn ManagementChannel>, Unavailable> {
        self.connector.connect(&self.address).await.map_err(|e| match e {
            ChannelError::ConnectionBroken(_) | ChannelError::Unsupported(_) => Unavailable::permanently_because(self, e),
            ChannelError::NotRegistered(_) | ChannelError::NotConnected | ChannelError::Transport(_) => {
                Unavailable::temporarily_because(self, e)
            }
        })
    }
}

/// A cluster member whose membership is read through a management channel.
pub struct ManagedMember {
    application: Application,
    link: Arc<dyn Deferred<Arc<dyn ManagementChannel>>>,
    attributes: MembershipAttributes,
}

impl fmt::Debug for ManagedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedMember")
            .field("application", &self.application)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl ManagedMember {
    pub fn new(application: Application, connector: Arc<dyn ManagementConnector>, attributes: MembershipAttributes) -> Self {
        let address = MemberAddress::of(&application);
        Self {
            application,
            link: Arc::new(ManagementLink { connector, address }),
            attributes,
        }
    }

    /// Any attribute of this member, read on demand.
    pub fn attribute<T>(&self, name: &str) -> DeferredAttribute<T> {
        DeferredAttribute::new(Arc::clone(&self.link), name)
    }
}

impl AsApplication for ManagedMember {
    fn application(&self) -> &Application {
        &self.application
    }
}

#[async_trait]
impl ClusterMember for ManagedMember {
    async fn cluster_size(&self) -> Result<usize, Unavailable> {
        self.attribute::<usize>(&self.attributes.cluster_size).get().await
    }

    async fn local_member_uid(&self) -> Result<MemberUid, Unavailable> {
        self.attribute::<MemberUid>(&self.attributes.local_member_uid).get().await
    }

    async fn cluster_member_uids(&self) -> Result<BTreeSet<MemberUid>, Unavailable> {
        self.attribute::<BTreeSet<MemberUid>>(&self.attributes.member_uids).get().await
    }
}

/// Launches members and connects them to their management channel.
#[derive(Clone)]
pub struct ClusterMemberSchema {
    launch: LaunchSchema,
    connector: Arc<dyn ManagementConnector>,
    attributes: MembershipAttributes,
}

impl ClusterMemberSchema {
    pub fn new(launch: LaunchSchema, connector: Arc<dyn ManagementConnector>) -> Self {
        Self {
            launch,
            connector,
            attributes: MembershipAttributes::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: MembershipAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

impl ApplicationSchema for ClusterMemberSchema {
    type Application = ManagedMember;

    fn launch(&self) -> &LaunchSchema {
        &self.launch
    }

    fn create_application(&self, application: Application) -> ManagedMember {
        ManagedMember::new(application, Arc::clone(&self.connector), self.attributes.clone())
    }
}
