// ABOUTME: Deferred reads of named attributes through a management channel.
// ABOUTME: Maps channel failures onto temporary or permanent unavailability.

use super::{Deferred, Unavailable};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by a management channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("management connection broken: {0}")]
    ConnectionBroken(String),

    #[error("attribute {0} is not registered yet")]
    NotRegistered(String),

    #[error("management channel not connected yet")]
    NotConnected,

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("management transport failure: {0}")]
    Transport(String),
}

/// A live connection to an application's management interface.
#[async_trait]
pub trait ManagementChannel: Send + Sync {
    /// Read the current value of a named attribute.
    async fn attribute(&self, name: &str) -> Result<serde_json::Value, ChannelError>;
}

/// Reads `attribute` through the channel resolved by `channel` on every attempt.
pub struct DeferredAttribute<T> {
    channel: Arc<dyn Deferred<Arc<dyn ManagementChannel>>>,
    attribute: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DeferredAttribute<T> {
    pub fn new(channel: Arc<dyn Deferred<Arc<dyn ManagementChannel>>>, attribute: impl Into<String>) -> Self {
        Self {
            channel,
            attribute: attribute.into(),
            _marker: PhantomData,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl<T> fmt::Display for DeferredAttribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute<{}> via {}", self.attribute, self.channel)
    }
}

#[async_trait]
impl<T> Deferred<T> for DeferredAttribute<T>
where
    T: DeserializeOwned + Send,
{
    async fn get(&self) -> Result<T, Unavailable> {
        let channel = self.channel.get().await?;

        let value = channel.attribute(&self.attribute).await.map_err(|e| match e {
            ChannelError::ConnectionBroken(_) | ChannelError::Unsupported(_) => {
                Unavailable::permanently_because(self, e)
            }
            ChannelError::NotRegistered(_) | ChannelError::NotConnected | ChannelError::Transport(_) => {
                Unavailable::temporarily_because(self, e)
            }
        })?;

        serde_json::from_value(value).map_err(|e| Unavailable::permanently_because(self, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Scripted(Mutex<VecDeque<Result<serde_json::Value, ChannelError>>>);

    #[async_trait]
    impl ManagementChannel for Scripted {
        async fn attribute(&self, _name: &str) -> Result<serde_json::Value, ChannelError> {
            self.0.lock().pop_front().unwrap_or(Err(ChannelError::NotConnected))
        }
    }

    fn attribute_over(responses: Vec<Result<serde_json::Value, ChannelError>>) -> DeferredAttribute<u32> {
        let channel: Arc<dyn ManagementChannel> = Arc::new(Scripted(Mutex::new(responses.into())));
        let deferred: Arc<dyn Deferred<Arc<dyn ManagementChannel>>> = Arc::new(ChannelValue(channel));
        DeferredAttribute::new(deferred, "ClusterSize")
    }

    struct ChannelValue(Arc<dyn ManagementChannel>);

    impl fmt::Display for ChannelValue {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Channel")
        }
    }

    #[async_trait]
    impl Deferred<Arc<dyn ManagementChannel>> for ChannelValue {
        async fn get(&self) -> Result<Arc<dyn ManagementChannel>, Unavailable> {
            Ok(Arc::clone(&self.0))
        }
    }

    #[tokio::test]
    async fn decodes_attribute_value() {
        let deferred = attribute_over(vec![Ok(serde_json::json!(3))]);
        assert_eq!(deferred.get().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn broken_connection_is_permanent() {
        let deferred = attribute_over(vec![Err(ChannelError::ConnectionBroken("reset".into()))]);
        assert!(deferred.get().await.unwrap_err().is_permanent());
    }

    #[tokio::test]
    async fn unsupported_operation_is_permanent() {
        let deferred = attribute_over(vec![Err(ChannelError::Unsupported("read".into()))]);
        assert!(deferred.get().await.unwrap_err().is_permanent());
    }

    #[tokio::test]
    async fn unregistered_and_unconnected_are_temporary() {
        let deferred = attribute_over(vec![
            Err(ChannelError::NotRegistered("ClusterSize".into())),
            Err(ChannelError::NotConnected),
            Err(ChannelError::Transport("timeout".into())),
        ]);
        for _ in 0..3 {
            assert!(!deferred.get().await.unwrap_err().is_permanent());
        }
    }

    #[tokio::test]
    async fn type_mismatch_is_permanent() {
        let deferred = attribute_over(vec![Ok(serde_json::json!("three"))]);
        assert!(deferred.get().await.unwrap_err().is_permanent());
    }

    #[tokio::test]
    async fn inner_classification_passes_through() {
        struct Gone;
        impl fmt::Display for Gone {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("Gone")
            }
        }
        #[async_trait]
        impl Deferred<Arc<dyn ManagementChannel>> for Gone {
            async fn get(&self) -> Result<Arc<dyn ManagementChannel>, Unavailable> {
                Err(Unavailable::temporarily(self))
            }
        }

        let deferred: DeferredAttribute<u32> = DeferredAttribute::new(Arc::new(Gone), "ClusterSize");
        let err = deferred.get().await.unwrap_err();
        assert!(!err.is_permanent());
        assert_eq!(err.deferred(), "Gone");
    }
}
