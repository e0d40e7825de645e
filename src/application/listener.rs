// ABOUTME: Lifecycle listeners notified as an application is realized and closed.
// ABOUTME: Callbacks are synchronous; failures are captured by the caller, never propagated.

use super::Application;
use crate::deferred::BoxError;
use std::fmt;

/// Points in an application's lifecycle that listeners observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Realized,
    Closing,
    Closed,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Realized => f.write_str("on_realized"),
            LifecycleEvent::Closing => f.write_str("on_closing"),
            LifecycleEvent::Closed => f.write_str("on_closed"),
        }
    }
}

/// Observes lifecycle transitions of an [`Application`].
///
/// For one application the callbacks fire in order realized, closing,
/// closed and never concurrently. An error or panic in one listener is
/// recorded in the application's diagnostics and the remaining listeners
/// are still notified.
pub trait ApplicationListener: Send + Sync {
    fn on_realized(&self, _application: &Application) -> Result<(), BoxError> {
        Ok(())
    }

    fn on_closing(&self, _application: &Application) -> Result<(), BoxError> {
        Ok(())
    }

    fn on_closed(&self, _application: &Application) -> Result<(), BoxError> {
        Ok(())
    }
}

impl dyn ApplicationListener {
    pub(crate) fn dispatch(&self, event: LifecycleEvent, application: &Application) -> Result<(), BoxError> {
        match event {
            LifecycleEvent::Realized => self.on_realized(application),
            LifecycleEvent::Closing => self.on_closing(application),
            LifecycleEvent::Closed => self.on_closed(application),
        }
    }
}
