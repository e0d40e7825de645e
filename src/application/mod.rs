// ABOUTME: Applications: realized processes wrapped with lifecycle, console and diagnostics.
// ABOUTME: Exposes schemas, the builder, listeners, consoles and deployment.

mod builder;
mod console;
mod deploy;
mod error;
mod handle;
mod listener;
mod schema;

pub use builder::{ApplicationBuilder, BuilderOptions, LaunchOptions};
pub use console::{
    ApplicationConsole, CapturedLine, CapturingConsole, NullConsole, StreamName, SystemConsole, TracingConsole,
};
pub use deploy::{Artifact, DeployError, Deployer, TerminalDeployer, deployable};
pub use error::{BuildError, BuildStep};
pub use handle::{Application, AuxiliaryChannel, Lifecycle};
pub use listener::{ApplicationListener, LifecycleEvent};
pub use schema::{ApplicationSchema, LaunchSchema};

/// Typed application handles expose the [`Application`] they wrap.
pub trait AsApplication: Send + Sync {
    fn application(&self) -> &Application;
}

impl AsApplication for Application {
    fn application(&self) -> &Application {
        self
    }
}
