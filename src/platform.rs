// ABOUTME: Platforms describe where applications run: this host or a remote host over SSH.
// ABOUTME: An Arc<Platform> is passed explicitly to everything that realizes applications.

use crate::application::{
    ApplicationBuilder, ApplicationConsole, ApplicationSchema, BuildError, BuilderOptions, Deployer, LaunchOptions,
    TerminalDeployer,
};
use crate::ssh::SessionConfig;
use crate::terminal::{LocalTerminal, RemoteTerminal, Terminal};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;

/// Where a platform's processes run.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Local,
    Remote(SessionConfig),
}

pub struct Platform {
    name: String,
    location: Location,
    environment: BTreeMap<String, String>,
    options: BuilderOptions,
    deployer: Arc<dyn Deployer>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("environment", &self.environment)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Platform {
    /// This host.
    pub fn local() -> Self {
        Self::new("local", Location::Local)
    }

    /// A remote host reached over SSH.
    pub fn remote(name: impl Into<String>, config: SessionConfig) -> Self {
        Self::new(name, Location::Remote(config))
    }

    fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
            environment: BTreeMap::new(),
            options: BuilderOptions::default(),
            deployer: Arc::new(TerminalDeployer),
        }
    }

    /// Environment applied to every application, over schema defaults.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: BuilderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_deployer(mut self, deployer: Arc<dyn Deployer>) -> Self {
        self.deployer = deployer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn deployer(&self) -> &Arc<dyn Deployer> {
        &self.deployer
    }

    /// Host name of the machine processes run on.
    pub fn hostname(&self) -> String {
        match &self.location {
            Location::Local => gethostname::gethostname().to_string_lossy().into_owned(),
            Location::Remote(config) => config.host.clone(),
        }
    }

    pub fn terminal(&self) -> Arc<dyn Terminal> {
        match &self.location {
            Location::Local => Arc::new(LocalTerminal),
            Location::Remote(config) => Arc::new(RemoteTerminal::new(config.clone())),
        }
    }

    /// Directory artifacts for `application` are deployed into.
    pub fn deployment_directory(&self, application: &str) -> PathBuf {
        let root = match (&self.options.deployment_root, &self.location) {
            (Some(root), _) => root.clone(),
            (None, Location::Local) => std::env::temp_dir().join("foreman"),
            (None, Location::Remote(_)) => PathBuf::from("/tmp/foreman"),
        };
        root.join(application)
    }

    /// Ports from `start` upwards that can currently be bound on this host.
    ///
    /// Ports are probed by binding locally, so a remote platform has none to offer.
    pub fn available_ports(&self, start: u16) -> Option<AvailablePorts> {
        match self.location {
            Location::Local => Some(AvailablePorts { next: Some(start) }),
            Location::Remote(_) => None,
        }
    }

    /// Realize an application described by `schema` on this platform.
    pub async fn realize<S: ApplicationSchema>(
        self: &Arc<Self>,
        schema: &S,
        name: &str,
        console: Arc<dyn ApplicationConsole>,
        options: LaunchOptions,
    ) -> Result<S::Application, BuildError> {
        ApplicationBuilder::new(Arc::clone(self))
            .realize(schema, name, console, options)
            .await
    }
}

/// Lazily probes successive ports, yielding those that are free right now.
///
/// Not `Clone`; ask the platform again to restart the search.
#[derive(Debug)]
pub struct AvailablePorts {
    next: Option<u16>,
}

impl Iterator for AvailablePorts {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        while let Some(port) = self.next {
            self.next = port.checked_add(1);
            if TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok() {
                return Some(port);
            }
        }
        None
    }
}
