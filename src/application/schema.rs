// ABOUTME: Schemas describe how to launch an application and how to wrap the result.
// ABOUTME: LaunchSchema is the plain description; ApplicationSchema adds the typed wrapper.

use super::deploy::Artifact;
use super::{Application, AsApplication};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What to run: program, arguments, defaults and artifacts to deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSchema {
    pub executable: String,
    pub arguments: Vec<String>,
    /// Defaults, overridden by the platform and then by launch options.
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
    pub artifacts: Vec<Artifact>,
}

impl LaunchSchema {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

/// A launch description plus the typed handle it produces.
pub trait ApplicationSchema: Send + Sync {
    type Application: AsApplication + 'static;

    fn launch(&self) -> &LaunchSchema;

    /// Wrap the realized application in its typed handle.
    fn create_application(&self, application: Application) -> Self::Application;
}

impl ApplicationSchema for LaunchSchema {
    type Application = Application;

    fn launch(&self) -> &LaunchSchema {
        self
    }

    fn create_application(&self, application: Application) -> Application {
        application
    }
}
