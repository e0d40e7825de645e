// ABOUTME: Realizes applications on a platform: environment, directories, deployment, launch.
// ABOUTME: Builder-wide defaults live in BuilderOptions; LaunchOptions override them per call.

use super::console::ApplicationConsole;
use super::deploy::deployable;
use super::error::{BuildError, DeploySnafu, PrepareDirectorySnafu, StartSnafu};
use super::listener::ApplicationListener;
use super::schema::ApplicationSchema;
use super::Application;
use crate::platform::Platform;
use crate::terminal::LaunchCommand;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Defaults applied to every application a platform realizes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    /// Leave processes running when their handles are closed.
    pub orphans_permitted: bool,
    /// Deploy schema artifacts before launching.
    pub auto_deploy: bool,
    /// File names the platform already provides; never deployed.
    pub do_not_deploy: BTreeSet<String>,
    /// Root under which each application gets its own deployment directory.
    pub deployment_root: Option<PathBuf>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            orphans_permitted: false,
            auto_deploy: true,
            do_not_deploy: BTreeSet::new(),
            deployment_root: None,
        }
    }
}

/// Per-launch overrides.
#[derive(Clone, Default)]
pub struct LaunchOptions {
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
    pub orphans_permitted: Option<bool>,
    pub auto_deploy: Option<bool>,
    pub listeners: Vec<Arc<dyn ApplicationListener>>,
}

impl fmt::Debug for LaunchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchOptions")
            .field("environment", &self.environment)
            .field("working_directory", &self.working_directory)
            .field("orphans_permitted", &self.orphans_permitted)
            .field("auto_deploy", &self.auto_deploy)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl LaunchOptions {
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn orphans_permitted(mut self, permitted: bool) -> Self {
        self.orphans_permitted = Some(permitted);
        self
    }

    pub fn auto_deploy(mut self, enabled: bool) -> Self {
        self.auto_deploy = Some(enabled);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ApplicationListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

/// Realizes applications on one platform.
#[derive(Debug, Clone)]
pub struct ApplicationBuilder {
    platform: Arc<Platform>,
}

impl ApplicationBuilder {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    pub async fn realize<S: ApplicationSchema>(
        &self,
        schema: &S,
        name: &str,
        console: Arc<dyn ApplicationConsole>,
        options: LaunchOptions,
    ) -> Result<S::Application, BuildError> {
        let platform = &self.platform;
        let launch = schema.launch();
        let defaults = platform.options();

        let mut environment = launch.environment.clone();
        environment.extend(platform.environment().clone());
        environment.extend(options.environment);

        let mut working_directory = options
            .working_directory
            .or_else(|| launch.working_directory.clone());

        let terminal = platform.terminal();

        if options.auto_deploy.unwrap_or(defaults.auto_deploy) {
            let artifacts = deployable(&launch.artifacts, &defaults.do_not_deploy);
            if !artifacts.is_empty() {
                let destination = platform.deployment_directory(name);
                terminal
                    .make_directories(&destination)
                    .await
                    .context(PrepareDirectorySnafu {
                        application: name,
                        path: destination.clone(),
                    })?;
                platform
                    .deployer()
                    .deploy(&artifacts, &destination, terminal.as_ref())
                    .await
                    .context(DeploySnafu { application: name })?;
                tracing::info!(application = name, count = artifacts.len(), destination = %destination.display(), "Deployed artifacts");
                working_directory.get_or_insert(destination);
            }
        }

        let command = LaunchCommand {
            executable: launch.executable.clone(),
            arguments: launch.arguments.clone(),
            environment: environment.clone(),
            working_directory,
            orphans_permitted: options.orphans_permitted.unwrap_or(defaults.orphans_permitted),
        };

        let process = terminal.realize(&command).await.context(StartSnafu {
            application: name,
            platform: platform.name(),
        })?;

        let application = Application::realized(
            name,
            process,
            Arc::clone(platform),
            environment,
            options.listeners,
            console,
        );
        Ok(schema.create_application(application))
    }
}
