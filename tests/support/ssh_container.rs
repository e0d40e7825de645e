// ABOUTME: SSH container helper for integration tests.
// ABOUTME: Uses bollard to manage a shared SSH server container; tests skip when Docker is absent.

use bollard::Docker;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, RemoveContainerOptions, StopContainerOptions,
};
use foreman::ssh::SessionConfig;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const IMAGE: &str = "lscr.io/linuxserver/openssh-server:latest";
const SSH_PORT: u16 = 2222;
const TEST_USER: &str = "testuser";

/// Container info needed for cleanup.
struct ContainerInfo {
    container_id: String,
}

/// Shared container info for cleanup.
static CONTAINER_INFO: OnceLock<ContainerInfo> = OnceLock::new();

/// Cleanup on process exit.
#[ctor::dtor]
fn cleanup_on_exit() {
    let Some(info) = CONTAINER_INFO.get() else {
        return;
    };
    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return;
    };
    rt.block_on(async {
        if let Ok(docker) = Docker::connect_with_local_defaults() {
            let _ = docker
                .stop_container(&info.container_id, None::<StopContainerOptions>)
                .await;
            let _ = docker
                .remove_container(
                    &info.container_id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
        }
    });
}

/// Shared SSH container for all tests; `None` when it cannot be started.
static SHARED_CONTAINER: tokio::sync::OnceCell<Option<SshContainer>> = tokio::sync::OnceCell::const_new();

/// Get the shared SSH container, starting it if needed.
pub async fn shared_container() -> Option<&'static SshContainer> {
    SHARED_CONTAINER
        .get_or_init(|| async {
            match SshContainer::start().await {
                Ok(container) => Some(container),
                Err(e) => {
                    eprintln!("SSH container unavailable: {e}");
                    None
                }
            }
        })
        .await
        .as_ref()
}

/// Skip the test when no SSH container can be started.
#[macro_export]
macro_rules! require_ssh {
    () => {
        match support::ssh_container::shared_container().await {
            Some(container) => container,
            None => {
                eprintln!("Skipping test: Docker is not available");
                return;
            }
        }
    };
}

/// Running SSH container with connection details.
pub struct SshContainer {
    port: u16,
    key_path: PathBuf,
    _key_dir: tempfile::TempDir,
}

impl SshContainer {
    async fn start() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;

        let key_dir = tempfile::tempdir()?;
        let key_path = key_dir.path().join("id_ed25519");
        generate_key(&key_path)?;
        let public_key = std::fs::read_to_string(key_path.with_extension("pub"))?;

        let mut pull_stream = docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(IMAGE.to_string()),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(result) = pull_stream.next().await {
            result?;
        }

        let port = Self::find_available_port().await?;

        let container_name = format!("foreman-ssh-test-{}", std::process::id());
        let env = vec![
            "PUID=1000".to_string(),
            "PGID=1000".to_string(),
            format!("USER_NAME={TEST_USER}"),
            format!("PUBLIC_KEY={}", public_key.trim()),
        ];

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            format!("{SSH_PORT}/tcp"),
            Some(vec![bollard::models::PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(port.to_string()),
            }]),
        );

        let host_config = bollard::models::HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        };

        let config = ContainerCreateBody {
            image: Some(IMAGE.to_string()),
            env: Some(env),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container = docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(container_name),
                    ..Default::default()
                }),
                config,
            )
            .await?;

        let _ = CONTAINER_INFO.set(ContainerInfo {
            container_id: container.id.clone(),
        });

        docker
            .start_container(
                &container.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await?;

        Self::wait_for_ssh(port).await?;

        Ok(Self {
            port,
            key_path,
            _key_dir: key_dir,
        })
    }

    /// Get SessionConfig for connecting to this container.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", TEST_USER)
            .port(self.port)
            .key_path(&self.key_path)
            .trust_on_first_use(true)
            .known_hosts_path(self._key_dir.path().join("known_hosts"))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    async fn find_available_port() -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    async fn wait_for_ssh(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        use tokio::io::AsyncReadExt;

        let addr = format!("127.0.0.1:{port}");
        for _ in 0..60 {
            if let Ok(mut stream) = tokio::net::TcpStream::connect(&addr).await {
                let mut buf = [0u8; 32];
                if let Ok(Ok(n)) =
                    tokio::time::timeout(std::time::Duration::from_secs(2), stream.read(&mut buf)).await
                    && n > 0
                    && String::from_utf8_lossy(&buf[..n]).starts_with("SSH-")
                {
                    // Banner is up; give sshd a moment to finish user setup
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    return Ok(());
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
        Err("SSH container did not become ready in time".into())
    }
}

fn generate_key(path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let status = std::process::Command::new("ssh-keygen")
        .args(["-q", "-t", "ed25519", "-N", "", "-f"])
        .arg(path)
        .status()?;
    if !status.success() {
        return Err(format!("ssh-keygen exited with {status}").into());
    }
    Ok(())
}
