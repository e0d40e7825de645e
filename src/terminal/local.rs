// ABOUTME: Terminal that spawns processes and manages files on this host.
// ABOUTME: Directory creation and uploads map directly onto tokio::fs.

use super::{LaunchCommand, Terminal};
use crate::process::{ApplicationProcess, LocalProcess, ProcessError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTerminal;

#[async_trait]
impl Terminal for LocalTerminal {
    async fn realize(&self, command: &LaunchCommand) -> Result<Arc<dyn ApplicationProcess>> {
        Ok(Arc::new(LocalProcess::spawn(command)?))
    }

    async fn make_directories(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|source| ProcessError::MakeDirectories {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn upload(&self, source: &Path, destination: &Path) -> Result<()> {
        tokio::fs::copy(source, destination)
            .await
            .map(|_| ())
            .map_err(|e| ProcessError::Copy {
                path: source.to_path_buf(),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn make_directories_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a/b/c");

        LocalTerminal.make_directories(&nested).await.unwrap();
        LocalTerminal.make_directories(&nested).await.unwrap();

        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn upload_copies_file() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("source.txt");
        let destination = temp.path().join("destination.txt");
        std::fs::write(&source, "payload").unwrap();

        LocalTerminal.upload(&source, &destination).await.unwrap();

        assert_eq!(std::fs::read_to_string(destination).unwrap(), "payload");
    }
}
