//! Credential materialization
//!
//! Each subordinate gets a directory `<bridges_dir>/<controller id>` holding
//! the files delivered in its provisioning token. Files are created
//! owner-read/write only and handed to the bridging service's user when
//! possible. Removal is tolerant: a missing directory is not an error.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::CredentialsConfig;
use crate::error::{SubordinatesError, SubordinatesResult};
use crate::token::{is_valid_controller_id, Blobs};

/// User and group that should own materialized files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOwner {
    pub user: String,
    pub group: String,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
    owner: Option<FileOwner>,
    file_mode: u32,
    dir_mode: u32,
}

impl CredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owner: None,
            file_mode: 0o600,
            dir_mode: 0o777,
        }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self {
            root: config.bridges_dir.clone(),
            owner: Some(FileOwner {
                user: config.owner_user.clone(),
                group: config.owner_group.clone(),
            }),
            file_mode: config.file_mode,
            dir_mode: config.dir_mode,
        }
    }

    pub fn with_owner(mut self, owner: FileOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one node; ids that could escape `root` are rejected
    pub fn path_for(&self, controller_id: &str) -> SubordinatesResult<PathBuf> {
        if !is_valid_controller_id(controller_id) {
            return Err(SubordinatesError::invalid_id(controller_id));
        }
        Ok(self.root.join(controller_id))
    }

    /// Write every blob into the node's directory, creating it if needed
    pub async fn store(&self, controller_id: &str, blobs: &Blobs) -> SubordinatesResult<()> {
        let dir = self.path_for(controller_id)?;
        create_dir(&dir, self.dir_mode).await?;

        for (name, content) in blobs {
            let path = dir.join(name);
            self.write_file(&path, content).await?;
            if let Some(owner) = &self.owner {
                assign_owner(&path, owner).await;
            }
        }

        info!(
            controller_id,
            files = blobs.len(),
            dir = %dir.display(),
            "Stored subordinate credentials"
        );
        Ok(())
    }

    /// Remove the node's directory; missing directories are ignored
    pub async fn remove(&self, controller_id: &str) {
        let dir = match self.path_for(controller_id) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Not removing credentials: {}", e);
                return;
            }
        };
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(controller_id, "Removed subordinate credentials"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                controller_id,
                dir = %dir.display(),
                "Failed to remove subordinate credentials: {}",
                e
            ),
        }
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> SubordinatesResult<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(self.file_mode);

        let mut file = options.open(path).await.map_err(|e| {
            SubordinatesError::storage(format!("create {}", path.display()), e)
        })?;
        file.write_all(content).await?;
        file.flush().await?;

        // `mode` only applies on creation; tighten files that already existed
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(self.file_mode))
                .await?;
        }
        Ok(())
    }
}

async fn create_dir(dir: &Path, mode: u32) -> SubordinatesResult<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(mode);
    builder
        .create(dir)
        .await
        .map_err(|e| SubordinatesError::storage(format!("mkdir {}", dir.display()), e))
}

/// Best-effort chown; failures are logged and ignored
async fn assign_owner(path: &Path, owner: &FileOwner) {
    let path_buf = path.to_path_buf();
    let owner = owner.clone();
    let result = tokio::task::spawn_blocking(move || chown(&path_buf, &owner)).await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(message)) => debug!(path = %path.display(), "Ownership not assigned: {}", message),
        Err(e) => warn!(path = %path.display(), "Ownership task failed: {}", e),
    }
}

#[cfg(unix)]
fn chown(path: &Path, owner: &FileOwner) -> Result<(), String> {
    use nix::unistd::{Group, User};

    let user = User::from_name(&owner.user)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("unknown user {}", owner.user))?;
    let group = Group::from_name(&owner.group)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("unknown group {}", owner.group))?;

    nix::unistd::chown(path, Some(user.uid), Some(group.gid)).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn chown(_path: &Path, _owner: &FileOwner) -> Result<(), String> {
    Err("ownership is not supported on this platform".to_string())
}
