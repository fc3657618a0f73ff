//! In-memory block-storage adapter
//!
//! Reference implementation of [`BlockStorageBackend`] backed by in-process
//! maps. Used in tests and for embedding the gateway without a real backend.

use crate::backend::{
    BackendAttachment, BackendBackup, BackendVolume, BlockStorageBackend, VolumePage,
};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

// =============================================================================
// Memory Backend
// =============================================================================

/// In-memory backend adapter
#[derive(Default)]
pub struct MemoryBackend {
    /// Volumes by id
    volumes: RwLock<BTreeMap<String, BackendVolume>>,
    /// Backups by id
    backups: RwLock<BTreeMap<String, BackendBackup>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backup that restores can reference
    pub async fn insert_backup(&self, backup: BackendBackup) {
        self.backups.write().await.insert(backup.id.clone(), backup);
    }

    /// Override a volume's raw status
    pub async fn set_status(&self, volume_id: &str, status: &str) -> BackendResult<()> {
        let mut volumes = self.volumes.write().await;
        let volume = volumes
            .get_mut(volume_id)
            .ok_or_else(|| BackendError::NotFound(volume_id.to_string()))?;
        volume.status = status.to_string();
        Ok(())
    }

    /// Attach a volume to an instance and mark it in-use
    pub async fn attach(
        &self,
        volume_id: &str,
        device: &str,
        server_id: &str,
    ) -> BackendResult<()> {
        let mut volumes = self.volumes.write().await;
        let volume = volumes
            .get_mut(volume_id)
            .ok_or_else(|| BackendError::NotFound(volume_id.to_string()))?;
        volume.attachments.push(BackendAttachment {
            device: Some(device.to_string()),
            server_id: Some(server_id.to_string()),
        });
        volume.status = "in-use".to_string();
        Ok(())
    }

    /// Number of volumes currently held
    pub async fn volume_count(&self) -> usize {
        self.volumes.read().await.len()
    }
}

#[async_trait]
impl BlockStorageBackend for MemoryBackend {
    async fn create_volume(
        &self,
        size_gib: u64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> BackendResult<BackendVolume> {
        let volume_id = format!("vol-{}", generate_id());

        info!("Creating volume: {} ({} GiB)", volume_id, size_gib);

        let volume = BackendVolume {
            id: volume_id.clone(),
            name: name.map(str::to_string),
            description: description.map(str::to_string),
            size_gib,
            status: "creating".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            snapshot_id: None,
            attachments: Vec::new(),
        };

        self.volumes
            .write()
            .await
            .insert(volume_id, volume.clone());

        Ok(volume)
    }

    async fn restore_backup(&self, backup_id: &str) -> BackendResult<BackendVolume> {
        let backup = self
            .backups
            .read()
            .await
            .get(backup_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(backup_id.to_string()))?;

        let volume_id = format!("vol-{}", generate_id());

        info!("Restoring backup {} into volume {}", backup_id, volume_id);

        let volume = BackendVolume {
            id: volume_id.clone(),
            name: None,
            description: None,
            size_gib: backup.size_gib,
            status: "restoring-backup".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            snapshot_id: Some(backup.id),
            attachments: Vec::new(),
        };

        self.volumes
            .write()
            .await
            .insert(volume_id, volume.clone());

        Ok(volume)
    }

    async fn delete_volume(&self, volume_id: &str) -> BackendResult<()> {
        let mut volumes = self.volumes.write().await;
        match volumes.get(volume_id) {
            Some(volume) if !volume.attachments.is_empty() => {
                Err(BackendError::BadRequest(format!(
                    "volume {} is attached",
                    volume_id
                )))
            }
            Some(_) => {
                info!("Deleting volume: {}", volume_id);
                volumes.remove(volume_id);
                Ok(())
            }
            None => Err(BackendError::NotFound(volume_id.to_string())),
        }
    }

    async fn get_volume(&self, volume_id: &str) -> BackendResult<BackendVolume> {
        self.volumes
            .read()
            .await
            .get(volume_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(volume_id.to_string()))
    }

    async fn list_volumes(
        &self,
        marker: Option<&str>,
        limit: Option<u32>,
    ) -> BackendResult<VolumePage> {
        let volumes = self.volumes.read().await;

        // BTreeMap iteration gives a stable id order; the marker is the last
        // id of the previous page.
        let after_marker: Vec<&BackendVolume> = match marker {
            Some(marker) => {
                if !volumes.contains_key(marker) {
                    return Err(BackendError::BadRequest(format!(
                        "invalid marker: {}",
                        marker
                    )));
                }
                volumes
                    .range::<str, _>((
                        std::ops::Bound::Excluded(marker),
                        std::ops::Bound::Unbounded,
                    ))
                    .map(|(_, v)| v)
                    .collect()
            }
            None => volumes.values().collect(),
        };

        let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let page: Vec<BackendVolume> = after_marker.iter().take(limit).map(|v| (*v).clone()).collect();
        let next_token = if after_marker.len() > page.len() {
            page.last().map(|v| v.id.clone())
        } else {
            None
        };

        debug!("Listed {} volumes (next token: {:?})", page.len(), next_token);

        Ok(VolumePage {
            volumes: page,
            next_token,
        })
    }

    async fn get_backup(&self, backup_id: &str) -> BackendResult<BackendBackup> {
        self.backups
            .read()
            .await
            .get(backup_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(backup_id.to_string()))
    }
}

/// Generate a simple unique ID
fn generate_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{:016x}", now)
}
