//! Block-storage backend port
//!
//! Defines the boundary between the gateway and the underlying block-storage
//! service. The concrete client (a synchronous REST client in production) is
//! an external collaborator; adapters implement [`BlockStorageBackend`] to
//! provide it. Each operation fails fast with one of the conditions in
//! [`BackendError`](crate::error::BackendError); the gateway applies no
//! retry or backoff.

pub mod memory;

pub use memory::MemoryBackend;

use crate::error::BackendResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Backend Resource Types
// =============================================================================

/// A volume as reported by the backend.
///
/// Reconstructed fresh from every backend response; the gateway never
/// persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendVolume {
    /// Backend volume identifier
    pub id: String,
    /// Display name
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Size in GiB
    pub size_gib: u64,
    /// Raw backend status string (wider vocabulary than the foreign API)
    pub status: String,
    /// Creation time as reported by the backend (RFC 3339)
    pub created_at: String,
    /// Source snapshot/backup lineage, if any
    pub snapshot_id: Option<String>,
    /// Current attachments
    pub attachments: Vec<BackendAttachment>,
}

/// A volume attachment as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendAttachment {
    /// Device path on the attaching instance
    pub device: Option<String>,
    /// Identifier of the attaching instance
    pub server_id: Option<String>,
}

/// A backup/snapshot as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendBackup {
    /// Backend backup identifier
    pub id: String,
    /// Recorded size in GiB
    pub size_gib: u64,
}

/// One page of a volume listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumePage {
    /// Volumes on this page
    pub volumes: Vec<BackendVolume>,
    /// Opaque token for the next page, if more volumes exist
    pub next_token: Option<String>,
}

// =============================================================================
// Block Storage Port
// =============================================================================

/// Port for block-storage backend operations
#[async_trait]
pub trait BlockStorageBackend: Send + Sync {
    /// Create an empty volume of the given size
    async fn create_volume(
        &self,
        size_gib: u64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> BackendResult<BackendVolume>;

    /// Create a volume by restoring a backup
    async fn restore_backup(&self, backup_id: &str) -> BackendResult<BackendVolume>;

    /// Delete a volume
    async fn delete_volume(&self, volume_id: &str) -> BackendResult<()>;

    /// Fetch a single volume
    async fn get_volume(&self, volume_id: &str) -> BackendResult<BackendVolume>;

    /// List volumes with backend-native pagination
    async fn list_volumes(
        &self,
        marker: Option<&str>,
        limit: Option<u32>,
    ) -> BackendResult<VolumePage>;

    /// Fetch a single backup
    async fn get_backup(&self, backup_id: &str) -> BackendResult<BackendBackup>;
}

/// Shared reference to a backend adapter
pub type BackendRef = Arc<dyn BlockStorageBackend>;
