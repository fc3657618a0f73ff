//! Volume provisioning coordinator
//!
//! Translates foreign volume operations (create/delete/describe) into calls
//! against the block-storage backend and translates the results back into
//! the foreign record shapes. Provisioning runs inside a
//! [`CompensationScope`] so a failure after a successful backend mutation
//! never leaves an orphaned backend resource behind.

pub mod compensation;
pub mod format;

pub use compensation::CompensationScope;
pub use format::{AttachmentRecord, VolumeRecord, VolumeView};

use crate::backend::{BackendRef, BackendVolume};
use crate::config::UnknownStatusPolicy;
use crate::context::RequestContext;
use crate::error::{BackendError, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Parameters of a volume-create call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeRequest {
    /// Desired size in GiB
    #[serde(default)]
    pub size_gib: Option<u64>,
    /// Snapshot to restore from
    #[serde(default)]
    pub snapshot_id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
}

/// Parameters of a volume-describe call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeVolumesQuery {
    /// Describe exactly this volume; pagination and the detail flag are
    /// ignored when set
    #[serde(default)]
    pub volume_id: Option<String>,
    /// Full detail instead of the summary projection
    #[serde(default)]
    pub detail: bool,
    /// Page size for listings
    #[serde(default)]
    pub max_results: Option<u32>,
    /// Opaque page token from a previous response
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Response of a volume-describe call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeVolumesResponse {
    pub volume_set: Vec<VolumeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

// =============================================================================
// Provisioning Plan
// =============================================================================

/// Which backend mutation a create call resolves to
#[derive(Debug, Clone)]
enum ProvisionPlan {
    /// Create an empty volume of the given size
    Empty(u64),
    /// Restore the given backup
    Restore(String),
}

// =============================================================================
// Coordinator
// =============================================================================

/// Coordinates volume operations against the block-storage backend
pub struct VolumeCoordinator {
    backend: BackendRef,
    status_policy: UnknownStatusPolicy,
}

impl VolumeCoordinator {
    /// Create a coordinator with the default status policy
    pub fn new(backend: BackendRef) -> Self {
        Self {
            backend,
            status_policy: UnknownStatusPolicy::default(),
        }
    }

    /// Override the policy for unrecognized backend statuses
    pub fn with_status_policy(mut self, policy: UnknownStatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    /// Create a volume, either empty or restored from a snapshot.
    ///
    /// Validation failures surface before any backend mutation. Once the
    /// backend create/restore has succeeded, any later failure runs the
    /// compensating delete before the error propagates, so an error return
    /// never leaves an orphaned volume behind.
    pub async fn create_volume(
        &self,
        context: &RequestContext,
        request: CreateVolumeRequest,
    ) -> Result<VolumeRecord> {
        context.require()?;

        let plan = self.plan(&request).await?;

        let mut scope = CompensationScope::new();
        let outcome = self.provision(&mut scope, plan, &request).await;
        match outcome {
            Ok(record) => {
                scope.commit();
                info!("Created volume {}", record.volume_id);
                Ok(record)
            }
            Err(err) => {
                scope.unwind().await;
                Err(err)
            }
        }
    }

    /// Delete a volume.
    ///
    /// Any local bookkeeping for the volume is intentionally left in place;
    /// the backend delete may complete asynchronously, and an out-of-band
    /// reconciler removes records once the volume has disappeared from the
    /// backend.
    pub async fn delete_volume(&self, context: &RequestContext, volume_id: &str) -> Result<bool> {
        context.require()?;

        match self.backend.delete_volume(volume_id).await {
            Ok(()) => {
                info!("Deleted volume {}", volume_id);
                Ok(true)
            }
            Err(BackendError::BadRequest(reason)) => {
                debug!("Backend rejected delete of {}: {}", volume_id, reason);
                Err(Error::UnsupportedOperation)
            }
            Err(BackendError::NotFound(_)) => {
                Err(Error::InvalidInput("Requested volume not found".to_string()))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Describe one volume or list a page of volumes.
    ///
    /// Every call re-queries the backend; results carry no staleness
    /// guarantee.
    pub async fn describe_volumes(
        &self,
        context: &RequestContext,
        query: DescribeVolumesQuery,
    ) -> Result<DescribeVolumesResponse> {
        context.require()?;

        if let Some(volume_id) = &query.volume_id {
            // A targeted describe is always full detail and unpaginated.
            let volume = self.backend.get_volume(volume_id).await?;
            let record = self.format(&volume, VolumeView::Detail)?;
            return Ok(DescribeVolumesResponse {
                volume_set: vec![record],
                next_token: None,
            });
        }

        let page = self
            .backend
            .list_volumes(query.next_token.as_deref(), query.max_results)
            .await?;

        let view = if query.detail {
            VolumeView::Detail
        } else {
            VolumeView::Summary
        };

        let volume_set = page
            .volumes
            .iter()
            .map(|volume| self.format(volume, view))
            .collect::<Result<Vec<_>>>()?;

        Ok(DescribeVolumesResponse {
            volume_set,
            next_token: page.next_token,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Resolve a create request into a backend mutation, or fail before any
    /// mutation happens.
    async fn plan(&self, request: &CreateVolumeRequest) -> Result<ProvisionPlan> {
        match (request.size_gib, request.snapshot_id.as_deref()) {
            (None, None) => Err(Error::InvalidInput(
                "Either a size or a snapshot id must be specified".to_string(),
            )),
            (Some(size), None) => Ok(ProvisionPlan::Empty(size)),
            (None, Some(snapshot_id)) => Ok(ProvisionPlan::Restore(snapshot_id.to_string())),
            (Some(size), Some(snapshot_id)) => {
                let backup =
                    self.backend
                        .get_backup(snapshot_id)
                        .await
                        .map_err(|err| match err {
                            BackendError::NotFound(_) => Error::InvalidInput(format!(
                                "Requested snapshot {} not found",
                                snapshot_id
                            )),
                            other => Error::Backend(other),
                        })?;

                if backup.size_gib > size {
                    return Err(Error::InvalidInput(
                        "Size specified should be at least the size of the snapshot".to_string(),
                    ));
                }
                if size > backup.size_gib {
                    // The backend restore yields a volume of the backup's
                    // size; growing it afterwards needs an extend operation
                    // the backend port does not model yet.
                    warn!(
                        "Requested size {} GiB exceeds snapshot {} size {} GiB; volume will be restored at snapshot size",
                        size, snapshot_id, backup.size_gib
                    );
                }
                Ok(ProvisionPlan::Restore(snapshot_id.to_string()))
            }
        }
    }

    /// Perform the planned mutation and register its undo action before
    /// doing anything that may still fail.
    async fn provision(
        &self,
        scope: &mut CompensationScope,
        plan: ProvisionPlan,
        request: &CreateVolumeRequest,
    ) -> Result<VolumeRecord> {
        let volume = match plan {
            ProvisionPlan::Empty(size) => {
                self.backend
                    .create_volume(size, request.name.as_deref(), request.description.as_deref())
                    .await?
            }
            ProvisionPlan::Restore(ref backup_id) => {
                self.backend.restore_backup(backup_id).await?
            }
        };

        let backend = Arc::clone(&self.backend);
        let volume_id = volume.id.clone();
        scope.register(format!("delete volume {}", volume.id), move || async move {
            if let Err(err) = backend.delete_volume(&volume_id).await {
                warn!("Compensating delete of volume {} failed: {}", volume_id, err);
            }
        });

        self.format(&volume, VolumeView::Detail)
    }

    fn format(&self, volume: &BackendVolume, view: VolumeView) -> Result<VolumeRecord> {
        format::format_volume(volume, view, self.status_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendBackup, BlockStorageBackend, MemoryBackend, VolumePage};
    use crate::error::BackendResult;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn tenant() -> RequestContext {
        RequestContext::builder(Some("user-1".to_string()), Some("project-1".to_string()))
            .auth_token("tenant-token")
            .build()
    }

    // A scripted backend that counts every call and can hand out malformed
    // responses to exercise the failure path after a successful mutation.
    #[derive(Default)]
    struct ScriptedBackend {
        create_calls: AtomicUsize,
        restore_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        get_backup_calls: AtomicUsize,
        backups: BTreeMap<String, u64>,
        malformed_created_at: bool,
        deleted: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn with_backup(mut self, id: &str, size_gib: u64) -> Self {
            self.backups.insert(id.to_string(), size_gib);
            self
        }

        fn with_malformed_created_at(mut self) -> Self {
            self.malformed_created_at = true;
            self
        }

        fn volume(&self, id: &str, snapshot_id: Option<&str>, size_gib: u64) -> BackendVolume {
            let created_at = if self.malformed_created_at {
                "not-a-timestamp".to_string()
            } else {
                "2024-03-01T10:30:00+00:00".to_string()
            };
            BackendVolume {
                id: id.to_string(),
                name: None,
                description: None,
                size_gib,
                status: "creating".to_string(),
                created_at,
                snapshot_id: snapshot_id.map(str::to_string),
                attachments: vec![],
            }
        }

        fn mutation_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
                + self.restore_calls.load(Ordering::SeqCst)
                + self.delete_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlockStorageBackend for ScriptedBackend {
        async fn create_volume(
            &self,
            size_gib: u64,
            _name: Option<&str>,
            _description: Option<&str>,
        ) -> BackendResult<BackendVolume> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.volume("vol-1", None, size_gib))
        }

        async fn restore_backup(&self, backup_id: &str) -> BackendResult<BackendVolume> {
            self.restore_calls.fetch_add(1, Ordering::SeqCst);
            let size = self
                .backups
                .get(backup_id)
                .copied()
                .ok_or_else(|| BackendError::NotFound(backup_id.to_string()))?;
            Ok(self.volume("vol-1", Some(backup_id), size))
        }

        async fn delete_volume(&self, volume_id: &str) -> BackendResult<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            self.deleted.lock().unwrap().push(volume_id.to_string());
            Ok(())
        }

        async fn get_volume(&self, volume_id: &str) -> BackendResult<BackendVolume> {
            Err(BackendError::NotFound(volume_id.to_string()))
        }

        async fn list_volumes(
            &self,
            _marker: Option<&str>,
            _limit: Option<u32>,
        ) -> BackendResult<VolumePage> {
            Ok(VolumePage {
                volumes: vec![],
                next_token: None,
            })
        }

        async fn get_backup(&self, backup_id: &str) -> BackendResult<BackendBackup> {
            self.get_backup_calls.fetch_add(1, Ordering::SeqCst);
            self.backups
                .get(backup_id)
                .map(|size| BackendBackup {
                    id: backup_id.to_string(),
                    size_gib: *size,
                })
                .ok_or_else(|| BackendError::NotFound(backup_id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_create_requires_size_or_snapshot() {
        let backend = Arc::new(ScriptedBackend::default());
        let coordinator = VolumeCoordinator::new(backend.clone());

        let err = coordinator
            .create_volume(&tenant(), CreateVolumeRequest::default())
            .await
            .unwrap_err();

        assert_matches!(err, Error::InvalidInput(_));
        assert_eq!(backend.mutation_calls(), 0);
        assert_eq!(backend.get_backup_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_with_size() {
        let backend = Arc::new(ScriptedBackend::default());
        let coordinator = VolumeCoordinator::new(backend.clone());

        let record = coordinator
            .create_volume(
                &tenant(),
                CreateVolumeRequest {
                    size_gib: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(record.volume_id, "vol-1");
        assert_eq!(record.status, "creating");
        assert_eq!(record.size, Some(10));
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_from_snapshot() {
        let backend = Arc::new(ScriptedBackend::default().with_backup("backup-1", 8));
        let coordinator = VolumeCoordinator::new(backend.clone());

        let record = coordinator
            .create_volume(
                &tenant(),
                CreateVolumeRequest {
                    snapshot_id: Some("backup-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(record.snapshot_id.as_deref(), Some("backup-1"));
        assert_eq!(backend.restore_calls.load(Ordering::SeqCst), 1);
        // Snapshot-only path never looks the backup up first.
        assert_eq!(backend.get_backup_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_size_smaller_than_snapshot() {
        let backend = Arc::new(ScriptedBackend::default().with_backup("backup-1", 8));
        let coordinator = VolumeCoordinator::new(backend.clone());

        let err = coordinator
            .create_volume(
                &tenant(),
                CreateVolumeRequest {
                    size_gib: Some(5),
                    snapshot_id: Some("backup-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::InvalidInput(_));
        // The backup lookup is read-only; no mutation ever happened.
        assert_eq!(backend.get_backup_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_with_size_and_snapshot_restores() {
        let backend = Arc::new(ScriptedBackend::default().with_backup("backup-1", 8));
        let coordinator = VolumeCoordinator::new(backend.clone());

        let record = coordinator
            .create_volume(
                &tenant(),
                CreateVolumeRequest {
                    size_gib: Some(10),
                    snapshot_id: Some("backup-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Restored at the snapshot's size; the larger request is logged,
        // not honored, until the port grows an extend operation.
        assert_eq!(record.size, Some(8));
        assert_eq!(backend.get_backup_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.restore_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_with_unknown_snapshot() {
        let backend = Arc::new(ScriptedBackend::default());
        let coordinator = VolumeCoordinator::new(backend.clone());

        let err = coordinator
            .create_volume(
                &tenant(),
                CreateVolumeRequest {
                    size_gib: Some(10),
                    snapshot_id: Some("backup-missing".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::InvalidInput(_));
        assert_eq!(backend.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_after_create_runs_compensating_delete_once() {
        let backend = Arc::new(ScriptedBackend::default().with_malformed_created_at());
        let coordinator = VolumeCoordinator::new(backend.clone());

        let err = coordinator
            .create_volume(
                &tenant(),
                CreateVolumeRequest {
                    size_gib: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::MalformedResponse(_));
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.delete_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*backend.deleted.lock().unwrap(), vec!["vol-1".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_after_restore_runs_compensating_delete_once() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with_backup("backup-1", 8)
                .with_malformed_created_at(),
        );
        let coordinator = VolumeCoordinator::new(backend.clone());

        let err = coordinator
            .create_volume(
                &tenant(),
                CreateVolumeRequest {
                    snapshot_id: Some("backup-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::MalformedResponse(_));
        assert_eq!(backend.restore_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_unauthorized_context() {
        let backend = Arc::new(ScriptedBackend::default());
        let coordinator = VolumeCoordinator::new(backend.clone());

        let anonymous = RequestContext::builder(None, None).build();
        let err = coordinator
            .create_volume(
                &anonymous,
                CreateVolumeRequest {
                    size_gib: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::AuthFailure);
        assert_eq!(backend.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_maps_backend_conditions() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = VolumeCoordinator::new(backend.clone());
        let ctx = tenant();

        let err = coordinator
            .delete_volume(&ctx, "vol-missing")
            .await
            .unwrap_err();
        assert_matches!(err, Error::InvalidInput(_));

        let volume = backend.create_volume(1, None, None).await.unwrap();
        backend.attach(&volume.id, "/dev/vdb", "i-1").await.unwrap();
        let err = coordinator.delete_volume(&ctx, &volume.id).await.unwrap_err();
        assert_matches!(err, Error::UnsupportedOperation);
    }

    #[tokio::test]
    async fn test_delete_returns_success_flag() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = VolumeCoordinator::new(backend.clone());

        let volume = backend.create_volume(1, None, None).await.unwrap();
        assert!(coordinator
            .delete_volume(&tenant(), &volume.id)
            .await
            .unwrap());
        assert_eq!(backend.volume_count().await, 0);
    }

    #[tokio::test]
    async fn test_describe_by_id_is_always_detail() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = VolumeCoordinator::new(backend.clone());

        let volume = backend
            .create_volume(10, Some("data"), None)
            .await
            .unwrap();

        let response = coordinator
            .describe_volumes(
                &tenant(),
                DescribeVolumesQuery {
                    volume_id: Some(volume.id.clone()),
                    detail: false,
                    max_results: Some(1),
                    next_token: Some("ignored".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.volume_set.len(), 1);
        assert!(response.next_token.is_none());
        // Detail fields are present despite detail=false.
        assert_eq!(response.volume_set[0].size, Some(10));
        assert!(response.volume_set[0].create_time.is_some());
    }

    #[tokio::test]
    async fn test_describe_by_unknown_id_propagates_backend_error() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = VolumeCoordinator::new(backend);

        let err = coordinator
            .describe_volumes(
                &tenant(),
                DescribeVolumesQuery {
                    volume_id: Some("vol-missing".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::Backend(BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_describe_list_honors_detail_flag_and_pagination() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = VolumeCoordinator::new(backend.clone());
        let ctx = tenant();

        for _ in 0..3 {
            backend.create_volume(1, Some("v"), None).await.unwrap();
        }

        let summary = coordinator
            .describe_volumes(
                &ctx,
                DescribeVolumesQuery {
                    detail: false,
                    max_results: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(summary.volume_set.len(), 2);
        assert!(summary.volume_set.iter().all(|r| r.size.is_none()));
        let token = summary.next_token.expect("next token");

        let rest = coordinator
            .describe_volumes(
                &ctx,
                DescribeVolumesQuery {
                    detail: true,
                    max_results: Some(2),
                    next_token: Some(token),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(rest.volume_set.len(), 1);
        assert!(rest.volume_set.iter().all(|r| r.size.is_some()));
        assert!(rest.next_token.is_none());
    }

    #[tokio::test]
    async fn test_describe_response_shape() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = VolumeCoordinator::new(backend.clone());

        backend.create_volume(1, Some("v"), None).await.unwrap();

        let response = coordinator
            .describe_volumes(&tenant(), DescribeVolumesQuery::default())
            .await
            .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("volumeSet"));
        assert!(!object.contains_key("nextToken"));
        let records = object["volumeSet"].as_array().unwrap();
        assert!(records[0].as_object().unwrap().contains_key("volumeId"));
    }
}
