//! Volume record formatting
//!
//! Translates backend volume projections into the foreign API's record
//! shapes, including the normalization of the backend's wide status
//! vocabulary into the foreign four-state model.

use crate::backend::BackendVolume;
use crate::config::UnknownStatusPolicy;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Status Normalization
// =============================================================================

/// Normalize a backend status into the foreign vocabulary.
///
/// Pure, fixed mapping; returns `None` for statuses not in the table.
pub fn normalize_status(raw: &str) -> Option<&'static str> {
    match raw {
        "creating" => Some("creating"),
        "available" => Some("available"),
        "attaching" => Some("available"),
        "in-use" => Some("in-use"),
        "deleting" => Some("deleting"),
        "error" => Some("creating"),
        "error_deleting" => Some("deleting"),
        "backing-up-available" => Some("available"),
        "backing-up-in-use" => Some("in-use"),
        "restoring-backup" => Some("creating"),
        "error_restoring" => Some("creating"),
        "error_extending" => Some("creating"),
        _ => None,
    }
}

/// Normalize a backend status, applying `policy` to unmapped values
pub fn apply_status_policy(raw: &str, policy: UnknownStatusPolicy) -> String {
    match normalize_status(raw) {
        Some(status) => status.to_string(),
        None => match policy {
            UnknownStatusPolicy::PassThrough => raw.to_string(),
            UnknownStatusPolicy::DefaultCreating => "creating".to_string(),
        },
    }
}

// =============================================================================
// Foreign Record Shapes
// =============================================================================

/// A volume attachment in the foreign shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    pub device: Option<String>,
    pub instance_id: Option<String>,
}

/// A volume in the foreign shape.
///
/// Summary projections carry only `volumeId`, `status` and `name`; detail
/// projections add the remaining fields, with `attachmentSet` populated
/// exactly when the normalized status is `in-use`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub volume_id: String,
    pub status: String,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_set: Option<Vec<AttachmentRecord>>,
}

/// Projection selector for describe responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeView {
    Summary,
    Detail,
}

// =============================================================================
// Formatting
// =============================================================================

/// Format a backend volume in the requested projection.
///
/// Detail formatting parses the backend's creation timestamp and fails with
/// [`Error::MalformedResponse`] when it is not valid RFC 3339.
pub fn format_volume(
    volume: &BackendVolume,
    view: VolumeView,
    policy: UnknownStatusPolicy,
) -> Result<VolumeRecord> {
    let status = apply_status_policy(&volume.status, policy);

    match view {
        VolumeView::Summary => Ok(VolumeRecord {
            volume_id: volume.id.clone(),
            status,
            name: volume.name.clone(),
            description: None,
            snapshot_id: None,
            size: None,
            create_time: None,
            attachment_set: None,
        }),
        VolumeView::Detail => {
            let create_time = DateTime::parse_from_rfc3339(&volume.created_at)
                .map_err(|e| {
                    Error::MalformedResponse(format!(
                        "invalid creation time '{}' for volume {}: {}",
                        volume.created_at, volume.id, e
                    ))
                })?
                .with_timezone(&Utc);

            let attachment_set = if status == "in-use" {
                vec![format_attachment(volume)]
            } else {
                Vec::new()
            };

            Ok(VolumeRecord {
                volume_id: volume.id.clone(),
                status,
                name: volume.name.clone(),
                description: volume.description.clone(),
                snapshot_id: volume.snapshot_id.clone(),
                size: Some(volume.size_gib),
                create_time: Some(create_time),
                attachment_set: Some(attachment_set),
            })
        }
    }
}

/// Format the volume's attachment info from its first attachment.
///
/// A missing attachment yields empty device/instance fields.
fn format_attachment(volume: &BackendVolume) -> AttachmentRecord {
    let attachment = volume.attachments.first();
    AttachmentRecord {
        device: attachment.and_then(|a| a.device.clone()),
        instance_id: attachment.and_then(|a| a.server_id.clone()),
    }
}
