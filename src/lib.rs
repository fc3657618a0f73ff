//! Volume Gateway - Cloud-Volume API Compatibility Layer
//!
//! Exposes a cloud-volume API vocabulary (create/delete/describe volume,
//! EC2-style record shapes) on top of an unrelated block-storage backend.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Volume Gateway                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────┐   ┌────────────────────────────────┐  │
//! │  │  RequestContext   │   │       VolumeCoordinator        │  │
//! │  │  (authz gates,    │   │  create / delete / describe    │  │
//! │  │   escalation)     │   │  + CompensationScope           │  │
//! │  └─────────┬─────────┘   └───────────────┬────────────────┘  │
//! ├────────────┼─────────────────────────────┼───────────────────┤
//! │            │         Ports               │                   │
//! │  ┌─────────┴─────────┐   ┌───────────────┴────────────────┐  │
//! │  │  IdentityService  │   │      BlockStorageBackend       │  │
//! │  └───────────────────┘   └────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The HTTP transport, the concrete backend client and the concrete identity
//! client sit outside the crate and plug into the ports.
//!
//! # Modules
//!
//! - [`volume`]: coordinator for volume operations and crash-safe provisioning
//! - [`context`]: request contexts, authorization gates, privilege escalation
//! - [`backend`]: block-storage backend port and in-memory adapter
//! - [`identity`]: identity-service port
//! - [`config`]: static gateway configuration
//! - [`error`]: error types and handling

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod volume;

// Re-export commonly used types
pub use backend::{
    BackendAttachment, BackendBackup, BackendRef, BackendVolume, BlockStorageBackend,
    MemoryBackend, VolumePage,
};
pub use config::{AdminCredentials, GatewayConfig, UnknownStatusPolicy};
pub use context::{AdminContextCache, ContextBuilder, RequestContext, ServiceEndpoint};
pub use error::{BackendError, BackendResult, Error, Result};
pub use identity::{IdentityService, IdentityServiceRef, IdentitySession, StaticIdentityService};
pub use volume::{
    AttachmentRecord, CompensationScope, CreateVolumeRequest, DescribeVolumesQuery,
    DescribeVolumesResponse, VolumeCoordinator, VolumeRecord, VolumeView,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
