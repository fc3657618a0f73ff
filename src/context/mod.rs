//! Request contexts and authorization gates
//!
//! A [`RequestContext`] carries the identity, scope and privilege level of
//! one inbound call. Contexts are immutable once built; privilege escalation
//! (see [`admin`]) always produces an independent context rather than
//! mutating a tenant one.

pub mod admin;
pub mod envelope;

pub use admin::AdminContextCache;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Service Catalog
// =============================================================================

/// One entry of the service catalog carried by a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Service type (e.g. "volume", "identity")
    pub service_type: String,
    /// Endpoint URL
    pub url: String,
    /// Region the endpoint serves, if scoped
    pub region: Option<String>,
}

// =============================================================================
// Request Context
// =============================================================================

/// Security context and request information for one inbound call
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Caller's user id
    pub user_id: Option<String>,
    /// Caller's tenant/project id
    pub project_id: Option<String>,
    /// Human-readable user name
    pub user_name: Option<String>,
    /// Human-readable project name
    pub project_name: Option<String>,
    /// Authentication token presented by the caller (or minted by the
    /// identity service for backend-admin contexts)
    pub auth_token: Option<String>,
    /// Whether the caller is an administrator of the foreign API
    pub is_admin: bool,
    /// Whether this context carries the dedicated backend-admin identity.
    /// Never true for a tenant-supplied token.
    pub is_backend_admin: bool,
    /// Service catalog for the token
    pub service_catalog: Vec<ServiceEndpoint>,
    /// Request id (`req-<uuid>`), generated unless supplied
    pub request_id: String,
    /// Address the request arrived from
    pub remote_address: Option<String>,
    /// Captured at construction
    pub timestamp: DateTime<Utc>,
    /// Foreign API version marker
    pub api_version: Option<String>,
}

/// Generate a request id in the `req-<uuid>` form
pub fn generate_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

impl RequestContext {
    /// Start building a context for the given identity
    pub fn builder(
        user_id: impl Into<Option<String>>,
        project_id: impl Into<Option<String>>,
    ) -> ContextBuilder {
        ContextBuilder {
            user_id: user_id.into(),
            project_id: project_id.into(),
            user_name: None,
            project_name: None,
            auth_token: None,
            is_admin: false,
            is_backend_admin: false,
            service_catalog: Vec::new(),
            request_id: None,
            remote_address: None,
            api_version: None,
        }
    }

    /// True iff this is an ordinary tenant context: not flagged admin, with
    /// both user and project ids present.
    pub fn is_user_context(&self) -> bool {
        if self.is_admin {
            return false;
        }
        self.user_id.is_some() && self.project_id.is_some()
    }

    /// Authorization gate for tenant-facing operations.
    ///
    /// Accepts admin contexts and tenant contexts; everything else fails
    /// with [`Error::AuthFailure`].
    pub fn require(&self) -> Result<()> {
        if !self.is_admin && !self.is_user_context() {
            return Err(Error::AuthFailure);
        }
        Ok(())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`RequestContext`]
#[derive(Debug)]
pub struct ContextBuilder {
    user_id: Option<String>,
    project_id: Option<String>,
    user_name: Option<String>,
    project_name: Option<String>,
    auth_token: Option<String>,
    is_admin: bool,
    is_backend_admin: bool,
    service_catalog: Vec<ServiceEndpoint>,
    request_id: Option<String>,
    remote_address: Option<String>,
    api_version: Option<String>,
}

impl ContextBuilder {
    pub fn user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn backend_admin(mut self, is_backend_admin: bool) -> Self {
        self.is_backend_admin = is_backend_admin;
        self
    }

    pub fn service_catalog(mut self, catalog: Vec<ServiceEndpoint>) -> Self {
        self.service_catalog = catalog;
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Finish the context, capturing the construction timestamp
    pub fn build(self) -> RequestContext {
        RequestContext {
            user_id: self.user_id,
            project_id: self.project_id,
            user_name: self.user_name,
            project_name: self.project_name,
            auth_token: self.auth_token,
            is_admin: self.is_admin,
            is_backend_admin: self.is_backend_admin,
            service_catalog: self.service_catalog,
            request_id: self.request_id.unwrap_or_else(generate_request_id),
            remote_address: self.remote_address,
            timestamp: Utc::now(),
            api_version: self.api_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn tenant() -> RequestContext {
        RequestContext::builder(Some("user-1".to_string()), Some("project-1".to_string()))
            .auth_token("tenant-token")
            .build()
    }

    #[test]
    fn test_generated_request_id() {
        let ctx = tenant();
        assert!(ctx.request_id.starts_with("req-"));
        let other = tenant();
        assert_ne!(ctx.request_id, other.request_id);
    }

    #[test]
    fn test_is_user_context() {
        assert!(tenant().is_user_context());

        let admin = RequestContext::builder(Some("user-1".to_string()), None)
            .admin(true)
            .build();
        assert!(!admin.is_user_context());

        let anonymous = RequestContext::builder(None, None).build();
        assert!(!anonymous.is_user_context());

        let missing_project = RequestContext::builder(Some("user-1".to_string()), None).build();
        assert!(!missing_project.is_user_context());
    }

    #[test]
    fn test_require_accepts_admin_without_ids() {
        let admin = RequestContext::builder(None, None).admin(true).build();
        admin.require().unwrap();
    }

    #[test]
    fn test_require_accepts_tenant() {
        tenant().require().unwrap();
    }

    #[test]
    fn test_require_rejects_incomplete_context() {
        let ctx = RequestContext::builder(Some("user-1".to_string()), None).build();
        assert_matches!(ctx.require(), Err(Error::AuthFailure));

        let ctx = RequestContext::builder(None, None).build();
        assert_matches!(ctx.require(), Err(Error::AuthFailure));
    }
}
