//! Identity service port
//!
//! The identity service mints the administrative session used for privilege
//! escalation. The concrete client is an external collaborator; the gateway
//! only depends on this port.

use crate::config::AdminCredentials;
use crate::context::ServiceEndpoint;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// Identity Session
// =============================================================================

/// Session minted by the identity service for the administrative identity
#[derive(Debug, Clone)]
pub struct IdentitySession {
    /// Authentication token
    pub token: String,
    /// User id the token was issued for
    pub user_id: String,
    /// Tenant/project id the token was issued for
    pub project_id: String,
    /// Service catalog returned alongside the token
    pub service_catalog: Vec<ServiceEndpoint>,
}

// =============================================================================
// Identity Service Port
// =============================================================================

/// Port for identity-service operations
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Authenticate the administrative identity and mint a session
    async fn authenticate(&self, credentials: &AdminCredentials) -> Result<IdentitySession>;
}

/// Shared reference to an identity-service adapter
pub type IdentityServiceRef = Arc<dyn IdentityService>;

// =============================================================================
// Static Adapter
// =============================================================================

/// Identity adapter returning a fixed session. Used in tests and for
/// embedding the gateway against a pre-provisioned token.
pub struct StaticIdentityService {
    session: IdentitySession,
}

impl StaticIdentityService {
    /// Create an adapter that always returns `session`
    pub fn new(session: IdentitySession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl IdentityService for StaticIdentityService {
    async fn authenticate(&self, credentials: &AdminCredentials) -> Result<IdentitySession> {
        if credentials.username.is_empty() {
            return Err(Error::Identity("admin user not configured".to_string()));
        }
        Ok(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn session() -> IdentitySession {
        IdentitySession {
            token: "admin-token".into(),
            user_id: "admin-user".into(),
            project_id: "admin-project".into(),
            service_catalog: vec![],
        }
    }

    #[tokio::test]
    async fn test_static_adapter_returns_session() {
        let identity = StaticIdentityService::new(session());
        let minted = identity
            .authenticate(&AdminCredentials::default())
            .await
            .unwrap();
        assert_eq!(minted.token, "admin-token");
    }

    #[tokio::test]
    async fn test_static_adapter_requires_username() {
        let identity = StaticIdentityService::new(session());
        let credentials = AdminCredentials {
            username: String::new(),
            ..AdminCredentials::default()
        };
        let err = identity.authenticate(&credentials).await.unwrap_err();
        assert_matches!(err, Error::Identity(_));
    }
}
