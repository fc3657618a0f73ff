//! Backend-admin context cache
//!
//! Escalation mints a context carrying the dedicated administrative identity
//! so the gateway can perform backend operations a tenant cannot. The minted
//! context is cached here and reused across calls to amortize identity
//! round trips. The cache is an owned value the embedder injects wherever
//! escalation is needed; there is no ambient global. Two tasks racing on an
//! empty cache may both authenticate; the loser's session simply replaces
//! the winner's, which is harmless.

use crate::config::AdminCredentials;
use crate::context::RequestContext;
use crate::error::Result;
use crate::identity::IdentityService;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Cache for the privilege-escalated administrative context
#[derive(Default)]
pub struct AdminContextCache {
    cached: RwLock<Option<Arc<RequestContext>>>,
}

impl AdminContextCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a backend-admin context, minting one if necessary.
    ///
    /// A cached context is reused while it is still flagged backend-admin.
    /// Otherwise the identity service is contacted with the statically
    /// configured credentials and a fresh, independent context is built from
    /// the minted session. Tenant tokens never enter this path.
    pub async fn escalate(
        &self,
        identity: &dyn IdentityService,
        credentials: &AdminCredentials,
    ) -> Result<Arc<RequestContext>> {
        if let Some(context) = self.cached.read().await.as_ref() {
            if context.is_backend_admin {
                debug!("Reusing cached backend-admin context");
                return Ok(context.clone());
            }
        }

        info!("Minting backend-admin context for {}", credentials.username);
        let session = identity.authenticate(credentials).await?;

        let context = Arc::new(
            RequestContext::builder(Some(session.user_id), Some(session.project_id))
                .auth_token(session.token)
                .service_catalog(session.service_catalog)
                .backend_admin(true)
                .build(),
        );

        *self.cached.write().await = Some(context.clone());
        Ok(context)
    }

    /// Drop the cached context; the next escalation re-authenticates
    pub async fn invalidate(&self) {
        debug!("Invalidating cached backend-admin context");
        *self.cached.write().await = None;
    }
}
