//! Gateway configuration
//!
//! Static configuration for the gateway: the administrative credentials used
//! for privilege escalation against the identity service, and the policy for
//! backend status values the normalization table does not recognize.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// =============================================================================
// Administrative Credentials
// =============================================================================

/// Credentials for the dedicated administrative identity.
///
/// These are never derived from a tenant request; they come from static
/// configuration and are only presented to the identity service.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    /// Admin user name
    pub username: String,
    /// Admin password (should use secrets in production)
    pub password: String,
    /// Admin tenant name
    pub tenant_name: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: String::new(),
            tenant_name: "admin".to_string(),
        }
    }
}

// =============================================================================
// Unknown Status Policy
// =============================================================================

/// Policy for backend status strings absent from the normalization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownStatusPolicy {
    /// Pass the backend status through unchanged. Callers may observe a
    /// status outside the foreign four-state vocabulary.
    PassThrough,
    /// Degrade unknown statuses to "creating".
    DefaultCreating,
}

impl Default for UnknownStatusPolicy {
    fn default() -> Self {
        UnknownStatusPolicy::PassThrough
    }
}

// =============================================================================
// Gateway Configuration
// =============================================================================

/// Configuration for the volume gateway
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Administrative credentials for escalation
    pub admin: AdminCredentials,
    /// Handling of unrecognized backend statuses
    pub unknown_status_policy: UnknownStatusPolicy,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized variables: `VOLUME_GATEWAY_ADMIN_USER`,
    /// `VOLUME_GATEWAY_ADMIN_PASSWORD`, `VOLUME_GATEWAY_ADMIN_TENANT`,
    /// `VOLUME_GATEWAY_UNKNOWN_STATUS` (`pass-through` or
    /// `default-creating`). Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(user) = std::env::var("VOLUME_GATEWAY_ADMIN_USER") {
            config.admin.username = user;
        }
        if let Ok(password) = std::env::var("VOLUME_GATEWAY_ADMIN_PASSWORD") {
            config.admin.password = password;
        }
        if let Ok(tenant) = std::env::var("VOLUME_GATEWAY_ADMIN_TENANT") {
            config.admin.tenant_name = tenant;
        }
        if let Ok(policy) = std::env::var("VOLUME_GATEWAY_UNKNOWN_STATUS") {
            config.unknown_status_policy = match policy.as_str() {
                "pass-through" => UnknownStatusPolicy::PassThrough,
                "default-creating" => UnknownStatusPolicy::DefaultCreating,
                other => {
                    return Err(Error::Configuration(format!(
                        "Invalid unknown-status policy: {}",
                        other
                    )))
                }
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.admin.tenant_name, "admin");
        assert_eq!(
            config.unknown_status_policy,
            UnknownStatusPolicy::PassThrough
        );
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&UnknownStatusPolicy::DefaultCreating).unwrap();
        assert_eq!(json, "\"default-creating\"");
        let parsed: UnknownStatusPolicy = serde_json::from_str("\"pass-through\"").unwrap();
        assert_eq!(parsed, UnknownStatusPolicy::PassThrough);
    }
}
