//! Context envelope
//!
//! Flat-map serialization of [`RequestContext`] for crossing process or
//! transport boundaries. The envelope carries an explicit schema version and
//! goes through an explicit migration step on the way in: legacy field names
//! from older peers (`user`, `tenant`) are rewritten to their current names,
//! and any key the schema does not know is dropped with a warning instead of
//! rejecting the whole envelope.

use crate::context::{RequestContext, ServiceEndpoint};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Current envelope schema version
pub const ENVELOPE_VERSION: u64 = 1;

// =============================================================================
// Serialization
// =============================================================================

impl RequestContext {
    /// Serialize to a flat mapping of all identity and privilege fields.
    ///
    /// Absent fields are carried as explicit nulls so peers see the full
    /// schema regardless of which fields this context happens to hold.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert("version".to_string(), Value::from(ENVELOPE_VERSION));
        map.insert("user_id".to_string(), opt_str(&self.user_id));
        map.insert("project_id".to_string(), opt_str(&self.project_id));
        map.insert("user_name".to_string(), opt_str(&self.user_name));
        map.insert("project_name".to_string(), opt_str(&self.project_name));
        map.insert("auth_token".to_string(), opt_str(&self.auth_token));
        map.insert("is_admin".to_string(), Value::from(self.is_admin));
        map.insert(
            "is_backend_admin".to_string(),
            Value::from(self.is_backend_admin),
        );
        map.insert(
            "service_catalog".to_string(),
            serde_json::to_value(&self.service_catalog).unwrap_or(Value::Null),
        );
        map.insert(
            "request_id".to_string(),
            Value::from(self.request_id.clone()),
        );
        map.insert(
            "remote_address".to_string(),
            opt_str(&self.remote_address),
        );
        map.insert(
            "timestamp".to_string(),
            Value::from(self.timestamp.to_rfc3339()),
        );
        map.insert("api_version".to_string(), opt_str(&self.api_version));
        map
    }

    /// Reconstruct an equivalent context from a flat mapping.
    ///
    /// Applies the legacy migration first, then consumes every known key.
    /// Remaining keys are dropped with a warning naming them.
    pub fn from_map(map: BTreeMap<String, Value>) -> Result<RequestContext> {
        let mut map = migrate_legacy_fields(map);

        // The version marker is informative for now; there is only one
        // schema and older peers omit it entirely.
        if let Some(version) = map.remove("version").and_then(|v| v.as_u64()) {
            if version > ENVELOPE_VERSION {
                debug!("Context envelope from newer schema version {}", version);
            }
        }

        let user_id = take_str(&mut map, "user_id");
        let project_id = take_str(&mut map, "project_id");
        let user_name = take_str(&mut map, "user_name");
        let project_name = take_str(&mut map, "project_name");
        let auth_token = take_str(&mut map, "auth_token");
        let is_admin = take_bool(&mut map, "is_admin");
        let is_backend_admin = take_bool(&mut map, "is_backend_admin");
        let request_id = take_str(&mut map, "request_id");
        let remote_address = take_str(&mut map, "remote_address");
        let api_version = take_str(&mut map, "api_version");

        let service_catalog: Vec<ServiceEndpoint> = match map.remove("service_catalog") {
            Some(Value::Null) | None => Vec::new(),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::InvalidInput(format!("Malformed service catalog: {}", e)))?,
        };

        let timestamp = match map.remove("timestamp") {
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| Error::InvalidInput(format!("Malformed context timestamp: {}", e)))?
                .with_timezone(&Utc),
            _ => Utc::now(),
        };

        if !map.is_empty() {
            let dropped: Vec<&str> = map.keys().map(String::as_str).collect();
            warn!("Fields dropped when reconstructing context: {:?}", dropped);
        }

        let mut builder = RequestContext::builder(user_id, project_id)
            .admin(is_admin)
            .backend_admin(is_backend_admin)
            .service_catalog(service_catalog);
        if let Some(name) = user_name {
            builder = builder.user_name(name);
        }
        if let Some(name) = project_name {
            builder = builder.project_name(name);
        }
        if let Some(token) = auth_token {
            builder = builder.auth_token(token);
        }
        if let Some(id) = request_id {
            builder = builder.request_id(id);
        }
        if let Some(address) = remote_address {
            builder = builder.remote_address(address);
        }
        if let Some(version) = api_version {
            builder = builder.api_version(version);
        }

        let mut context = builder.build();
        context.timestamp = timestamp;
        Ok(context)
    }
}

// =============================================================================
// Migration
// =============================================================================

/// Rewrite field names used by older peers to the current schema.
///
/// `user` and `tenant` become `user_id` and `project_id` unless the current
/// names are already populated. `user_identity` is a derived field some
/// serializers emit; it is discarded without a warning.
fn migrate_legacy_fields(mut map: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    if let Some(user) = map.remove("user") {
        if !has_value(&map, "user_id") && !user.is_null() {
            debug!("Migrating legacy context field 'user' to 'user_id'");
            map.insert("user_id".to_string(), user);
        }
    }
    if let Some(tenant) = map.remove("tenant") {
        if !has_value(&map, "project_id") && !tenant.is_null() {
            debug!("Migrating legacy context field 'tenant' to 'project_id'");
            map.insert("project_id".to_string(), tenant);
        }
    }
    map.remove("user_identity");
    map
}

fn has_value(map: &BTreeMap<String, Value>, key: &str) -> bool {
    matches!(map.get(key), Some(value) if !value.is_null())
}

fn opt_str(value: &Option<String>) -> Value {
    value.as_deref().map(Value::from).unwrap_or(Value::Null)
}

fn take_str(map: &mut BTreeMap<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn take_bool(map: &mut BTreeMap<String, Value>, key: &str) -> bool {
    matches!(map.remove(key), Some(Value::Bool(true)))
}
