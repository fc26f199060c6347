//! Tenant identity and schema naming.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::ident::{Identifier, MAX_IDENTIFIER_LEN};

/// A unique identifier for a tenant, as supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Create a new tenant ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<uuid::Uuid> for TenantId {
    fn from(u: uuid::Uuid) -> Self {
        Self::new(u.to_string())
    }
}

/// A resolved tenant: who it is, where its data lives, and whether it may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    /// The tenant identifier.
    pub id: TenantId,
    /// The tenant's dedicated schema.
    pub schema: Identifier,
    /// Whether the tenant is allowed to access its data.
    pub active: bool,
}

impl Tenant {
    /// Create an active tenant.
    pub fn new(id: impl Into<TenantId>, schema: Identifier) -> Self {
        Self {
            id: id.into(),
            schema,
            active: true,
        }
    }

    /// Mark the tenant as inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Derives a tenant's schema name from its id.
///
/// The mapping is injective: lowercase ASCII letters and digits pass through,
/// every other byte (including `_`) becomes `_xx` in lowercase hex. Two
/// distinct tenant ids therefore never share a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNaming {
    prefix: String,
}

impl Default for SchemaNaming {
    fn default() -> Self {
        Self {
            prefix: "tenant_".to_string(),
        }
    }
}

impl SchemaNaming {
    /// Create a naming scheme with the given prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> DataResult<Self> {
        let prefix = prefix.into();
        // The prefix must itself be a valid identifier start.
        Identifier::new(format!("{}x", prefix))
            .map_err(|_| DataError::config(format!("invalid schema prefix '{}'", prefix)))?;
        Ok(Self { prefix })
    }

    /// Get the prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Compute the schema for a tenant.
    pub fn schema_for(&self, tenant_id: &TenantId) -> DataResult<Identifier> {
        if tenant_id.as_str().is_empty() {
            return Err(DataError::invalid_identifier("", "tenant id must not be empty"));
        }

        let mut name = self.prefix.clone();
        for byte in tenant_id.as_str().bytes() {
            if byte.is_ascii_lowercase() || byte.is_ascii_digit() {
                name.push(byte as char);
            } else {
                name.push_str(&format!("_{:02x}", byte));
            }
        }

        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(DataError::invalid_identifier(
                tenant_id.as_str(),
                format!("derived schema name exceeds {} bytes", MAX_IDENTIFIER_LEN),
            ));
        }
        Identifier::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_creation() {
        let id1 = TenantId::new("tenant-123");
        assert_eq!(id1.as_str(), "tenant-123");

        let id2: TenantId = "acme".into();
        assert_eq!(id2.to_string(), "acme");
    }

    #[test]
    fn test_schema_naming_simple() {
        let naming = SchemaNaming::default();
        let schema = naming.schema_for(&TenantId::new("acme")).unwrap();
        assert_eq!(schema.as_str(), "tenant_acme");
    }

    #[test]
    fn test_schema_naming_is_injective() {
        let naming = SchemaNaming::default();
        let a = naming.schema_for(&TenantId::new("a-b")).unwrap();
        let b = naming.schema_for(&TenantId::new("a_b")).unwrap();
        let c = naming.schema_for(&TenantId::new("A-b")).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "tenant_a_2db");
        assert_eq!(b.as_str(), "tenant_a_5fb");
    }

    #[test]
    fn test_schema_naming_uuid_fits() {
        let naming = SchemaNaming::default();
        let id = TenantId::new("123e4567-e89b-12d3-a456-426614174000");
        let schema = naming.schema_for(&id).unwrap();
        assert!(schema.as_str().len() <= MAX_IDENTIFIER_LEN);
    }

    #[test]
    fn test_schema_naming_rejects_hostile_ids() {
        let naming = SchemaNaming::default();
        let schema = naming.schema_for(&TenantId::new("x\"; DROP SCHEMA public")).unwrap();
        assert!(!schema.as_str().contains('"'));
        assert!(!schema.as_str().contains(' '));
        assert!(naming.schema_for(&TenantId::new("")).is_err());
        assert!(naming.schema_for(&TenantId::new("z".repeat(80))).is_err());
    }

    #[test]
    fn test_custom_prefix() {
        assert!(SchemaNaming::with_prefix("org_").is_ok());
        assert!(SchemaNaming::with_prefix("Org-").is_err());
    }
}
