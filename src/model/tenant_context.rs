use serde::{Deserialize, Serialize};

use crate::model::Id;

/// Tenant and acting user extracted from request headers.
/// Every store operation is scoped to `tenant_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Id,
    pub user_id: Option<String>,
}

impl TenantContext {
    /// Create a TenantContext with no acting user
    pub fn new(tenant_id: impl Into<Id>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: None,
        }
    }

    /// Create a TenantContext with the acting user attached
    pub fn with_user(tenant_id: impl Into<Id>, user_id: Option<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id,
        }
    }

    /// Name recorded in logs for the acting user
    pub fn actor(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }
}
