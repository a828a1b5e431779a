//! First-run seeding configuration.

use serde::{Deserialize, Serialize};

/// Tenant and superadmin created on startup when missing.
#[derive(Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Display name of the bootstrap tenant.
    pub tenant_name: String,
    /// Email of the initial superadmin.
    pub superadmin_email: String,
    /// Plaintext password of the initial superadmin. Hashed before storage.
    pub superadmin_password: String,
    /// Display name of the initial superadmin.
    #[serde(default = "default_name")]
    pub superadmin_name: String,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("tenant_name", &self.tenant_name)
            .field("superadmin_email", &self.superadmin_email)
            .field("superadmin_name", &self.superadmin_name)
            .finish_non_exhaustive()
    }
}

fn default_name() -> String {
    "Administrator".to_string()
}
