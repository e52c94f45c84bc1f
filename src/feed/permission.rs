//! Fixed permission gate
//!
//! The CLI has no interactive permission dialog; whether location access is
//! granted comes from configuration.

use crate::feed::PermissionGate;
use std::collections::HashSet;

/// Permission gate answering from a fixed set of granted permissions
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionGate {
    granted: HashSet<String>,
    all: bool,
}

impl StaticPermissionGate {
    /// Grant every permission
    pub fn allow_all() -> Self {
        Self {
            granted: HashSet::new(),
            all: true,
        }
    }

    /// Grant nothing
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Grant exactly the given permissions
    pub fn granting<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: permissions.into_iter().map(Into::into).collect(),
            all: false,
        }
    }
}

impl PermissionGate for StaticPermissionGate {
    fn is_granted(&self, permission: &str) -> bool {
        self.all || self.granted.contains(permission)
    }
}
