//! Role catalog: the closed set of provider roles and what each may read.
//!
//! The role-to-permission mapping is an exhaustive `match`, so adding a
//! role variant does not compile until its permissions are decided.
//! Parsing fails closed: an unrecognised identifier is an error, never a
//! default permission set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{AccessError, AccessResult};

/// A healthcare provider role that can be granted temporary access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Pharmacist,
    Diagnostics,
    Specialist,
}

/// A single record-access permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    ReadAll,
    ReadPrescriptions,
    ReadRelevant,
    ReadOnly,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadAll => "read-all",
            Permission::ReadPrescriptions => "read-prescriptions",
            Permission::ReadRelevant => "read-relevant",
            Permission::ReadOnly => "read-only",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of permissions granted to a role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Doctor,
        Role::Pharmacist,
        Role::Diagnostics,
        Role::Specialist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
            Role::Diagnostics => "diagnostics",
            Role::Specialist => "specialist",
        }
    }

    /// Human-facing label shown when selecting a provider type.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Doctor => "Doctor (Full Access)",
            Role::Pharmacist => "Pharmacist (Prescriptions Only)",
            Role::Diagnostics => "Diagnostics (Read-Only)",
            Role::Specialist => "Specialist (Relevant Records)",
        }
    }

    pub fn permissions(&self) -> PermissionSet {
        let granted: &[Permission] = match self {
            Role::Doctor => &[Permission::ReadAll],
            Role::Pharmacist => &[Permission::ReadPrescriptions],
            Role::Diagnostics => &[Permission::ReadOnly],
            Role::Specialist => &[Permission::ReadRelevant],
        };
        granted.iter().copied().collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    /// Exact, lowercase match only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AccessError::UnknownRole(s.to_string()))
    }
}

/// Look up the permissions for a role identifier.
pub fn permissions_for(role_id: &str) -> AccessResult<PermissionSet> {
    Ok(role_id.parse::<Role>()?.permissions())
}

/// Look up the display label for a role identifier.
pub fn label_for(role_id: &str) -> AccessResult<&'static str> {
    Ok(role_id.parse::<Role>()?.label())
}

/// Every role in the catalog, in declaration order.
pub fn all_roles() -> &'static [Role] {
    &Role::ALL
}
