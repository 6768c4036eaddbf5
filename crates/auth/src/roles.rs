use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use gatehouse_core::{Entity, RoleId};

use crate::{Permission, PermissionCode};

/// A named grouping of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn permission_codes(&self) -> impl Iterator<Item = &PermissionCode> {
        self.permissions.iter().map(|p| &p.code)
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Insert payload for a role: a unique name and the catalogued codes it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub permissions: Vec<PermissionCode>,
}

impl NewRole {
    pub fn new(name: impl Into<String>, codes: &[&str]) -> Self {
        Self {
            name: name.into(),
            permissions: codes.iter().map(|c| PermissionCode::new(c.to_string())).collect(),
        }
    }
}

/// True iff every role in `requested` is among `held`.
///
/// Guards role assignment: an actor may only hand out roles it holds itself.
pub fn holds_all(held: &[Role], requested: &[RoleId]) -> bool {
    let held: HashSet<&RoleId> = held.iter().map(|r| &r.id).collect();
    requested.iter().all(|id| held.contains(id))
}
