//! Account records and the administrative bootstrap descriptor.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use gatehouse_core::{AccountId, Entity, RoleId};

use crate::{PermissionCode, Role};

/// A persisted identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub active: bool,
    pub is_superuser: bool,
    pub roles: Vec<Role>,
}

impl Account {
    /// Union of the permission codes of every role, in first-seen order.
    pub fn effective_permissions(&self) -> Vec<PermissionCode> {
        let mut seen = HashSet::new();
        self.roles
            .iter()
            .flat_map(Role::permission_codes)
            .filter(|code| seen.insert(code.as_str()))
            .cloned()
            .collect()
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Insert payload for an account. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub active: bool,
    pub is_superuser: bool,
    /// Roles granted at creation; they must already exist.
    pub roles: Vec<RoleId>,
}

/// The administrative account a deployment is bootstrapped with.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminDescriptor {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub phone: Option<String>,
}

impl AdminDescriptor {
    /// The account row to create for this admin, given its password hash.
    pub fn to_new_account(&self, password_hash: String) -> NewAccount {
        NewAccount {
            username: self.username.clone(),
            email: self.email.clone(),
            password_hash,
            first_name: self.display_name.clone(),
            last_name: "Admin".to_string(),
            phone: self.phone.clone(),
            active: true,
            is_superuser: true,
            roles: Vec::new(),
        }
    }
}

impl core::fmt::Debug for AdminDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminDescriptor")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .field("phone", &self.phone)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Permission;
    use gatehouse_core::{PermissionId, RoleId};

    fn perm(code: &'static str) -> Permission {
        Permission {
            id: PermissionId::new(),
            name: code.to_string(),
            code: PermissionCode::new(code),
            description: None,
        }
    }

    fn account_with(roles: Vec<Role>) -> Account {
        Account {
            id: AccountId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            phone: None,
            active: true,
            is_superuser: false,
            roles,
        }
    }

    #[test]
    fn effective_permissions_are_the_union_of_roles() {
        let editor = Role {
            id: RoleId::new(),
            name: "editor".to_string(),
            permissions: vec![perm("view_user"), perm("update_user")],
        };
        let viewer = Role {
            id: RoleId::new(),
            name: "viewer".to_string(),
            permissions: vec![perm("view_user"), perm("view_role")],
        };

        let codes: Vec<String> = account_with(vec![editor, viewer])
            .effective_permissions()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(codes, vec!["view_user", "update_user", "view_role"]);
    }

    #[test]
    fn no_roles_means_no_permissions() {
        assert!(account_with(vec![]).effective_permissions().is_empty());
    }

    #[test]
    fn admin_descriptor_builds_active_superuser() {
        let admin = AdminDescriptor {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: "Secret!1".to_string(),
            display_name: "Root".to_string(),
            phone: Some("555-0100".to_string()),
        };
        let row = admin.to_new_account("$hash".to_string());
        assert!(row.active);
        assert!(row.is_superuser);
        assert_eq!(row.last_name, "Admin");
        assert_eq!(row.password_hash, "$hash");
    }

    #[test]
    fn admin_descriptor_debug_hides_password() {
        let admin = AdminDescriptor {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: "Secret!1".to_string(),
            display_name: "Root".to_string(),
            phone: None,
        };
        assert!(!format!("{admin:?}").contains("Secret!1"));
    }
}
