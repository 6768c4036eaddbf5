use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_core::{Entity, PermissionId};

/// Permission code.
///
/// Codes are opaque, stable strings (e.g. "create_user"). The catalog is the
/// only authority on which codes exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(Cow<'static, str>);

impl PermissionCode {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PermissionCode {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// A permission declared in code by the embedding application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDecl {
    pub name: &'static str,
    pub code: &'static str,
    pub description: Option<&'static str>,
}

impl PermissionDecl {
    pub const fn new(name: &'static str, code: &'static str, description: &'static str) -> Self {
        Self {
            name,
            code,
            description: Some(description),
        }
    }

    pub fn code(&self) -> PermissionCode {
        PermissionCode::new(self.code)
    }
}

/// Well-known codes of the built-in catalog.
pub mod codes {
    pub const SUPER_USER: &str = "super_user";
    pub const CREATE_USER: &str = "create_user";
    pub const VIEW_USER: &str = "view_user";
    pub const UPDATE_USER: &str = "update_user";
    pub const EDIT_PERMISSIONS_USER: &str = "edit_permissions_user";
    pub const CREATE_ROLE: &str = "create_role";
    pub const VIEW_ROLE: &str = "view_role";
    pub const UPDATE_ROLE: &str = "update_role";
}

/// Permissions every deployment carries.
pub const CORE_PERMISSIONS: &[PermissionDecl] = &[
    PermissionDecl::new("SuperUser", codes::SUPER_USER, "Full administrative access"),
    PermissionDecl::new("CreateUser", codes::CREATE_USER, "Create user accounts"),
    PermissionDecl::new("ViewUser", codes::VIEW_USER, "View user accounts"),
    PermissionDecl::new("UpdateUser", codes::UPDATE_USER, "Update user accounts"),
    PermissionDecl::new(
        "EditPermissionsUser",
        codes::EDIT_PERMISSIONS_USER,
        "Change the roles and permissions of a user",
    ),
    PermissionDecl::new("CreateRole", codes::CREATE_ROLE, "Create roles"),
    PermissionDecl::new("ViewRole", codes::VIEW_ROLE, "View roles"),
    PermissionDecl::new("UpdateRole", codes::UPDATE_ROLE, "Update roles"),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("permission code is empty (name '{0}')")]
    EmptyCode(String),

    #[error("permission code '{0}' is declared more than once")]
    DuplicateCode(String),

    #[error("permission code '{0}' is not in the catalog")]
    UnknownCode(String),
}

/// The immutable set of valid permission codes for a deployment.
///
/// Built once at startup from static declarations and handed to the
/// reconciler and the router by value (usually behind an `Arc`).
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    entries: Vec<PermissionDecl>,
    index: HashSet<&'static str>,
}

impl PermissionCatalog {
    /// Build a catalog, rejecting empty or duplicated codes.
    pub fn new<I>(decls: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = PermissionDecl>,
    {
        let mut entries = Vec::new();
        let mut index = HashSet::new();
        for decl in decls {
            if decl.code.trim().is_empty() {
                return Err(CatalogError::EmptyCode(decl.name.to_string()));
            }
            if !index.insert(decl.code) {
                return Err(CatalogError::DuplicateCode(decl.code.to_string()));
            }
            entries.push(decl);
        }
        Ok(Self { entries, index })
    }

    /// The built-in catalog plus application-specific declarations.
    pub fn with_core(extra: &[PermissionDecl]) -> Result<Self, CatalogError> {
        Self::new(CORE_PERMISSIONS.iter().chain(extra.iter()).copied())
    }

    pub fn entries(&self) -> &[PermissionDecl] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains(code)
    }

    /// Resolve route requirements against the catalog.
    ///
    /// Fails on the first code that is not declared, so a typo in a route
    /// table surfaces when the router is built, not on the first request.
    pub fn require(&self, codes: &[&str]) -> Result<crate::RequiredPermissions, CatalogError> {
        let mut resolved = Vec::with_capacity(codes.len());
        for code in codes {
            let decl = self
                .entries
                .iter()
                .find(|d| d.code == *code)
                .ok_or_else(|| CatalogError::UnknownCode((*code).to_string()))?;
            resolved.push(decl.code());
        }
        Ok(crate::RequiredPermissions::any_of(resolved))
    }
}

/// A persisted permission catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub code: PermissionCode,
    pub description: Option<String>,
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Insert payload for a catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
    pub code: PermissionCode,
    pub description: Option<String>,
}

impl From<&PermissionDecl> for NewPermission {
    fn from(decl: &PermissionDecl) -> Self {
        Self {
            name: decl.name.to_string(),
            code: decl.code(),
            description: decl.description.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_catalog_is_well_formed() {
        let catalog = PermissionCatalog::with_core(&[]).unwrap();
        assert_eq!(catalog.len(), CORE_PERMISSIONS.len());
        assert!(catalog.contains(codes::CREATE_ROLE));
        assert!(!catalog.contains("launch_missiles"));
    }

    #[test]
    fn application_codes_extend_core() {
        const EXTRA: &[PermissionDecl] = &[
            PermissionDecl::new("ExampleCreate", "create_example", "Create examples"),
            PermissionDecl::new("ExampleView", "view_example", "View examples"),
        ];
        let catalog = PermissionCatalog::with_core(EXTRA).unwrap();
        assert_eq!(catalog.len(), CORE_PERMISSIONS.len() + 2);
        assert_eq!(catalog.entries().last().unwrap().code, "view_example");
    }

    #[test]
    fn duplicate_code_is_rejected() {
        let err = PermissionCatalog::with_core(&[PermissionDecl::new("Again", codes::VIEW_USER, "dup")])
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateCode("view_user".to_string()));
    }

    #[test]
    fn empty_code_is_rejected() {
        let err = PermissionCatalog::new([PermissionDecl::new("Blank", " ", "")]).unwrap_err();
        assert_eq!(err, CatalogError::EmptyCode("Blank".to_string()));
    }

    #[test]
    fn require_resolves_declared_codes_only() {
        let catalog = PermissionCatalog::with_core(&[]).unwrap();
        let required = catalog.require(&[codes::CREATE_USER, codes::UPDATE_USER]).unwrap();
        assert_eq!(required.codes().len(), 2);

        let err = catalog.require(&["create_usr"]).unwrap_err();
        assert_eq!(err, CatalogError::UnknownCode("create_usr".to_string()));
    }

    #[test]
    fn new_permission_from_decl_copies_fields() {
        let row = NewPermission::from(&CORE_PERMISSIONS[1]);
        assert_eq!(row.name, "CreateUser");
        assert_eq!(row.code.as_str(), "create_user");
        assert_eq!(row.description.as_deref(), Some("Create user accounts"));
    }
}
