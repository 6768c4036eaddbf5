//! `gatehouse-core`: identity building blocks shared by every crate.
//!
//! This crate holds **pure** primitives (no storage, no transport).

pub mod entity;
pub mod error;
pub mod id;
pub mod pagination;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, PermissionId, RoleId};
pub use pagination::{Page, paginate};
