//! Permitbit - embedded authorization engine
//!
//! Answers "may actor A perform operation OP on this object?" for every
//! protected resource type in an application.
//!
//! - Permissions: names mapped to bits, registered once at startup
//! - Grants: immutable ACL rows of (target, actor, bitmask), keyed by fingerprint
//! - Checkers: declared per (class, operation), resolved along the class ancestry
//! - Deny by default: anything undeclared or ungranted yields `Denied`
//!
//! ```
//! use std::sync::Arc;
//! use permitbit::*;
//!
//! struct User(u64);
//! impl Fingerprintable for User {
//!     fn type_qualifier(&self) -> &str { "User" }
//!     fn identifier(&self) -> Option<String> { Some(self.0.to_string()) }
//! }
//! impl Actor for User {}
//!
//! struct Document(u64);
//! impl Fingerprintable for Document {
//!     fn type_qualifier(&self) -> &str { "Document" }
//!     fn identifier(&self) -> Option<String> { Some(self.0.to_string()) }
//! }
//! impl Protected for Document {
//!     const CLASS: ClassId = ClassId::new("Document");
//!     const OPERATIONS: &'static [&'static str] = &["read", "update"];
//! }
//!
//! # fn main() -> permitbit::Result<()> {
//! let mut permissions = PermissionRegistry::new();
//! permissions.register("read")?;
//! permissions.register("write")?;
//! let permissions = permissions.freeze();
//!
//! let acl = Arc::new(Acl::new(MemoryStorage::new(), permissions));
//!
//! let mut checkers = CheckerRegistry::new();
//! checkers.protect::<Document>()?;
//! checkers.declare_operation(Document::CLASS, "read", always(AccessLevel::Public));
//! checkers.declare_operation(Document::CLASS, "update", AclChecker::new(acl.clone(), "write")?);
//! let policy = Policy::new(checkers.freeze());
//!
//! let (alice, doc) = (User(1), Document(7));
//! let ctx = Context::new();
//! assert_eq!(
//!     doc.permission_in(&policy, Some(&alice), "read", &ctx)?,
//!     AccessDecision::Granted(AccessLevel::Public)
//! );
//! assert!(doc.permission_in(&policy, Some(&alice), "update", &ctx)?.is_denied());
//!
//! acl.grant(&doc, &alice, &["write"])?;
//! assert_eq!(
//!     doc.permission_in(&policy, Some(&alice), "update", &ctx)?,
//!     AccessDecision::Granted(AccessLevel::Private)
//! );
//! # Ok(())
//! # }
//! ```

mod access;
mod acl;
mod capability;
mod checker;
mod class;
mod config;
mod context;
mod db;
mod decision;
mod error;
mod fingerprint;
mod keys;
mod memory;
mod permission;
mod registry;
mod storage;

pub use access::{install, installed, Policy, TargetExt};
pub use acl::Acl;
pub use capability::{Actor, AsAny, Protected, Resource, Target};
pub use checker::{always, any_of, from_fn, AclChecker, Always, AnyOf, Checker, FnChecker, NullChecker};
pub use class::{ClassId, CLASS_QUALIFIER};
pub use config::{StoreConfig, DEFAULT_MAP_SIZE, DEFAULT_MAX_READERS};
pub use context::Context;
pub use db::LmdbStorage;
pub use decision::{AccessDecision, AccessLevel};
pub use error::{PermitError, Result};
pub use fingerprint::{fingerprint, Fingerprint, Fingerprintable, MAX_FINGERPRINT_LEN};
pub use memory::MemoryStorage;
pub use permission::{Permission, PermissionRegistry, PermissionTable, MAX_PERMISSIONS};
pub use registry::{CheckerRegistry, CheckerTable};
pub use storage::{Grant, GrantStorage, Via};
