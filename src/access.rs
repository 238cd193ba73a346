//! Access facade: the single entry point protected resources call
//!
//! `permission` resolves the checker for the object's class and operation,
//! runs it and returns its decision unchanged. It is a pure query: it never
//! writes grants or permissions.

use std::sync::OnceLock;

use tracing::{info, trace};

use crate::capability::{Actor, Resource, Target};
use crate::class::ClassId;
use crate::context::Context;
use crate::decision::AccessDecision;
use crate::error::{PermitError, Result};
use crate::registry::CheckerTable;

/// Frozen checkers, shared by every request.
///
/// Grant-backed checkers carry their own [`Acl`](crate::Acl) and resolve
/// permission bits against its table.
pub struct Policy {
    checkers: CheckerTable,
}

impl Policy {
    pub fn new(checkers: CheckerTable) -> Self {
        Self { checkers }
    }

    pub fn checkers(&self) -> &CheckerTable {
        &self.checkers
    }

    /// May `actor` perform `operation` on `object`?
    ///
    /// An operation nobody declared is denied, not an error. Errors come
    /// only from malformed inputs (e.g. an actor without an identifier
    /// reaching a grant check) or from the grant store.
    pub fn permission(
        &self,
        actor: Option<&dyn Actor>,
        operation: &str,
        object: &dyn Target,
        context: &Context,
    ) -> Result<AccessDecision> {
        self.decide(Resource::Instance(object), actor, operation, context)
    }

    /// Class-level variant, for operations that precede any instance
    /// (e.g. "may this actor create one at all").
    pub fn class_permission(
        &self,
        class: ClassId,
        actor: Option<&dyn Actor>,
        operation: &str,
        context: &Context,
    ) -> Result<AccessDecision> {
        self.decide(Resource::Class(class), actor, operation, context)
    }

    fn decide(
        &self,
        resource: Resource<'_>,
        actor: Option<&dyn Actor>,
        operation: &str,
        context: &Context,
    ) -> Result<AccessDecision> {
        let checker = self.checkers.resolve(resource.class(), operation);
        let decision = checker.check(operation, resource, actor, context)?;
        trace!(?resource, operation, %decision, "permission");
        Ok(decision)
    }
}

static POLICY: OnceLock<Policy> = OnceLock::new();

/// Install the process-wide policy. Call once, after bootstrap and before
/// serving requests.
pub fn install(policy: Policy) -> Result<&'static Policy> {
    let mut fresh = false;
    let installed = POLICY.get_or_init(|| {
        fresh = true;
        policy
    });
    if !fresh {
        return Err(PermitError::AlreadyInstalled);
    }
    info!(classes = installed.checkers.classes(), "policy installed");
    Ok(installed)
}

/// The process-wide policy.
pub fn installed() -> Result<&'static Policy> {
    POLICY.get().ok_or(PermitError::NotInstalled)
}

/// `permission` on any target.
pub trait TargetExt {
    /// Check against the installed policy.
    fn permission(&self, actor: Option<&dyn Actor>, operation: &str, context: &Context) -> Result<AccessDecision>;

    fn permission_in(
        &self,
        policy: &Policy,
        actor: Option<&dyn Actor>,
        operation: &str,
        context: &Context,
    ) -> Result<AccessDecision>;
}

impl<T: Target> TargetExt for T {
    fn permission(&self, actor: Option<&dyn Actor>, operation: &str, context: &Context) -> Result<AccessDecision> {
        installed()?.permission(actor, operation, self, context)
    }

    fn permission_in(
        &self,
        policy: &Policy,
        actor: Option<&dyn Actor>,
        operation: &str,
        context: &Context,
    ) -> Result<AccessDecision> {
        policy.permission(actor, operation, self, context)
    }
}
