//! Checkers: per-(class, operation) access logic
//!
//! A checker receives the operation, the object (instance or class), the
//! actor (if any) and the caller context, and returns an [`AccessDecision`].
//! Checkers must be pure with respect to those inputs; the facade may call
//! the same checker several times while answering one request.

use std::sync::Arc;

use crate::acl::Acl;
use crate::capability::{Actor, Resource};
use crate::context::Context;
use crate::decision::{AccessDecision, AccessLevel};
use crate::error::Result;
use crate::permission::Permission;
use crate::storage::{GrantStorage, Via};

/// Access logic for one operation on one class.
pub trait Checker: Send + Sync {
    fn check(
        &self,
        operation: &str,
        resource: Resource<'_>,
        actor: Option<&dyn Actor>,
        context: &Context,
    ) -> Result<AccessDecision>;
}

/// Resolved when nothing is declared: always denies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullChecker;

impl Checker for NullChecker {
    fn check(&self, _: &str, _: Resource<'_>, _: Option<&dyn Actor>, _: &Context) -> Result<AccessDecision> {
        Ok(AccessDecision::Denied)
    }
}

/// Grants a fixed level to everyone.
#[derive(Debug, Clone, Copy)]
pub struct Always(pub AccessLevel);

pub fn always(level: AccessLevel) -> Always {
    Always(level)
}

impl Checker for Always {
    fn check(&self, _: &str, _: Resource<'_>, _: Option<&dyn Actor>, _: &Context) -> Result<AccessDecision> {
        Ok(AccessDecision::Granted(self.0))
    }
}

/// A checker backed by a closure.
pub struct FnChecker<F>(F);

/// Wrap a closure as a checker.
pub fn from_fn<F>(f: F) -> FnChecker<F>
where
    F: Fn(&str, Resource<'_>, Option<&dyn Actor>, &Context) -> Result<AccessDecision> + Send + Sync,
{
    FnChecker(f)
}

impl<F> Checker for FnChecker<F>
where
    F: Fn(&str, Resource<'_>, Option<&dyn Actor>, &Context) -> Result<AccessDecision> + Send + Sync,
{
    fn check(
        &self,
        operation: &str,
        resource: Resource<'_>,
        actor: Option<&dyn Actor>,
        context: &Context,
    ) -> Result<AccessDecision> {
        (self.0)(operation, resource, actor, context)
    }
}

/// Asks the ACL whether the actor holds a permission on the resource, and
/// grades the answer by where the grant came from.
///
/// Anonymous actors are denied without touching the store.
pub struct AclChecker<S> {
    acl: Arc<Acl<S>>,
    permission: Permission,
    direct: AccessLevel,
    group: AccessLevel,
}

impl<S: GrantStorage> AclChecker<S> {
    /// Fails with `UnknownPermission` if `permission` is not registered.
    pub fn new(acl: Arc<Acl<S>>, permission: &str) -> Result<Self> {
        let permission = acl.permissions().lookup(permission)?.clone();
        Ok(Self {
            acl,
            permission,
            direct: AccessLevel::Private,
            group: AccessLevel::Private,
        })
    }

    /// Level returned for a grant held by the actor itself.
    pub fn direct_level(mut self, level: AccessLevel) -> Self {
        self.direct = level;
        self
    }

    /// Level returned for a grant held through a group.
    pub fn group_level(mut self, level: AccessLevel) -> Self {
        self.group = level;
        self
    }
}

impl<S: GrantStorage> Checker for AclChecker<S> {
    fn check(
        &self,
        _: &str,
        resource: Resource<'_>,
        actor: Option<&dyn Actor>,
        _: &Context,
    ) -> Result<AccessDecision> {
        let Some(actor) = actor else {
            return Ok(AccessDecision::Denied);
        };
        Ok(match self.acl.access_via_mask(&resource, actor, &self.permission)? {
            Some(Via::Direct) => AccessDecision::Granted(self.direct),
            Some(Via::Group(_)) => AccessDecision::Granted(self.group),
            None => AccessDecision::Denied,
        })
    }
}

/// Tries checkers in order; the first granted decision wins.
pub struct AnyOf(Vec<Arc<dyn Checker>>);

pub fn any_of(checkers: Vec<Arc<dyn Checker>>) -> AnyOf {
    AnyOf(checkers)
}

impl Checker for AnyOf {
    fn check(
        &self,
        operation: &str,
        resource: Resource<'_>,
        actor: Option<&dyn Actor>,
        context: &Context,
    ) -> Result<AccessDecision> {
        for c in &self.0 {
            let d = c.check(operation, resource, actor, context)?;
            if d.is_granted() {
                return Ok(d);
            }
        }
        Ok(AccessDecision::Denied)
    }
}
