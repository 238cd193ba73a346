//! Grant-based ACL evaluation
//!
//! A grant row holds a bitmask of permissions for one (target, actor) pair.
//! An actor holds a permission on a target when a single row, either its own
//! or one held by a group it belongs to directly, carries every bit of that
//! permission. Group membership is followed exactly one level: members of a
//! member group gain nothing.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::{PermitError, Result};
use crate::fingerprint::{fingerprint, Fingerprint, Fingerprintable};
use crate::permission::{Permission, PermissionTable};
use crate::storage::{current_epoch, Grant, GrantStorage, Via};

/// ACL engine over a storage backend.
pub struct Acl<S> {
    storage: S,
    permissions: Arc<PermissionTable>,
}

impl<S: GrantStorage> Acl<S> {
    pub fn new(storage: S, permissions: Arc<PermissionTable>) -> Self {
        Self { storage, permissions }
    }

    pub fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write a new grant row carrying the union of the named permissions.
    ///
    /// Names that are not registered are skipped. If nothing remains the
    /// grant is rejected with [`PermitError::EmptyGrant`] and no row is written.
    pub fn grant<T, A>(&self, target: &T, actor: &A, names: &[&str]) -> Result<Grant>
    where
        T: Fingerprintable + ?Sized,
        A: Fingerprintable + ?Sized,
    {
        let (t, a) = (fingerprint(target)?, fingerprint(actor)?);
        let (mask, unknown) = self.permissions.mask_of_lenient(names);
        if !unknown.is_empty() {
            warn!(resource = %t, actor = %a, ?unknown, "grant names unregistered permissions");
        }
        if mask == 0 {
            return Err(PermitError::EmptyGrant {
                target: t.to_string(),
                actor: a.to_string(),
            });
        }
        let grant = self.storage.insert(&t, &a, mask, current_epoch())?;
        debug!(resource = %t, actor = %a, mask, id = grant.id, "granted");
        Ok(grant)
    }

    /// Delete every row for the pair. Revoking nothing is not an error.
    pub fn revoke<T, A>(&self, target: &T, actor: &A) -> Result<usize>
    where
        T: Fingerprintable + ?Sized,
        A: Fingerprintable + ?Sized,
    {
        let (t, a) = (fingerprint(target)?, fingerprint(actor)?);
        let n = self.storage.delete_pair(&t, &a)?;
        debug!(resource = %t, actor = %a, rows = n, "revoked");
        Ok(n)
    }

    /// Does `actor` hold the named permission on `target`?
    pub fn check<T, A>(&self, target: &T, actor: &A, permission: &str) -> Result<bool>
    where
        T: Fingerprintable + ?Sized,
        A: Fingerprintable + ?Sized,
    {
        let p = self.permissions.lookup(permission)?;
        self.check_mask(target, actor, p)
    }

    pub fn check_mask<T, A>(&self, target: &T, actor: &A, permission: &Permission) -> Result<bool>
    where
        T: Fingerprintable + ?Sized,
        A: Fingerprintable + ?Sized,
    {
        Ok(self.access_via_mask(target, actor, permission)?.is_some())
    }

    /// Like [`check`](Self::check), but reports which row granted access.
    /// Direct rows win over group rows.
    pub fn access_via<T, A>(&self, target: &T, actor: &A, permission: &str) -> Result<Option<Via>>
    where
        T: Fingerprintable + ?Sized,
        A: Fingerprintable + ?Sized,
    {
        let p = self.permissions.lookup(permission)?;
        self.access_via_mask(target, actor, p)
    }

    pub fn access_via_mask<T, A>(&self, target: &T, actor: &A, permission: &Permission) -> Result<Option<Via>>
    where
        T: Fingerprintable + ?Sized,
        A: Fingerprintable + ?Sized,
    {
        let (t, a) = (fingerprint(target)?, fingerprint(actor)?);
        let required = permission.bits();
        let via = self
            .storage
            .held_masks(&t, &a)?
            .into_iter()
            .find(|(_, mask)| mask & required == required)
            .map(|(via, _)| via);
        trace!(resource = %t, actor = %a, permission = permission.name(), ?via, "acl check");
        Ok(via)
    }

    /// Rows naming `target`.
    pub fn grants_on<T: Fingerprintable + ?Sized>(&self, target: &T) -> Result<Vec<Grant>> {
        self.storage.by_target(&fingerprint(target)?)
    }

    /// Rows naming `actor` directly.
    pub fn grants_of<A: Fingerprintable + ?Sized>(&self, actor: &A) -> Result<Vec<Grant>> {
        self.storage.by_actor(&fingerprint(actor)?)
    }

    /// Make `member` a direct member of `group`. Returns false if it already was.
    pub fn add_member<G, M>(&self, group: &G, member: &M) -> Result<bool>
    where
        G: Fingerprintable + ?Sized,
        M: Fingerprintable + ?Sized,
    {
        let (g, m) = (fingerprint(group)?, fingerprint(member)?);
        let added = self.storage.add_member(&g, &m, current_epoch())?;
        debug!(group = %g, member = %m, added, "membership added");
        Ok(added)
    }

    pub fn remove_member<G, M>(&self, group: &G, member: &M) -> Result<bool>
    where
        G: Fingerprintable + ?Sized,
        M: Fingerprintable + ?Sized,
    {
        let (g, m) = (fingerprint(group)?, fingerprint(member)?);
        let removed = self.storage.remove_member(&g, &m)?;
        debug!(group = %g, member = %m, removed, "membership removed");
        Ok(removed)
    }

    pub fn groups_of<M: Fingerprintable + ?Sized>(&self, member: &M) -> Result<Vec<Fingerprint>> {
        self.storage.groups_of(&fingerprint(member)?)
    }

    pub fn members_of<G: Fingerprintable + ?Sized>(&self, group: &G) -> Result<Vec<Fingerprint>> {
        self.storage.members_of(&fingerprint(group)?)
    }

    /// Forget an entity entirely: its rows as target or actor and its memberships.
    pub fn purge<E: Fingerprintable + ?Sized>(&self, entity: &E) -> Result<usize> {
        self.storage.purge(&fingerprint(entity)?)
    }
}
