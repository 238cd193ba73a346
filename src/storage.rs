//! Persistence collaborator for grant rows and group memberships
//!
//! The ACL engine only needs a handful of indexed operations; anything that
//! provides them can back it. [`LmdbStorage`](crate::LmdbStorage) is the
//! durable store, [`MemoryStorage`](crate::MemoryStorage) the in-process one.

use serde::Serialize;

use crate::error::Result;
use crate::fingerprint::Fingerprint;

/// One persisted ACL row. Rows are never updated; revocation deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub id: u64,
    pub target: Fingerprint,
    pub actor: Fingerprint,
    /// Granted permission bits; never zero.
    pub grants: u64,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// How an actor came to hold a grant row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Via {
    /// The row names the actor itself.
    Direct,
    /// The row names a group the actor is a direct member of.
    Group(Fingerprint),
}

/// Storage operations required by [`Acl`](crate::Acl).
///
/// Every write is atomic per call: a row (and its reverse index entry) is
/// written or deleted as a whole.
pub trait GrantStorage: Send + Sync {
    /// Insert a new row with a fresh id.
    fn insert(&self, target: &Fingerprint, actor: &Fingerprint, grants: u64, created_at: u64) -> Result<Grant>;

    /// Delete every row for the pair, returning how many were removed.
    fn delete_pair(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<usize>;

    fn by_pair(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<Vec<Grant>>;

    fn by_target(&self, target: &Fingerprint) -> Result<Vec<Grant>>;

    fn by_actor(&self, actor: &Fingerprint) -> Result<Vec<Grant>>;

    /// Delete every row and membership naming `entity` on either side.
    /// Returns the number of grant rows removed.
    fn purge(&self, entity: &Fingerprint) -> Result<usize>;

    /// Returns false if the membership already existed.
    fn add_member(&self, group: &Fingerprint, member: &Fingerprint, created_at: u64) -> Result<bool>;

    fn remove_member(&self, group: &Fingerprint, member: &Fingerprint) -> Result<bool>;

    /// Groups `member` belongs to directly.
    fn groups_of(&self, member: &Fingerprint) -> Result<Vec<Fingerprint>>;

    /// Direct members of `group`.
    fn members_of(&self, group: &Fingerprint) -> Result<Vec<Fingerprint>>;

    /// Masks of every row held by `actor` on `target`: its own rows first,
    /// then the rows of each group it belongs to directly.
    ///
    /// Stores with snapshot reads should override this to answer from a
    /// single snapshot.
    fn held_masks(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<Vec<(Via, u64)>> {
        let mut held: Vec<(Via, u64)> = self
            .by_pair(target, actor)?
            .into_iter()
            .map(|g| (Via::Direct, g.grants))
            .collect();
        for group in self.groups_of(actor)? {
            for g in self.by_pair(target, &group)? {
                held.push((Via::Group(group.clone()), g.grants));
            }
        }
        Ok(held)
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn current_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
