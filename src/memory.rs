//! In-process grant storage.
//!
//! Rows are sharded by target fingerprint, so writes against different
//! targets do not contend. Useful for tests and for hosts that rebuild their
//! ACL from another source of truth at startup.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::storage::{Grant, GrantStorage};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// target -> rows, in insertion order
    rows: DashMap<Fingerprint, Vec<Grant>>,
    /// group -> member -> created_at
    members: DashMap<Fingerprint, BTreeMap<Fingerprint, u64>>,
    /// member -> groups
    member_of: DashMap<Fingerprint, BTreeSet<Fingerprint>>,
    next_id: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of grant rows.
    pub fn len(&self) -> usize {
        self.rows.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Membership edits lock `members[group]` before `member_of[member]`,
    // so both directions change together.

    fn purge_as_group(&self, group: &Fingerprint) {
        let dropped: Vec<Fingerprint> = match self.members.get_mut(group) {
            Some(mut members) => {
                for member in members.keys() {
                    if let Some(mut groups) = self.member_of.get_mut(member) {
                        groups.remove(group);
                    }
                }
                std::mem::take(&mut *members).into_keys().collect()
            }
            None => Vec::new(),
        };
        self.members.remove_if(group, |_, m| m.is_empty());
        for member in &dropped {
            self.member_of.remove_if(member, |_, g| g.is_empty());
        }
    }

    fn purge_as_member(&self, member: &Fingerprint) {
        let groups: Vec<Fingerprint> = self
            .member_of
            .get(member)
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default();
        for group in groups {
            if let Some(mut members) = self.members.get_mut(&group) {
                members.remove(member);
                if let Some(mut groups) = self.member_of.get_mut(member) {
                    groups.remove(&group);
                }
            }
            self.members.remove_if(&group, |_, m| m.is_empty());
        }
        self.member_of.remove_if(member, |_, g| g.is_empty());
    }
}

impl GrantStorage for MemoryStorage {
    fn insert(&self, target: &Fingerprint, actor: &Fingerprint, grants: u64, created_at: u64) -> Result<Grant> {
        let grant = Grant {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            target: target.clone(),
            actor: actor.clone(),
            grants,
            created_at,
        };
        self.rows.entry(target.clone()).or_default().push(grant.clone());
        Ok(grant)
    }

    fn delete_pair(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<usize> {
        let removed = match self.rows.get_mut(target) {
            Some(mut rows) => {
                let before = rows.len();
                rows.retain(|g| &g.actor != actor);
                before - rows.len()
            }
            None => 0,
        };
        self.rows.remove_if(target, |_, rows| rows.is_empty());
        Ok(removed)
    }

    fn by_pair(&self, target: &Fingerprint, actor: &Fingerprint) -> Result<Vec<Grant>> {
        Ok(self
            .rows
            .get(target)
            .map(|rows| rows.iter().filter(|g| &g.actor == actor).cloned().collect())
            .unwrap_or_default())
    }

    fn by_target(&self, target: &Fingerprint) -> Result<Vec<Grant>> {
        Ok(self.rows.get(target).map(|rows| rows.value().clone()).unwrap_or_default())
    }

    fn by_actor(&self, actor: &Fingerprint) -> Result<Vec<Grant>> {
        let mut found: Vec<Grant> = self
            .rows
            .iter()
            .flat_map(|e| {
                e.value()
                    .iter()
                    .filter(|g| &g.actor == actor)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        found.sort_by_key(|g| g.id);
        Ok(found)
    }

    fn purge(&self, entity: &Fingerprint) -> Result<usize> {
        let mut n = self.rows.remove(entity).map(|(_, rows)| rows.len()).unwrap_or(0);
        for mut e in self.rows.iter_mut() {
            let before = e.value().len();
            e.value_mut().retain(|g| &g.actor != entity);
            n += before - e.value().len();
        }
        self.rows.retain(|_, rows| !rows.is_empty());

        self.purge_as_group(entity);
        self.purge_as_member(entity);
        debug!(entity = %entity, rows = n, "purged");
        Ok(n)
    }

    fn add_member(&self, group: &Fingerprint, member: &Fingerprint, created_at: u64) -> Result<bool> {
        let mut members = self.members.entry(group.clone()).or_default();
        if members.contains_key(member) {
            return Ok(false);
        }
        members.insert(member.clone(), created_at);
        self.member_of.entry(member.clone()).or_default().insert(group.clone());
        Ok(true)
    }

    fn remove_member(&self, group: &Fingerprint, member: &Fingerprint) -> Result<bool> {
        let removed = match self.members.get_mut(group) {
            Some(mut members) => {
                let removed = members.remove(member).is_some();
                if let Some(mut groups) = self.member_of.get_mut(member) {
                    groups.remove(group);
                }
                removed
            }
            None => false,
        };
        self.members.remove_if(group, |_, m| m.is_empty());
        self.member_of.remove_if(member, |_, g| g.is_empty());
        Ok(removed)
    }

    fn groups_of(&self, member: &Fingerprint) -> Result<Vec<Fingerprint>> {
        Ok(self
            .member_of
            .get(member)
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn members_of(&self, group: &Fingerprint) -> Result<Vec<Fingerprint>> {
        Ok(self
            .members
            .get(group)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}
