//! Permission registry: names mapped to bits in a 64-bit mask
//!
//! Permissions are registered once during bootstrap on a
//! [`PermissionRegistry`], then frozen into a read-only [`PermissionTable`]
//! that is shared (behind an `Arc`) by the ACL engine and the checkers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{PermitError, Result};

/// Number of distinct fresh bits available.
pub const MAX_PERMISSIONS: u32 = u64::BITS;

/// A named permission and its bit value.
///
/// Plain permissions own exactly one bit; composites carry the union of the
/// permissions they were declared from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Permission {
    name: String,
    bits: u64,
}

impl Permission {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn is_composite(&self) -> bool {
        self.bits.count_ones() > 1
    }

    /// True if every bit of this permission is present in `mask`.
    #[inline]
    pub fn is_set_in(&self, mask: u64) -> bool {
        mask & self.bits == self.bits
    }
}

/// Read-only permission catalog produced by [`PermissionRegistry::freeze`].
#[derive(Debug, Default)]
pub struct PermissionTable {
    entries: Vec<Permission>,
    index: HashMap<String, usize>,
}

impl PermissionTable {
    /// Look up a permission by name.
    pub fn lookup(&self, name: &str) -> Result<&Permission> {
        self.get(name)
            .ok_or_else(|| PermitError::UnknownPermission(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Permission> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// OR of the named permissions; fails on the first unknown name.
    pub fn mask_of(&self, names: &[&str]) -> Result<u64> {
        names
            .iter()
            .try_fold(0u64, |mask, n| Ok(mask | self.lookup(n)?.bits))
    }

    /// OR of the names that resolve, plus the names that did not.
    pub fn mask_of_lenient<'n>(&self, names: &[&'n str]) -> (u64, Vec<&'n str>) {
        let mut unknown = Vec::new();
        let mask = names.iter().fold(0u64, |mask, n| match self.get(n) {
            Some(p) => mask | p.bits,
            None => {
                unknown.push(*n);
                mask
            }
        });
        (mask, unknown)
    }

    /// Names of every permission fully contained in `mask`, in registration order.
    pub fn names_of(&self, mask: u64) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|p| p.is_set_in(mask))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, permission: Permission) -> Result<Permission> {
        if self.index.contains_key(&permission.name) {
            return Err(PermitError::DuplicatePermission(permission.name));
        }
        self.index.insert(permission.name.clone(), self.entries.len());
        self.entries.push(permission.clone());
        Ok(permission)
    }
}

/// Bootstrap-time builder for the permission catalog.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    table: PermissionTable,
    next_bit: u32,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a permission with the next free bit.
    pub fn register(&mut self, name: &str) -> Result<Permission> {
        if self.table.index.contains_key(name) {
            return Err(PermitError::DuplicatePermission(name.to_string()));
        }
        if self.next_bit >= MAX_PERMISSIONS {
            return Err(PermitError::PermissionSpaceExhausted(name.to_string()));
        }
        let permission = self.table.insert(Permission {
            name: name.to_string(),
            bits: 1u64 << self.next_bit,
        })?;
        self.next_bit += 1;
        Ok(permission)
    }

    /// Register a permission whose bits are the union of already registered ones.
    pub fn register_composite(&mut self, name: &str, of: &[&str]) -> Result<Permission> {
        if self.table.index.contains_key(name) {
            return Err(PermitError::DuplicatePermission(name.to_string()));
        }
        let bits = self.table.mask_of(of)?;
        if bits == 0 {
            return Err(PermitError::EmptyComposite(name.to_string()));
        }
        self.table.insert(Permission {
            name: name.to_string(),
            bits,
        })
    }

    pub fn lookup(&self, name: &str) -> Result<&Permission> {
        self.table.lookup(name)
    }

    /// End the registration phase.
    pub fn freeze(self) -> Arc<PermissionTable> {
        Arc::new(self.table)
    }
}
