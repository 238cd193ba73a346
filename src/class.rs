//! Protected classes and their declared ancestry
//!
//! A class has at most one parent and any number of included modules. Its
//! ancestry, most specific first, is the class itself, then its modules
//! (last included first), then its parent's ancestry. A module the parent's
//! ancestry already holds is not pulled forward: it keeps its place behind
//! the parent.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::error::{PermitError, Result};
use crate::fingerprint::Fingerprintable;

/// Type qualifier used when a class itself is fingerprinted.
pub const CLASS_QUALIFIER: &str = "class";

/// Name of a protected class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassId(&'static str);

impl ClassId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Classes fingerprint as `class/{Name}`, so class-level grants live in the
/// same store as instance grants.
impl Fingerprintable for ClassId {
    fn type_qualifier(&self) -> &str {
        CLASS_QUALIFIER
    }

    fn identifier(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Hierarchy {
    parents: HashMap<ClassId, ClassId>,
    includes: HashMap<ClassId, Vec<ClassId>>,
    known: BTreeSet<ClassId>,
}

impl Hierarchy {
    pub(crate) fn declare(&mut self, class: ClassId, parent: Option<ClassId>) -> Result<()> {
        self.known.insert(class);
        let Some(parent) = parent else {
            return Ok(());
        };
        match self.parents.get(&class) {
            Some(p) if *p == parent => return Ok(()),
            Some(_) => return Err(PermitError::ClassRedeclared(class.to_string())),
            None => {}
        }
        self.ensure_acyclic(class, parent)?;
        self.known.insert(parent);
        self.parents.insert(class, parent);
        Ok(())
    }

    pub(crate) fn include(&mut self, class: ClassId, module: ClassId) -> Result<()> {
        self.ensure_acyclic(class, module)?;
        self.known.insert(class);
        self.known.insert(module);
        let list = self.includes.entry(class).or_default();
        if !list.contains(&module) {
            list.push(module);
        }
        Ok(())
    }

    fn ensure_acyclic(&self, class: ClassId, ancestor: ClassId) -> Result<()> {
        if self.linearize(ancestor).contains(&class) {
            return Err(PermitError::ClassCycle {
                class: class.to_string(),
                parent: ancestor.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn linearize(&self, class: ClassId) -> Vec<ClassId> {
        let inherited = self
            .parents
            .get(&class)
            .map(|p| self.linearize(*p))
            .unwrap_or_default();
        let mut out = vec![class];
        if let Some(modules) = self.includes.get(&class) {
            for m in modules.iter().rev() {
                for c in self.linearize(*m) {
                    if !out.contains(&c) && !inherited.contains(&c) {
                        out.push(c);
                    }
                }
            }
        }
        for c in inherited {
            if !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }

    pub(crate) fn known(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.known.iter().copied()
    }
}
