//! Declaration and resolution of checkers
//!
//! During bootstrap every protected class declares its operations on a
//! [`CheckerRegistry`]. [`CheckerRegistry::freeze`] turns it into a
//! read-only [`CheckerTable`] that resolves `(class, operation)` by walking
//! the class's ancestry, most specific first, and falls back to the
//! [`NullChecker`] when nothing matches.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::capability::{Actor, Protected, Resource};
use crate::checker::{from_fn, Checker, NullChecker};
use crate::class::{ClassId, Hierarchy};
use crate::context::Context;
use crate::decision::AccessDecision;
use crate::error::Result;

static NULL_CHECKER: NullChecker = NullChecker;

type Operations = HashMap<ClassId, HashMap<String, Arc<dyn Checker>>>;

/// Bootstrap-time checker declarations.
#[derive(Default)]
pub struct CheckerRegistry {
    hierarchy: Hierarchy,
    checkers: Operations,
    exposed: HashMap<ClassId, BTreeSet<&'static str>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class and, optionally, its parent.
    pub fn declare_class(&mut self, class: ClassId, parent: Option<ClassId>) -> Result<()> {
        self.hierarchy.declare(class, parent)
    }

    /// Mix a module's checkers into a class, ahead of the parent's.
    pub fn include(&mut self, class: ClassId, module: ClassId) -> Result<()> {
        self.hierarchy.include(class, module)
    }

    /// Declare a [`Protected`] type: its class, parent, modules and exposed operations.
    pub fn protect<T: Protected>(&mut self) -> Result<()> {
        self.declare_class(T::CLASS, T::PARENT)?;
        for module in T::INCLUDES {
            self.include(T::CLASS, *module)?;
        }
        self.exposed
            .entry(T::CLASS)
            .or_default()
            .extend(T::OPERATIONS.iter().copied());
        Ok(())
    }

    /// Register the checker for `(class, operation)`. A later declaration
    /// for the same pair replaces the earlier one.
    pub fn declare_operation<C: Checker + 'static>(&mut self, class: ClassId, operation: &str, checker: C) {
        self.declare_shared(class, operation, Arc::new(checker))
    }

    pub fn declare_shared(&mut self, class: ClassId, operation: &str, checker: Arc<dyn Checker>) {
        let replaced = self
            .checkers
            .entry(class)
            .or_default()
            .insert(operation.to_string(), checker)
            .is_some();
        debug!(%class, operation, replaced, "checker declared");
    }

    /// Register a closure as the checker for `(class, operation)`.
    pub fn declare_fn<F>(&mut self, class: ClassId, operation: &str, f: F)
    where
        F: Fn(&str, Resource<'_>, Option<&dyn Actor>, &Context) -> Result<AccessDecision>
            + Send
            + Sync
            + 'static,
    {
        self.declare_operation(class, operation, from_fn(f))
    }

    /// End the declaration phase.
    pub fn freeze(self) -> CheckerTable {
        let ancestry: HashMap<ClassId, Vec<ClassId>> = self
            .hierarchy
            .known()
            .map(|c| (c, self.hierarchy.linearize(c)))
            .collect();
        let table = CheckerTable {
            ancestry,
            checkers: self.checkers,
            exposed: self.exposed,
        };
        for class in table.checkers.keys() {
            if !table.is_declared(*class) {
                warn!(%class, "checkers declared for a class with no declared ancestry; only its own checkers apply");
            }
        }
        for (class, ops) in &table.exposed {
            for op in ops {
                if table.resolve_declared(*class, op).is_none() {
                    warn!(%class, operation = *op, "operation exposed without a checker; it will always deny");
                }
            }
        }
        table
    }
}

/// Read-only checker lookup, safe to share across threads.
pub struct CheckerTable {
    ancestry: HashMap<ClassId, Vec<ClassId>>,
    checkers: Operations,
    exposed: HashMap<ClassId, BTreeSet<&'static str>>,
}

impl CheckerTable {
    /// Number of classes with a declared ancestry.
    pub fn classes(&self) -> usize {
        self.ancestry.len()
    }

    /// Was `class` declared through `protect`, `declare_class` or `include`
    /// (as the class, its parent or a module)?
    pub fn is_declared(&self, class: ClassId) -> bool {
        self.ancestry.contains_key(&class)
    }

    /// Ancestry of `class`, most specific first. Undeclared classes are
    /// their own single ancestor.
    pub fn ancestry(&self, class: ClassId) -> Vec<ClassId> {
        self.ancestry.get(&class).cloned().unwrap_or_else(|| vec![class])
    }

    /// The checker for `(class, operation)` and the class that declared it,
    /// or `None` if no class in the ancestry declares the operation.
    pub fn resolve_declared(&self, class: ClassId, operation: &str) -> Option<(ClassId, &dyn Checker)> {
        let single = [class];
        let chain = self.ancestry.get(&class).map(Vec::as_slice).unwrap_or(&single[..]);
        chain.iter().find_map(|c| {
            self.checkers
                .get(c)
                .and_then(|ops| ops.get(operation))
                .map(|checker| (*c, &**checker))
        })
    }

    /// The checker for `(class, operation)`; the null checker if none is declared.
    pub fn resolve(&self, class: ClassId, operation: &str) -> &dyn Checker {
        match self.resolve_declared(class, operation) {
            Some((owner, checker)) => {
                trace!(%class, operation, %owner, "checker resolved");
                checker
            }
            None => {
                trace!(%class, operation, "no checker; denying");
                &NULL_CHECKER
            }
        }
    }

    /// Operations exposed by `class` or any ancestor, plus those with checkers.
    pub fn operations(&self, class: ClassId) -> BTreeSet<&str> {
        let mut ops = BTreeSet::new();
        for c in self.ancestry(class) {
            if let Some(exposed) = self.exposed.get(&c) {
                ops.extend(exposed.iter().copied());
            }
            if let Some(declared) = self.checkers.get(&c) {
                ops.extend(declared.keys().map(String::as_str));
            }
        }
        ops
    }
}
