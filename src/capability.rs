//! Capability traits resource types opt into
//!
//! - [`Actor`]: can be named in a grant (users, groups).
//! - [`Target`]: can be checked; implemented for every [`Protected`] type.
//!
//! A type may be both, e.g. a group that is itself a protected resource.

use std::any::Any;
use std::fmt;

use crate::class::ClassId;
use crate::error::Result;
use crate::fingerprint::{fingerprint, Fingerprint, Fingerprintable};

/// Upcast to `&dyn Any` so checkers can recover concrete types.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Something permissions can be granted to.
pub trait Actor: Fingerprintable + AsAny {}

impl<'a> dyn Actor + 'a {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// A checkable instance.
pub trait Target: Fingerprintable + AsAny {
    fn class(&self) -> ClassId;
}

impl<'a> dyn Target + 'a {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// Declares a type as a protected class.
///
/// `PARENT` and `INCLUDES` only shape resolution once the type is passed to
/// [`CheckerRegistry::protect`](crate::CheckerRegistry::protect). A class that
/// only receives checkers through `declare_operation` is its own single
/// ancestor and inherits nothing.
///
/// ```
/// use permitbit::{ClassId, Fingerprintable, Protected};
///
/// struct Comment { id: u64 }
///
/// impl Fingerprintable for Comment {
///     fn type_qualifier(&self) -> &str { "Comment" }
///     fn identifier(&self) -> Option<String> { Some(self.id.to_string()) }
/// }
///
/// impl Protected for Comment {
///     const CLASS: ClassId = ClassId::new("Comment");
///     const PARENT: Option<ClassId> = Some(ClassId::new("Record"));
///     const OPERATIONS: &'static [&'static str] = &["read", "update", "destroy"];
/// }
/// ```
pub trait Protected: Fingerprintable + Sized + 'static {
    const CLASS: ClassId;
    const PARENT: Option<ClassId> = None;
    /// Modules whose checkers this class picks up, in inclusion order.
    const INCLUDES: &'static [ClassId] = &[];
    /// Operations this class exposes.
    const OPERATIONS: &'static [&'static str] = &[];
}

impl<T: Protected> Target for T {
    fn class(&self) -> ClassId {
        T::CLASS
    }
}

/// The object of a check: an instance, or a class when no instance exists
/// yet (e.g. "may this actor create one").
#[derive(Clone, Copy)]
pub enum Resource<'a> {
    Instance(&'a dyn Target),
    Class(ClassId),
}

impl<'a> Resource<'a> {
    pub fn class(&self) -> ClassId {
        match self {
            Resource::Instance(t) => t.class(),
            Resource::Class(c) => *c,
        }
    }

    pub fn instance(&self) -> Option<&'a dyn Target> {
        match self {
            Resource::Instance(t) => Some(*t),
            Resource::Class(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        self.instance().and_then(|t| t.downcast_ref::<T>())
    }

    pub fn fingerprint(&self) -> Result<Fingerprint> {
        match self {
            Resource::Instance(t) => fingerprint(*t),
            Resource::Class(c) => fingerprint(c),
        }
    }
}

impl Fingerprintable for Resource<'_> {
    fn type_qualifier(&self) -> &str {
        match self {
            Resource::Instance(t) => t.type_qualifier(),
            Resource::Class(c) => c.type_qualifier(),
        }
    }

    fn identifier(&self) -> Option<String> {
        match self {
            Resource::Instance(t) => t.identifier(),
            Resource::Class(c) => c.identifier(),
        }
    }
}

impl fmt::Debug for Resource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Instance(t) => write!(f, "Instance({}#{:?})", t.class(), t.identifier()),
            Resource::Class(c) => write!(f, "Class({c})"),
        }
    }
}
