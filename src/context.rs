//! Caller-supplied values passed through to checkers

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// A typed bag of values, at most one per type.
///
/// ```
/// use permitbit::Context;
///
/// struct RequestIp(&'static str);
///
/// let ctx = Context::new().with(RequestIp("10.0.0.1"));
/// assert_eq!(ctx.get::<RequestIp>().map(|ip| ip.0), Some("10.0.0.1"));
/// assert!(ctx.get::<u32>().is_none());
/// ```
#[derive(Default)]
pub struct Context {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Store a value, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("values", &self.values.len()).finish()
    }
}
