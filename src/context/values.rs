use std::any::{Any, TypeId};
use std::fmt;

use smallvec::SmallVec;

/// Most requests carry a logger and maybe a deadline.
const MAX_INLINE_VALUES: usize = 4;

type Entry = (TypeId, Box<dyn Any + Send + Sync>);

/// Small ordered typed store for cross-cutting request data.
///
/// Values are keyed by their type; inserting a second value of the same type
/// replaces the first in place and keeps insertion order for the rest.
#[derive(Default)]
pub struct Values {
    entries: SmallVec<[Entry; MAX_INLINE_VALUES]>,
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl Values {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        let id = TypeId::of::<T>();
        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == id) {
            let previous = std::mem::replace(slot, Box::new(value));
            return previous.downcast::<T>().ok().map(|b| *b);
        }
        self.entries.push((id, Box::new(value)));
        None
    }

    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        let id = TypeId::of::<T>();
        self.entries
            .iter()
            .find(|(k, _)| *k == id)
            .and_then(|(_, v)| v.downcast_ref::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        let id = TypeId::of::<T>();
        let pos = self.entries.iter().position(|(k, _)| *k == id)?;
        let (_, value) = self.entries.remove(pos);
        value.downcast::<T>().ok().map(|b| *b)
    }

    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.entries.iter().any(|(k, _)| *k == id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    #[derive(Debug, PartialEq)]
    struct Attempt(u32);

    #[test]
    fn test_insert_and_get_by_type() {
        let mut values = Values::new();
        assert!(values.insert(Tenant("acme")).is_none());
        assert!(values.insert(Attempt(1)).is_none());
        assert_eq!(values.get::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(values.get::<Attempt>(), Some(&Attempt(1)));
        assert!(values.get::<String>().is_none());
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_insert_replaces_same_type() {
        let mut values = Values::new();
        values.insert(Attempt(1));
        assert_eq!(values.insert(Attempt(2)), Some(Attempt(1)));
        assert_eq!(values.get::<Attempt>(), Some(&Attempt(2)));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_remove_returns_value() {
        let mut values = Values::new();
        values.insert(Attempt(2));
        assert_eq!(values.remove::<Attempt>(), Some(Attempt(2)));
        assert!(!values.contains::<Attempt>());
        assert!(values.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut values = Values::new();
        values.insert(Tenant("acme"));
        values.insert(Attempt(3));
        values.clear();
        assert!(values.is_empty());
        assert!(values.get::<Tenant>().is_none());
    }
}
