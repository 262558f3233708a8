//! Event payloads for value and collection changes.
//!
//! A `ValueChange` is raised whenever an observed scalar's new value is
//! unequal to the one previously published. A `CollectionChange` describes a
//! single discrete mutation of an observed sequence.

use alloc::vec::Vec;

/// A value-level change notification carrying the old and new value.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueChange<T> {
    /// The value before the change.
    pub old: T,
    /// The value after the change.
    pub new: T,
}

impl<T> ValueChange<T> {
    /// Creates a new value change.
    #[inline]
    pub fn new(old: T, new: T) -> Self {
        Self { old, new }
    }
}

/// A structural change to an observed collection.
///
/// `index` is the starting position of the affected items, or `None` when the
/// position is not meaningfully knowable; consumers must then treat the
/// change as an unordered contribution.
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionChange<T> {
    /// The collection changed wholesale; re-read it from scratch.
    Reset,
    /// Items were inserted starting at `index`.
    Add {
        items: Vec<T>,
        index: Option<usize>,
    },
    /// Items were removed starting at `index`.
    Remove {
        items: Vec<T>,
        index: Option<usize>,
    },
    /// Items were replaced in place.
    Replace {
        old: Vec<T>,
        new: Vec<T>,
        index: Option<usize>,
    },
    /// Items moved from one position to another.
    Move {
        items: Vec<T>,
        from: usize,
        to: usize,
    },
}

impl<T> CollectionChange<T> {
    /// Creates an Add change.
    #[inline]
    pub fn add(items: Vec<T>, index: Option<usize>) -> Self {
        CollectionChange::Add { items, index }
    }

    /// Creates a Remove change.
    #[inline]
    pub fn remove(items: Vec<T>, index: Option<usize>) -> Self {
        CollectionChange::Remove { items, index }
    }

    /// Creates a single-item Replace change.
    #[inline]
    pub fn replace(old: T, new: T, index: Option<usize>) -> Self {
        CollectionChange::Replace {
            old: alloc::vec![old],
            new: alloc::vec![new],
            index,
        }
    }

    /// Returns true if this change carries no items and is not a Reset.
    ///
    /// Empty deltas must not be published; this is the structural half of the
    /// no-spurious-notification invariant.
    pub fn is_empty(&self) -> bool {
        match self {
            CollectionChange::Reset => false,
            CollectionChange::Add { items, .. } | CollectionChange::Remove { items, .. } => {
                items.is_empty()
            }
            CollectionChange::Replace { old, new, .. } => old.is_empty() && new.is_empty(),
            CollectionChange::Move { items, .. } => items.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_value_change() {
        let c = ValueChange::new(1, 2);
        assert_eq!(c.old, 1);
        assert_eq!(c.new, 2);
    }

    #[test]
    fn test_collection_change_is_empty() {
        assert!(!CollectionChange::<i32>::Reset.is_empty());
        assert!(CollectionChange::add(Vec::<i32>::new(), None).is_empty());
        assert!(!CollectionChange::add(vec![1], Some(0)).is_empty());
        assert!(!CollectionChange::remove(vec![1], None).is_empty());
    }
}
