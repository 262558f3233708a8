//! Observable collections.
//!
//! `ObservableCollection` is the contract every sequence the engine watches
//! must satisfy: it can be snapshotted, and it announces each discrete
//! mutation as one `CollectionChange` before the mutating call returns.
//!
//! `ObservableVec` is the canonical mutable source collection. Mutators apply
//! the change first, then emit, so handlers always observe post-change state.

use crate::event::CollectionChange;
use crate::publisher::EventSource;
use alloc::vec::Vec;
use core::cell::RefCell;

/// A sequence that announces its own structural changes.
pub trait ObservableCollection<T> {
    /// Returns the current contents as an owned vector.
    ///
    /// Enumerating twice without an intervening change yields the same
    /// sequence; the work is not required to be memoized.
    fn snapshot(&self) -> Vec<T>;

    /// Returns the number of items currently in the collection.
    fn len(&self) -> usize;

    /// Returns true if the collection is currently empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The structural-change event stream.
    fn changes(&self) -> &EventSource<CollectionChange<T>>;
}

/// An ordered, randomly-indexable observable collection.
pub struct ObservableVec<T> {
    items: RefCell<Vec<T>>,
    changes: EventSource<CollectionChange<T>>,
}

impl<T: Clone> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ObservableVec<T> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            changes: EventSource::new(),
        }
    }

    /// Creates a collection from initial items. No event is raised.
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items: RefCell::new(items),
            changes: EventSource::new(),
        }
    }

    /// Returns the item at `index`, if present.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    /// Appends an item, raising Add at the tail position.
    pub fn push(&self, item: T) {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.changes
            .emit(&CollectionChange::add(alloc::vec![item], Some(index)));
    }

    /// Inserts an item at `index` (clamped to the tail), raising Add.
    pub fn insert(&self, index: usize, item: T) {
        let index = {
            let mut items = self.items.borrow_mut();
            let index = index.min(items.len());
            items.insert(index, item.clone());
            index
        };
        self.changes
            .emit(&CollectionChange::add(alloc::vec![item], Some(index)));
    }

    /// Removes and returns the item at `index`, raising Remove.
    pub fn remove_at(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.changes.emit(&CollectionChange::remove(
            alloc::vec![removed.clone()],
            Some(index),
        ));
        Some(removed)
    }

    /// Removes the first item equal to `item`, raising Remove.
    ///
    /// Returns true if an item was removed.
    pub fn remove_item(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let index = {
            let mut items = self.items.borrow_mut();
            match items.iter().position(|x| x == item) {
                Some(pos) => {
                    items.remove(pos);
                    pos
                }
                None => return false,
            }
        };
        self.changes.emit(&CollectionChange::remove(
            alloc::vec![item.clone()],
            Some(index),
        ));
        true
    }

    /// Replaces the item at `index`, raising Replace.
    pub fn replace_at(&self, index: usize, item: T) -> Option<T> {
        let old = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            core::mem::replace(&mut items[index], item.clone())
        };
        self.changes
            .emit(&CollectionChange::replace(old.clone(), item, Some(index)));
        Some(old)
    }

    /// Moves the item at `from` to position `to`, raising Move.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let moved = {
            let mut items = self.items.borrow_mut();
            if from >= items.len() || to >= items.len() {
                return false;
            }
            let item = items.remove(from);
            items.insert(to, item.clone());
            item
        };
        self.changes.emit(&CollectionChange::Move {
            items: alloc::vec![moved],
            from,
            to,
        });
        true
    }

    /// Removes every item, raising Reset.
    pub fn clear(&self) {
        self.items.borrow_mut().clear();
        self.changes.emit(&CollectionChange::Reset);
    }

    /// Replaces the entire contents, raising Reset.
    pub fn set_all(&self, items: Vec<T>) {
        *self.items.borrow_mut() = items;
        self.changes.emit(&CollectionChange::Reset);
    }
}

impl<T: Clone> ObservableCollection<T> for ObservableVec<T> {
    fn snapshot(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    fn len(&self) -> usize {
        self.items.borrow().len()
    }

    fn changes(&self) -> &EventSource<CollectionChange<T>> {
        &self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;

    fn record_changes<T: Clone + 'static>(
        vec: &ObservableVec<T>,
    ) -> Rc<RefCell<Vec<CollectionChange<T>>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        vec.changes().subscribe(move |c| {
            seen_clone.borrow_mut().push(c.clone());
        });
        seen
    }

    #[test]
    fn test_push_and_snapshot() {
        let v = ObservableVec::new();
        let seen = record_changes(&v);

        v.push(1);
        v.push(2);

        assert_eq!(v.snapshot(), vec![1, 2]);
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(
            seen.borrow()[1],
            CollectionChange::add(vec![2], Some(1))
        );
    }

    #[test]
    fn test_insert_at_front() {
        let v = ObservableVec::from_items(vec!["a"]);
        let seen = record_changes(&v);

        v.insert(0, "b");

        assert_eq!(v.snapshot(), vec!["b", "a"]);
        assert_eq!(seen.borrow()[0], CollectionChange::add(vec!["b"], Some(0)));
    }

    #[test]
    fn test_remove_at() {
        let v = ObservableVec::from_items(vec![10, 20, 30]);
        let seen = record_changes(&v);

        assert_eq!(v.remove_at(1), Some(20));
        assert_eq!(v.remove_at(5), None);

        assert_eq!(v.snapshot(), vec![10, 30]);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_remove_item_first_occurrence() {
        let v = ObservableVec::from_items(vec![1, 2, 1]);

        assert!(v.remove_item(&1));
        assert_eq!(v.snapshot(), vec![2, 1]);
        assert!(!v.remove_item(&9));
    }

    #[test]
    fn test_replace_and_move() {
        let v = ObservableVec::from_items(vec![1, 2, 3]);
        let seen = record_changes(&v);

        v.replace_at(0, 9);
        assert_eq!(v.snapshot(), vec![9, 2, 3]);

        v.move_item(0, 2);
        assert_eq!(v.snapshot(), vec![2, 3, 9]);

        assert_eq!(seen.borrow().len(), 2);
        assert!(matches!(seen.borrow()[1], CollectionChange::Move { .. }));
    }

    #[test]
    fn test_clear_emits_reset() {
        let v = ObservableVec::from_items(vec![1, 2]);
        let seen = record_changes(&v);

        v.clear();

        assert!(v.is_empty());
        assert_eq!(seen.borrow()[0], CollectionChange::Reset);
    }

    #[test]
    fn test_handler_sees_post_change_state() {
        let v = Rc::new(ObservableVec::new());
        let observed_len = Rc::new(RefCell::new(0));

        let v_clone = v.clone();
        let len_clone = observed_len.clone();
        v.changes().subscribe(move |_| {
            *len_clone.borrow_mut() = v_clone.len();
        });

        v.push(1);
        assert_eq!(*observed_len.borrow(), 1);
    }
}
