#![forbid(unsafe_code)]

//! Ordered, duplicate-free, mutation-observable list.
//!
//! `ObservableList<T>` is the "plain" container of the selection engine: a
//! cheap-to-clone handle over shared state that reports every effective
//! mutation as a [`ListChange`].
//!
//! # Usage
//!
//! ```
//! use selsync_reactive::{ListChange, ObservableList};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let list = ObservableList::from_vec(vec!["a", "b"]);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let s = Rc::clone(&seen);
//! let _sub = list.subscribe(move |change| s.borrow_mut().push(change.clone()));
//!
//! list.push("c").unwrap();
//! assert_eq!(list.items(), vec!["a", "b", "c"]);
//! assert_eq!(
//!     seen.borrow()[0],
//!     ListChange::Add { items: vec!["c"], index: Some(2) }
//! );
//! ```
//!
//! # Invariants
//!
//! 1. The list never holds two equal items.
//! 2. Version increments exactly once per effective mutation.
//! 3. No-op mutations (inserting a present item, removing an absent one)
//!    emit nothing. `clear()` is the exception: it always emits `Reset`.
//! 4. The mutation is committed before listeners run; a listener failure is
//!    returned to the mutator but never undoes the mutation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::change::ListChange;
use crate::error::{ListenerError, ListenerResult};
use crate::notifier::{Notifier, Subscription};

struct ListInner<T> {
    items: RefCell<Vec<T>>,
    version: Cell<u64>,
    notifier: Notifier<ListChange<T>>,
}

/// Shared, observable, duplicate-free list.
pub struct ObservableList<T> {
    inner: Rc<ListInner<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ObservableList<T> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list from `items`. Later duplicates are dropped.
    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(ListInner {
                items: RefCell::new(dedup(items)),
                version: Cell::new(0),
                notifier: Notifier::new(),
            }),
        }
    }

    /// Snapshot of the current items.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    /// Borrow the items without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.inner.items.borrow().contains(item)
    }

    #[must_use]
    pub fn position(&self, item: &T) -> Option<usize> {
        self.inner.items.borrow().iter().position(|i| i == item)
    }

    /// Mutation counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Append `item`. Returns `Ok(false)` if it was already present.
    pub fn push(&self, item: T) -> Result<bool, ListenerError> {
        self.insert(usize::MAX, item)
    }

    /// Insert `item` at `index`, clamped to the current length.
    ///
    /// Returns `Ok(false)` without notifying if the item is already present.
    pub fn insert(&self, index: usize, item: T) -> Result<bool, ListenerError> {
        let at = {
            let mut items = self.inner.items.borrow_mut();
            if items.contains(&item) {
                return Ok(false);
            }
            let at = index.min(items.len());
            items.insert(at, item.clone());
            at
        };
        self.commit(ListChange::Add {
            items: vec![item],
            index: Some(at),
        })?;
        Ok(true)
    }

    /// Remove `item`. Returns `Ok(false)` without notifying if it was absent.
    pub fn remove(&self, item: &T) -> Result<bool, ListenerError> {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            match items.iter().position(|i| i == item) {
                Some(at) => items.remove(at),
                None => return Ok(false),
            }
        };
        self.commit(ListChange::Remove {
            items: vec![removed],
        })?;
        Ok(true)
    }

    /// Remove every present item of `targets` in one notification.
    ///
    /// Returns how many items were actually removed.
    pub fn remove_many(&self, targets: &[T]) -> Result<usize, ListenerError> {
        let removed: Vec<T> = {
            let mut items = self.inner.items.borrow_mut();
            let mut removed = Vec::new();
            for target in targets {
                if let Some(at) = items.iter().position(|i| i == target) {
                    removed.push(items.remove(at));
                }
            }
            removed
        };
        if removed.is_empty() {
            return Ok(0);
        }
        let count = removed.len();
        self.commit(ListChange::Remove { items: removed })?;
        Ok(count)
    }

    /// Replace `old` with `new` in place.
    ///
    /// Returns `Ok(false)` if `old` is absent or equal to `new`. If `new` is
    /// already present elsewhere, `old` is simply dropped so the list stays
    /// duplicate-free.
    pub fn replace(&self, old: &T, new: T) -> Result<bool, ListenerError> {
        if *old == new {
            return Ok(false);
        }
        let change = {
            let mut items = self.inner.items.borrow_mut();
            let Some(at) = items.iter().position(|i| i == old) else {
                return Ok(false);
            };
            if items.contains(&new) {
                ListChange::Remove {
                    items: vec![items.remove(at)],
                }
            } else {
                let removed = std::mem::replace(&mut items[at], new.clone());
                ListChange::Replace {
                    added: vec![new],
                    removed: vec![removed],
                }
            }
        };
        self.commit(change)?;
        Ok(true)
    }

    /// Remove everything. Always emits `Reset`, even when already empty.
    pub fn clear(&self) -> ListenerResult {
        self.inner.items.borrow_mut().clear();
        self.commit(ListChange::Reset)
    }

    /// Reload the whole list (later duplicates dropped) and emit `Reset`.
    pub fn reset_to(&self, items: Vec<T>) -> ListenerResult {
        *self.inner.items.borrow_mut() = dedup(items);
        self.commit(ListChange::Reset)
    }

    /// Subscribe an infallible change listener.
    pub fn subscribe(&self, callback: impl Fn(&ListChange<T>) + 'static) -> Subscription {
        self.inner.notifier.subscribe(callback)
    }

    /// Subscribe a listener whose failure is returned to the mutator.
    pub fn subscribe_fallible(
        &self,
        callback: impl Fn(&ListChange<T>) -> ListenerResult + 'static,
    ) -> Subscription {
        self.inner.notifier.subscribe_fallible(callback)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.notifier.subscriber_count()
    }

    /// Whether two handles share the same backing list.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn commit(&self, change: ListChange<T>) -> ListenerResult {
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.notifier.notify(&change)
    }
}

impl<T: Clone + PartialEq + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("items", &*self.inner.items.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + PartialEq + 'static>(
        list: &ObservableList<T>,
    ) -> (Rc<RefCell<Vec<ListChange<T>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = list.subscribe(move |c| l.borrow_mut().push(c.clone()));
        (log, sub)
    }

    #[test]
    fn from_vec_drops_duplicates() {
        let list = ObservableList::from_vec(vec![1, 2, 1, 3, 2]);
        assert_eq!(list.items(), vec![1, 2, 3]);
    }

    #[test]
    fn insert_clamps_index_to_append() {
        let list = ObservableList::from_vec(vec!['a', 'b']);
        let (log, _sub) = recorder(&list);

        assert!(list.insert(99, 'c').unwrap());
        assert_eq!(list.items(), vec!['a', 'b', 'c']);
        assert_eq!(
            log.borrow()[0],
            ListChange::Add {
                items: vec!['c'],
                index: Some(2)
            }
        );
    }

    #[test]
    fn insert_duplicate_is_silent_noop() {
        let list = ObservableList::from_vec(vec![1]);
        let (log, _sub) = recorder(&list);

        assert!(!list.insert(0, 1).unwrap());
        assert!(log.borrow().is_empty());
        assert_eq!(list.version(), 0);
    }

    #[test]
    fn remove_absent_is_silent_noop() {
        let list = ObservableList::from_vec(vec![1]);
        let (log, _sub) = recorder(&list);
        assert!(!list.remove(&9).unwrap());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remove_many_batches_present_items() {
        let list = ObservableList::from_vec(vec![1, 2, 3, 4]);
        let (log, _sub) = recorder(&list);

        assert_eq!(list.remove_many(&[4, 9, 2]).unwrap(), 2);
        assert_eq!(list.items(), vec![1, 3]);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0], ListChange::Remove { items: vec![4, 2] });
    }

    #[test]
    fn replace_in_place() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (log, _sub) = recorder(&list);

        assert!(list.replace(&2, 20).unwrap());
        assert_eq!(list.items(), vec![1, 20, 3]);
        assert_eq!(
            log.borrow()[0],
            ListChange::Replace {
                added: vec![20],
                removed: vec![2]
            }
        );
    }

    #[test]
    fn replace_with_present_item_only_removes() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        assert!(list.replace(&1, 3).unwrap());
        assert_eq!(list.items(), vec![2, 3]);
    }

    #[test]
    fn clear_always_emits_reset() {
        let list = ObservableList::<u8>::new();
        let (log, _sub) = recorder(&list);
        list.clear().unwrap();
        assert_eq!(*log.borrow(), vec![ListChange::Reset]);
        assert_eq!(list.version(), 1);
    }

    #[test]
    fn reset_to_reloads_and_dedups() {
        let list = ObservableList::from_vec(vec![1]);
        let (log, _sub) = recorder(&list);
        list.reset_to(vec![5, 6, 5]).unwrap();
        assert_eq!(list.items(), vec![5, 6]);
        assert_eq!(*log.borrow(), vec![ListChange::Reset]);
    }

    #[test]
    fn listener_failure_reaches_mutator_after_commit() {
        let list = ObservableList::from_vec(vec![1]);
        let _sub = list.subscribe_fallible(|_| Err(ListenerError::new("rejected")));

        let err = list.push(2).unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert_eq!(list.items(), vec![1, 2], "mutation stays committed");
    }

    #[test]
    fn listener_can_read_list_during_notification() {
        let list = ObservableList::from_vec(vec![1]);
        let observed = Rc::new(Cell::new(0));
        let o = Rc::clone(&observed);
        let handle = list.clone();
        let _sub = list.subscribe(move |_| o.set(handle.len()));

        list.push(2).unwrap();
        assert_eq!(observed.get(), 2);
    }

    #[test]
    fn clones_share_state() {
        let a = ObservableList::from_vec(vec![1]);
        let b = a.clone();
        b.push(2).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.items(), vec![1, 2]);
        assert!(!a.ptr_eq(&ObservableList::from_vec(vec![1, 2])));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_holds_duplicates(ops in proptest::collection::vec((0u8..3, 0u8..8, 0usize..10), 0..64)) {
                let list = ObservableList::<u8>::new();
                for (op, item, index) in ops {
                    match op {
                        0 => { list.insert(index, item).unwrap(); }
                        1 => { list.remove(&item).unwrap(); }
                        _ => { list.replace(&item, item.wrapping_add(1) % 8).unwrap(); }
                    }
                    let items = list.items();
                    let mut sorted = items.clone();
                    sorted.sort_unstable();
                    sorted.dedup();
                    prop_assert_eq!(sorted.len(), items.len());
                }
            }
        }
    }
}
