#![forbid(unsafe_code)]

//! Per-endpoint acceptance predicates.

use std::fmt;
use std::rc::Rc;

/// Decides whether an item may ever reside in an endpoint.
pub struct ItemFilter<T> {
    predicate: Rc<dyn Fn(&T) -> bool>,
}

impl<T> Clone for ItemFilter<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Rc::clone(&self.predicate),
        }
    }
}

impl<T: 'static> ItemFilter<T> {
    pub fn new(predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Self {
            predicate: Rc::new(predicate),
        }
    }

    #[must_use]
    pub fn accept_all() -> Self {
        Self::new(|_| true)
    }

    #[inline]
    #[must_use]
    pub fn accepts(&self, item: &T) -> bool {
        (self.predicate)(item)
    }
}

impl<T> fmt::Debug for ItemFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ItemFilter(..)")
    }
}

/// An absent filter accepts everything.
pub(crate) fn accepts<T>(filter: Option<&ItemFilter<T>>, item: &T) -> bool {
    filter.is_none_or(|f| (f.predicate)(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_and_default() {
        let even = ItemFilter::new(|n: &u32| n % 2 == 0);
        assert!(even.accepts(&2));
        assert!(!even.accepts(&3));
        assert!(ItemFilter::<u32>::accept_all().accepts(&3));
        assert!(accepts(None, &3u32));
        assert!(!accepts(Some(&even), &3));
    }
}
