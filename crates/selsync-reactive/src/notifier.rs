#![forbid(unsafe_code)]

//! Ordered subscriber list with RAII unsubscription.
//!
//! # Failure Modes
//!
//! - Listener failure: every remaining listener still runs, the first error is
//!   returned from [`Notifier::notify`].
//! - Listener panic: propagates to the caller of `notify()`.
//! - Subscription dropped mid-notification: the callback still runs for the
//!   current cycle (it was already collected) but never again.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{ListenerError, ListenerResult};

struct Slot<E> {
    callback: Box<dyn Fn(&E) -> ListenerResult>,
}

/// RAII guard for a subscriber callback.
///
/// The notifier only holds a `Weak` reference to the callback; this guard
/// holds the strong one. Dropping it disconnects the subscriber.
#[must_use = "dropping a Subscription immediately unsubscribes the callback"]
pub struct Subscription {
    _slot: Rc<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Ordered list of subscribers for events of type `E`.
pub struct Notifier<E> {
    slots: RefCell<Vec<Weak<Slot<E>>>>,
}

impl<E: 'static> Notifier<E> {
    /// Create a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }

    /// Subscribe an infallible callback.
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        self.subscribe_fallible(move |event| {
            callback(event);
            Ok(())
        })
    }

    /// Subscribe a callback whose failure is reported back to the notifying
    /// mutator.
    pub fn subscribe_fallible(
        &self,
        callback: impl Fn(&E) -> ListenerResult + 'static,
    ) -> Subscription {
        let slot = Rc::new(Slot {
            callback: Box::new(callback),
        });
        self.slots.borrow_mut().push(Rc::downgrade(&slot));
        Subscription { _slot: slot }
    }

    /// Deliver `event` to every live subscriber in registration order.
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe or
    /// drop subscriptions without invalidating the current cycle.
    pub fn notify(&self, event: &E) -> ListenerResult {
        let live: Vec<Rc<Slot<E>>> = {
            let mut slots = self.slots.borrow_mut();
            slots.retain(|slot| slot.strong_count() > 0);
            slots.iter().filter_map(Weak::upgrade).collect()
        };

        let mut first: Option<ListenerError> = None;
        for slot in live {
            if let Err(err) = (slot.callback)(event) {
                match first {
                    None => first = Some(err),
                    Some(_) => tracing::debug!(error = %err, "additional listener failure"),
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }
}

impl<E: 'static> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count();
        f.debug_struct("Notifier").field("subscribers", &live).finish()
    }
}
