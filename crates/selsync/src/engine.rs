#![forbid(unsafe_code)]

//! The synchronization core.
//!
//! [`SelectionSync`] keeps N independently owned containers mutually
//! consistent: a change on any registered endpoint (the *sender*) is applied
//! to every other endpoint (the *peers*), and one aggregate
//! [`Synchronized`] event is emitted afterwards.
//!
//! # Propagation round
//!
//! 1. Notifications from the suspended endpoint, or arriving while a round or
//!    an emission is in flight, are ignored.
//! 2. Interactive multi-select additions are screened against the sender's
//!    own filter, and removals of still-pending vetoed items are dropped
//!    (see [`veto`](crate::veto)).
//! 3. For every peer in registration order: suspend it, apply the change
//!    through its filter, lift the suspension.
//! 4. Raise `is_propagating`, emit [`Synchronized`], lower it.
//!
//! # Invariants
//!
//! 1. After a round completes, every endpoint's selection equals the sender's
//!    intersected with that endpoint's filter.
//! 2. The suspension slot is cleared before control returns to any caller.
//! 3. An engine-driven mutation never re-triggers propagation for the
//!    endpoint being mutated.
//! 4. Listeners of the synchronized event cannot start overlapping rounds.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `NotRegistered` | Unknown id passed to `unregister` | No change |
//! | `AlreadyRegistered` | Same container registered twice | No change |
//! | `RegistryBusy` | (Un)registration from inside a round or its emission | No change |
//! | `ItemNotFound` | A peer that should hold an item does not | Rolled back (default), error returned to the mutator |
//! | `Listener` (peer) | A peer's own listener failed | Rolled back (default), error returned to the mutator |
//! | `Listener` (event) | A synchronized listener failed | Peers keep the change, error returned to the mutator |
//!
//! With `rollback_on_error` off, peers updated before a failure keep the
//! change and the remaining peers are left unsynchronized.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use selsync_reactive::{IdleQueue, ListChange, ListenerError, Notifier, Subscription};
use selsync_widgets::{InputModifiers, SelectionView};

use crate::config::SyncConfig;
use crate::endpoint::{Endpoint, EndpointSnapshot};
use crate::error::SyncError;
use crate::event::Synchronized;
use crate::filter::ItemFilter;
use crate::guard::{FlagGuard, Suspension};
use crate::registry::{EndpointId, Peer, Registry};

pub(crate) struct EngineInner<T> {
    pub(crate) registry: RefCell<Registry<T>>,
    pub(crate) suspended: Cell<Option<EndpointId>>,
    pub(crate) propagating: Cell<bool>,
    pub(crate) in_round: Cell<bool>,
    synchronized: Notifier<Synchronized<T>>,
    pub(crate) config: SyncConfig,
    pub(crate) idle: IdleQueue,
    pub(crate) input: RefCell<Option<InputModifiers>>,
    /// Vetoed items still selected in their sender, awaiting correction.
    pub(crate) vetoed: RefCell<Vec<(EndpointId, T)>>,
}

/// Multi-container selection synchronization engine.
///
/// Cheap to clone; clones share the same registry. Owned by whichever UI
/// controller needs it; there is no global instance.
pub struct SelectionSync<T> {
    pub(crate) inner: Rc<EngineInner<T>>,
}

impl<T> Clone for SelectionSync<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> SelectionSync<T> {
    /// Create an engine with its own idle queue.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self::with_idle_queue(config, IdleQueue::new())
    }

    /// Create an engine that schedules deferred work on the host's queue.
    #[must_use]
    pub fn with_idle_queue(config: SyncConfig, idle: IdleQueue) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                registry: RefCell::new(Registry::new()),
                suspended: Cell::new(None),
                propagating: Cell::new(false),
                in_round: Cell::new(false),
                synchronized: Notifier::new(),
                config,
                idle,
                input: RefCell::new(None),
                vetoed: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<EngineInner<T>>) -> Self {
        Self { inner }
    }

    /// Connect the modifier state written by the host input loop.
    pub fn set_input(&self, input: InputModifiers) {
        *self.inner.input.borrow_mut() = Some(input);
    }

    // --- Registration ---

    /// Register an endpoint that accepts every item.
    ///
    /// The first endpoint keeps its contents as the baseline; every later one
    /// is cleared and seeded from the source picked by the registry.
    pub fn register(&self, endpoint: impl Into<Endpoint<T>>) -> Result<EndpointId, SyncError> {
        self.register_entry(endpoint.into(), None)
    }

    /// Register an endpoint that only ever holds items `filter` accepts.
    pub fn register_filtered(
        &self,
        endpoint: impl Into<Endpoint<T>>,
        filter: impl Fn(&T) -> bool + 'static,
    ) -> Result<EndpointId, SyncError> {
        self.register_entry(endpoint.into(), Some(ItemFilter::new(filter)))
    }

    fn register_entry(
        &self,
        endpoint: Endpoint<T>,
        filter: Option<ItemFilter<T>>,
    ) -> Result<EndpointId, SyncError> {
        self.ensure_idle_registry()?;

        let (id, seed) = {
            let mut registry = self.inner.registry.borrow_mut();
            if let Some(existing) = registry.find(&endpoint) {
                return Err(SyncError::AlreadyRegistered(existing));
            }
            let id = registry.allocate_id();
            let subscription = self.subscribe_endpoint(&endpoint, id);
            registry.push(id, endpoint.clone(), filter.clone(), subscription);
            (id, registry.seed_source())
        };

        tracing::debug!(endpoint = %id, kind = %endpoint.kind(), filtered = filter.is_some(), "registered endpoint");

        if let Some(seed) = seed {
            let peer = Peer {
                id,
                endpoint,
                filter,
            };
            if let Err(err) = self.seed(&peer, seed.id, seed.items) {
                self.inner.registry.borrow_mut().remove(id);
                tracing::error!(endpoint = %id, error = %err, "seeding failed; registration undone");
                return Err(err);
            }
        }
        Ok(id)
    }

    fn subscribe_endpoint(&self, endpoint: &Endpoint<T>, id: EndpointId) -> Subscription {
        let weak: Weak<EngineInner<T>> = Rc::downgrade(&self.inner);
        endpoint.on_changed(move |change| {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            Self::from_inner(inner)
                .handle_change(id, change)
                .map_err(ListenerError::new)
        })
    }

    /// Copy the source's items into a freshly registered endpoint.
    fn seed(&self, peer: &Peer<T>, source: EndpointId, items: Vec<T>) -> Result<(), SyncError> {
        let _suspended = Suspension::new(&self.inner.suspended, peer.id);
        peer.endpoint.clear()?;

        let mut copied = 0usize;
        for item in items {
            if !peer.accepts(&item) {
                continue;
            }
            if Self::place(peer, None, item)? {
                copied += 1;
            }
        }
        tracing::debug!(endpoint = %peer.id, source = %source, copied, "seeded endpoint");
        Ok(())
    }

    /// Unregister an endpoint, tearing down its change subscription.
    pub fn unregister(&self, id: EndpointId) -> Result<(), SyncError> {
        self.ensure_idle_registry()?;
        if !self.inner.registry.borrow_mut().remove(id) {
            return Err(SyncError::NotRegistered(id));
        }
        self.inner.vetoed.borrow_mut().retain(|(owner, _)| *owner != id);
        tracing::debug!(endpoint = %id, "unregistered endpoint");
        Ok(())
    }

    /// Unregister the endpoint wrapping `endpoint`'s container.
    pub fn unregister_endpoint(&self, endpoint: &Endpoint<T>) -> Result<EndpointId, SyncError> {
        let id = self.find(endpoint).ok_or(SyncError::UnknownContainer)?;
        self.unregister(id)?;
        Ok(id)
    }

    /// Unregister every endpoint. Returns how many were removed.
    pub fn unregister_all(&self) -> Result<usize, SyncError> {
        let ids = self.ids();
        for id in &ids {
            self.unregister(*id)?;
        }
        Ok(ids.len())
    }

    fn ensure_idle_registry(&self) -> Result<(), SyncError> {
        if self.inner.in_round.get() || self.inner.propagating.get() {
            return Err(SyncError::RegistryBusy);
        }
        Ok(())
    }

    // --- Observation ---

    /// Subscribe to the aggregate event emitted after every round.
    pub fn subscribe_synchronized(
        &self,
        callback: impl Fn(&Synchronized<T>) + 'static,
    ) -> Subscription {
        self.inner.synchronized.subscribe(callback)
    }

    /// Like [`subscribe_synchronized`](Self::subscribe_synchronized), but the
    /// listener's failure is returned to the mutator that started the round.
    pub fn subscribe_synchronized_fallible(
        &self,
        callback: impl Fn(&Synchronized<T>) -> Result<(), ListenerError> + 'static,
    ) -> Subscription {
        self.inner.synchronized.subscribe_fallible(callback)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.borrow().is_empty()
    }

    /// Registered ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<EndpointId> {
        self.inner.registry.borrow().ids()
    }

    #[must_use]
    pub fn is_registered(&self, id: EndpointId) -> bool {
        self.inner.registry.borrow().contains(id)
    }

    #[must_use]
    pub fn endpoint(&self, id: EndpointId) -> Option<Endpoint<T>> {
        self.inner.registry.borrow().endpoint(id).cloned()
    }

    /// The widget behind a registered endpoint, if it is widget-backed.
    #[must_use]
    pub fn widget(&self, id: EndpointId) -> Option<SelectionView<T>> {
        self.inner
            .registry
            .borrow()
            .endpoint(id)
            .and_then(|ep| ep.widget().cloned())
    }

    #[must_use]
    pub fn find(&self, endpoint: &Endpoint<T>) -> Option<EndpointId> {
        self.inner.registry.borrow().find(endpoint)
    }

    /// Whether the synchronized event (or a deferred correction) is running.
    #[must_use]
    pub fn is_propagating(&self) -> bool {
        self.inner.propagating.get()
    }

    /// The endpoint currently being mutated by the engine, if any.
    #[must_use]
    pub fn suspended(&self) -> Option<EndpointId> {
        self.inner.suspended.get()
    }

    /// Handle to the queue deferred corrections are posted on.
    #[must_use]
    pub fn idle_queue(&self) -> IdleQueue {
        self.inner.idle.clone()
    }

    #[must_use]
    pub fn config(&self) -> SyncConfig {
        self.inner.config
    }

    // --- Propagation ---

    /// Propagate `change`, observed on `sender`, to every other endpoint.
    ///
    /// Registered endpoints call this from their change subscription; hosts
    /// with their own event normalization may call it directly.
    pub fn handle_change(&self, sender: EndpointId, change: &ListChange<T>) -> Result<(), SyncError> {
        let inner = &self.inner;
        if inner.suspended.get() == Some(sender) {
            tracing::trace!(endpoint = %sender, "ignoring change on suspended endpoint");
            return Ok(());
        }
        if inner.propagating.get() || inner.in_round.get() {
            tracing::trace!(endpoint = %sender, "ignoring nested change during propagation");
            return Ok(());
        }

        let (source, peers) = {
            let registry = inner.registry.borrow();
            let source = registry
                .peer(sender)
                .ok_or(SyncError::NotRegistered(sender))?;
            (source, registry.peers_except(sender))
        };

        let change = match self.screen(&source, change) {
            Some(change) => change,
            None => return Ok(()),
        };

        let _span = tracing::debug_span!(
            "selection_sync_round",
            sender = %sender,
            change = %change.kind(),
            peers = peers.len()
        )
        .entered();

        self.propagate(&peers, &change)?;
        self.emit(sender, change.into_owned())
    }

    fn propagate(&self, peers: &[Peer<T>], change: &ListChange<T>) -> Result<(), SyncError> {
        let inner = &self.inner;
        let _round = FlagGuard::raise(&inner.in_round);

        let snapshots: Vec<EndpointSnapshot<T>> = if inner.config.rollback_on_error {
            peers.iter().map(|peer| peer.endpoint.snapshot()).collect()
        } else {
            Vec::new()
        };

        for (at, peer) in peers.iter().enumerate() {
            let applied = {
                let _suspended = Suspension::new(&inner.suspended, peer.id);
                self.apply(peer, change)
            };
            tracing::trace!(peer = %peer.id, ok = applied.is_ok(), "applied change to peer");

            if let Err(err) = applied {
                if inner.config.rollback_on_error {
                    tracing::error!(peer = %peer.id, error = %err, "propagation failed; rolling back");
                    self.rollback(&peers[..=at], &snapshots);
                } else {
                    tracing::error!(
                        peer = %peer.id,
                        error = %err,
                        skipped = peers.len() - at - 1,
                        "propagation failed; remaining peers left unsynchronized"
                    );
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn rollback(&self, touched: &[Peer<T>], snapshots: &[EndpointSnapshot<T>]) {
        for (peer, snapshot) in touched.iter().zip(snapshots) {
            let _suspended = Suspension::new(&self.inner.suspended, peer.id);
            if let Err(err) = peer.endpoint.restore(snapshot) {
                tracing::warn!(peer = %peer.id, error = %err, "rollback of peer failed");
            }
        }
    }

    fn apply(&self, peer: &Peer<T>, change: &ListChange<T>) -> Result<(), SyncError> {
        match change {
            ListChange::Add { items, index } => Self::insert_items(peer, items, *index),
            ListChange::Remove { items } => self.remove_items(peer, items),
            ListChange::Replace { added, removed } => {
                self.remove_items(peer, removed)?;
                Self::insert_items(peer, added, None)
            }
            ListChange::Reset => peer.endpoint.clear(),
        }
    }

    fn insert_items(peer: &Peer<T>, items: &[T], index: Option<usize>) -> Result<(), SyncError> {
        let mut at = index;
        for item in items {
            if !peer.accepts(item) || peer.endpoint.contains(item) {
                continue;
            }
            if Self::place(peer, at, item.clone())?
                && let Some(i) = at.as_mut()
            {
                *i += 1;
            }
        }
        Ok(())
    }

    /// Insert one item; if the endpoint refused it in its primary scope, force
    /// it into the child context it belongs to. Returns whether it landed.
    fn place(peer: &Peer<T>, index: Option<usize>, item: T) -> Result<bool, SyncError> {
        if peer.endpoint.insert_at(index, item.clone())? {
            return Ok(true);
        }
        if peer.endpoint.contains(&item) {
            return Ok(false);
        }
        peer.endpoint.select_in_child_context(item)
    }

    fn remove_items(&self, peer: &Peer<T>, items: &[T]) -> Result<(), SyncError> {
        for item in items {
            if peer.endpoint.remove(item)? {
                continue;
            }
            if !peer.accepts(item) {
                continue;
            }
            if self.inner.config.strict_removal {
                return Err(SyncError::ItemNotFound {
                    endpoint: peer.id,
                    item: format!("{item:?}"),
                });
            }
            tracing::warn!(peer = %peer.id, item = ?item, "removed item was not held by peer");
        }
        Ok(())
    }

    fn emit(&self, sender: EndpointId, change: ListChange<T>) -> Result<(), SyncError> {
        let _propagating = FlagGuard::raise(&self.inner.propagating);
        self.inner
            .synchronized
            .notify(&Synchronized { change, sender })
            .map_err(SyncError::from)
    }

    pub(crate) fn multi_select_active(&self) -> bool {
        self.inner
            .input
            .borrow()
            .as_ref()
            .is_some_and(InputModifiers::is_multi_select)
    }
}

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> Default for SelectionSync<T> {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl<T> fmt::Debug for SelectionSync<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionSync")
            .field("registry", &*self.inner.registry.borrow())
            .field("suspended", &self.inner.suspended.get())
            .field("propagating", &self.inner.propagating.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selsync_reactive::ObservableList;
    use tracing_test::traced_test;

    fn pair() -> (SelectionSync<u32>, ObservableList<u32>, ObservableList<u32>) {
        let sync = SelectionSync::default();
        let a = ObservableList::new();
        let b = ObservableList::new();
        sync.register(a.clone()).unwrap();
        sync.register(b.clone()).unwrap();
        (sync, a, b)
    }

    #[test]
    #[traced_test]
    fn registration_and_round_are_logged() {
        let (_sync, a, b) = pair();
        a.push(1).unwrap();
        assert_eq!(b.items(), vec![1]);
        assert!(logs_contain("registered endpoint"));
        assert!(logs_contain("seeded endpoint"));
        assert!(logs_contain("applied change to peer"));
    }

    #[test]
    #[traced_test]
    fn rollback_is_logged() {
        let (sync, _a, b) = pair();
        let sender = sync.ids()[0];
        let err = sync
            .handle_change(sender, &ListChange::Remove { items: vec![9] })
            .unwrap_err();
        assert!(matches!(err, SyncError::ItemNotFound { .. }));
        assert!(b.is_empty());
        assert!(logs_contain("rolling back"));
    }

    #[test]
    fn ignores_changes_from_suspended_endpoint() {
        let (sync, _a, b) = pair();
        let target = sync.ids()[1];
        let _suspended = Suspension::new(&sync.inner.suspended, target);
        sync.handle_change(target, &ListChange::append(vec![4])).unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn unknown_sender_is_not_registered() {
        let (sync, _a, _b) = pair();
        let ghost = EndpointId::from_raw(42);
        assert!(matches!(
            sync.handle_change(ghost, &ListChange::Reset),
            Err(SyncError::NotRegistered(id)) if id == ghost
        ));
    }

    #[test]
    fn busy_while_round_in_flight() {
        let (sync, _a, _b) = pair();
        let _round = FlagGuard::raise(&sync.inner.in_round);
        assert!(matches!(
            sync.register(ObservableList::new()),
            Err(SyncError::RegistryBusy)
        ));
    }

    #[test]
    fn seeding_failure_undoes_registration() {
        let (sync, a, _b) = pair();
        a.push(7).unwrap();
        let c = ObservableList::new();
        let _refuse = c.subscribe_fallible(|change: &ListChange<u32>| {
            if change.added().is_empty() {
                Ok(())
            } else {
                Err(ListenerError::new("full"))
            }
        });
        assert!(sync.register(c.clone()).is_err());
        assert_eq!(sync.len(), 2);
        assert_eq!(c.subscriber_count(), 1, "only the test's own listener remains");
    }

    #[test]
    fn debug_lists_registry() {
        let (sync, _a, _b) = pair();
        let dbg = format!("{sync:?}");
        assert!(dbg.contains("SelectionSync"));
        assert!(dbg.contains("propagating: false"));
    }
}
