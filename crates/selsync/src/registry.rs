#![forbid(unsafe_code)]

//! Registered endpoints, in registration order.
//!
//! Each entry keeps the endpoint together with its optional filter and the
//! subscription to its native change notifications; dropping the entry tears
//! the subscription down.

use std::fmt;
use std::hash::Hash;

use selsync_reactive::Subscription;

use crate::endpoint::{Endpoint, EndpointKind};
use crate::filter::{self, ItemFilter};

/// Identifier of a registered endpoint, unique within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u64);

impl EndpointId {
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep#{}", self.0)
    }
}

struct Entry<T> {
    id: EndpointId,
    endpoint: Endpoint<T>,
    filter: Option<ItemFilter<T>>,
    _subscription: Subscription,
}

/// Detached view of one registered endpoint, safe to use while the registry
/// itself is not borrowed.
pub(crate) struct Peer<T> {
    pub(crate) id: EndpointId,
    pub(crate) endpoint: Endpoint<T>,
    pub(crate) filter: Option<ItemFilter<T>>,
}

impl<T> Peer<T> {
    pub(crate) fn accepts(&self, item: &T) -> bool {
        filter::accepts(self.filter.as_ref(), item)
    }
}

/// Where a newly registered endpoint copies its initial contents from.
pub(crate) struct SeedSource<T> {
    pub(crate) id: EndpointId,
    pub(crate) items: Vec<T>,
}

/// Ordered list of registered endpoints.
///
/// # Invariants
///
/// - Entries are kept in registration order.
/// - No two entries wrap the same backing container.
/// - Ids are never reused within one registry.
pub(crate) struct Registry<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> EndpointId {
        let id = EndpointId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn push(
        &mut self,
        id: EndpointId,
        endpoint: Endpoint<T>,
        filter: Option<ItemFilter<T>>,
        subscription: Subscription,
    ) {
        self.entries.push(Entry {
            id,
            endpoint,
            filter,
            _subscription: subscription,
        });
    }

    /// Remove an entry, dropping its subscription. Returns whether it existed.
    pub(crate) fn remove(&mut self, id: EndpointId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(at) => {
                self.entries.remove(at);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub(crate) fn contains(&self, id: EndpointId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Ids in registration order.
    #[must_use]
    pub(crate) fn ids(&self) -> Vec<EndpointId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    #[must_use]
    pub(crate) fn endpoint(&self, id: EndpointId) -> Option<&Endpoint<T>> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.endpoint)
    }

    /// The id under which `endpoint`'s backing container is registered.
    #[must_use]
    pub(crate) fn find(&self, endpoint: &Endpoint<T>) -> Option<EndpointId> {
        self.entries
            .iter()
            .find(|e| e.endpoint.same_container(endpoint))
            .map(|e| e.id)
    }

    pub(crate) fn peer(&self, id: EndpointId) -> Option<Peer<T>> {
        self.entries.iter().find(|e| e.id == id).map(Entry::detach)
    }

    /// Every endpoint except `sender`, in registration order.
    pub(crate) fn peers_except(&self, sender: EndpointId) -> Vec<Peer<T>> {
        self.entries
            .iter()
            .filter(|e| e.id != sender)
            .map(Entry::detach)
            .collect()
    }

    /// Pick the seeding source for the most recently registered endpoint.
    ///
    /// 1. Default to the first-registered endpoint.
    /// 2. The first plain endpoint registered strictly between the first and
    ///    the newest one overrides it.
    /// 3. A widget source contributes its merged selection across every child
    ///    context, not just its primary selection.
    ///
    /// Returns `None` when the newest endpoint is the only one.
    pub(crate) fn seed_source(&self) -> Option<SeedSource<T>> {
        let [first, middle @ .., _newest] = self.entries.as_slice() else {
            return None;
        };
        let source = middle
            .iter()
            .find(|e| e.endpoint.kind() == EndpointKind::Plain)
            .unwrap_or(first);
        Some(SeedSource {
            id: source.id,
            items: source.endpoint.selected_items(),
        })
    }
}

impl<T: Clone> Entry<T> {
    fn detach(&self) -> Peer<T> {
        Peer {
            id: self.id,
            endpoint: self.endpoint.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("ids", &self.entries.iter().map(|e| e.id).collect::<Vec<_>>())
            .finish()
    }
}
