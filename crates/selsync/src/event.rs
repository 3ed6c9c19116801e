#![forbid(unsafe_code)]

//! The aggregate "synchronized" event.

use selsync_reactive::ListChange;

use crate::registry::EndpointId;

/// Emitted once per completed propagation round.
///
/// Observers that are not themselves endpoints (a details panel, a status
/// bar) subscribe to this instead of to every container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synchronized<T> {
    /// The change as it was propagated (after any veto).
    pub change: ListChange<T>,
    /// The endpoint the change originated from.
    pub sender: EndpointId,
}
