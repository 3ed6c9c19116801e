#![forbid(unsafe_code)]

//! Conversion of native widget notifications into [`ListChange`]s.

use selsync_reactive::ListChange;

use crate::selection_view::{SelectionChanged, SelectionScope};

/// Normalize a widget selection notification.
///
/// Item identity is preserved. Additions keep their insertion index only for
/// the primary scope; child-context positions mean nothing to peers, so
/// those additions are reported as appends. Returns `None` for a
/// notification that names no items and is not a reset.
#[must_use]
pub fn normalize<T: Clone>(event: &SelectionChanged<T>) -> Option<ListChange<T>> {
    if event.reset {
        return Some(ListChange::Reset);
    }
    let index = match event.scope {
        SelectionScope::Primary => event.index,
        SelectionScope::Child(_) => None,
    };
    match (event.added.is_empty(), event.removed.is_empty()) {
        (true, true) => None,
        (false, true) => Some(ListChange::Add {
            items: event.added.clone(),
            index,
        }),
        (true, false) => Some(ListChange::Remove {
            items: event.removed.clone(),
        }),
        (false, false) => Some(ListChange::Replace {
            added: event.added.clone(),
            removed: event.removed.clone(),
        }),
    }
}
