#![forbid(unsafe_code)]

//! One synchronized container.
//!
//! An [`Endpoint`] is either a plain observable list or a widget-backed
//! selection view. The variant is fixed when the endpoint is built and every
//! operation dispatches on it; nothing inspects container types at runtime.
//!
//! The engine never owns container lifetime: an endpoint is a handle, and the
//! widget or caller that created the container keeps it alive.

use std::fmt;
use std::hash::Hash;

use selsync_reactive::{ListChange, ListenerResult, ObservableList, Subscription};
use selsync_widgets::{SelectionView, ViewSnapshot, normalize};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Plain,
    WidgetView,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::WidgetView => "widget",
        })
    }
}

/// A container participating in selection synchronization.
pub enum Endpoint<T> {
    /// A bare ordered, mutation-observable list.
    Plain(ObservableList<T>),
    /// A selection-capable widget, possibly with child contexts.
    WidgetView(SelectionView<T>),
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(list) => Self::Plain(list.clone()),
            Self::WidgetView(view) => Self::WidgetView(view.clone()),
        }
    }
}

impl<T> From<ObservableList<T>> for Endpoint<T> {
    fn from(list: ObservableList<T>) -> Self {
        Self::Plain(list)
    }
}

impl<T> From<SelectionView<T>> for Endpoint<T> {
    fn from(view: SelectionView<T>) -> Self {
        Self::WidgetView(view)
    }
}

/// Captured state of an endpoint, used for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSnapshot<T> {
    Plain(Vec<T>),
    WidgetView(ViewSnapshot<T>),
}

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> Endpoint<T> {
    #[must_use]
    pub fn kind(&self) -> EndpointKind {
        match self {
            Self::Plain(_) => EndpointKind::Plain,
            Self::WidgetView(_) => EndpointKind::WidgetView,
        }
    }

    /// The widget behind this endpoint, if any.
    #[must_use]
    pub fn widget(&self) -> Option<&SelectionView<T>> {
        match self {
            Self::Plain(_) => None,
            Self::WidgetView(view) => Some(view),
        }
    }

    /// Current items. For widgets this is the primary selection only.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        match self {
            Self::Plain(list) => list.items(),
            Self::WidgetView(view) => view.primary_items(),
        }
    }

    /// Everything currently selected, including child contexts.
    #[must_use]
    pub fn selected_items(&self) -> Vec<T> {
        match self {
            Self::Plain(list) => list.items(),
            Self::WidgetView(view) => view.merged_items(),
        }
    }

    /// Whether `item` is held anywhere in this endpoint.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        match self {
            Self::Plain(list) => list.contains(item),
            Self::WidgetView(view) => view.contains(item),
        }
    }

    /// Insert `item` at `index` (`None` or past-the-end appends).
    ///
    /// Returns whether the item actually landed. A widget may refuse a primary
    /// insertion for an item that belongs in a child context.
    pub fn insert_at(&self, index: Option<usize>, item: T) -> Result<bool, SyncError> {
        match self {
            Self::Plain(list) => Ok(list.insert(index.unwrap_or(usize::MAX), item)?),
            Self::WidgetView(view) => Ok(view.select(item, index)?),
        }
    }

    /// Force-select `item` into the child context it belongs to.
    ///
    /// Plain endpoints have no child contexts; this is a no-op for them.
    pub fn select_in_child_context(&self, item: T) -> Result<bool, SyncError> {
        match self {
            Self::Plain(_) => Ok(false),
            Self::WidgetView(view) => Ok(view.select_into_context(item)?),
        }
    }

    /// Remove `item`. Widgets search the primary selection first, then every
    /// child context in order. Returns `Ok(false)` if it was held nowhere.
    pub fn remove(&self, item: &T) -> Result<bool, SyncError> {
        match self {
            Self::Plain(list) => Ok(list.remove(item)?),
            Self::WidgetView(view) => {
                if !view.contains(item) {
                    return Ok(false);
                }
                view.deselect(item)?;
                Ok(true)
            }
        }
    }

    pub fn clear(&self) -> Result<(), SyncError> {
        match self {
            Self::Plain(list) => Ok(list.clear()?),
            Self::WidgetView(view) => Ok(view.clear()?),
        }
    }

    /// Subscribe to this endpoint's own changes, normalized.
    ///
    /// Widget notifications go through [`normalize`]; plain lists already
    /// speak [`ListChange`].
    pub fn on_changed(
        &self,
        callback: impl Fn(&ListChange<T>) -> ListenerResult + 'static,
    ) -> Subscription {
        match self {
            Self::Plain(list) => list.subscribe_fallible(callback),
            Self::WidgetView(view) => view.subscribe_fallible(move |event| match normalize(event) {
                Some(change) => callback(&change),
                None => Ok(()),
            }),
        }
    }

    /// Whether both endpoints wrap the same backing container.
    #[must_use]
    pub fn same_container(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a.ptr_eq(b),
            (Self::WidgetView(a), Self::WidgetView(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> EndpointSnapshot<T> {
        match self {
            Self::Plain(list) => EndpointSnapshot::Plain(list.items()),
            Self::WidgetView(view) => EndpointSnapshot::WidgetView(view.snapshot()),
        }
    }

    /// Reinstate a snapshot taken from this endpoint. Mismatched snapshot
    /// kinds are ignored.
    pub fn restore(&self, snapshot: &EndpointSnapshot<T>) -> Result<(), SyncError> {
        match (self, snapshot) {
            (Self::Plain(list), EndpointSnapshot::Plain(items)) => Ok(list.reset_to(items.clone())?),
            (Self::WidgetView(view), EndpointSnapshot::WidgetView(snap)) => Ok(view.restore(snap)?),
            _ => Ok(()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(list) => f.debug_tuple("Plain").field(list).finish(),
            Self::WidgetView(view) => f.debug_tuple("WidgetView").field(view).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn grouped_view() -> SelectionView<u32> {
        let view = SelectionView::new();
        let low = view.add_context("low");
        let high = view.add_context("high");
        view.set_placement(move |n: &u32| match *n {
            0..10 => None,
            10..20 => Some(low),
            _ => Some(high),
        });
        view
    }

    #[test]
    fn kind_is_fixed_by_variant() {
        let plain: Endpoint<u32> = ObservableList::new().into();
        let widget: Endpoint<u32> = SelectionView::new().into();
        assert_eq!(plain.kind(), EndpointKind::Plain);
        assert_eq!(widget.kind(), EndpointKind::WidgetView);
        assert!(plain.widget().is_none());
        assert!(widget.widget().is_some());
    }

    #[test]
    fn widget_items_vs_selected_items() {
        let view = grouped_view();
        view.select_many([1, 11, 21]).unwrap();
        let ep = Endpoint::from(view);
        assert_eq!(ep.items(), vec![1]);
        assert_eq!(ep.selected_items(), vec![1, 11, 21]);
    }

    #[test]
    fn insert_reports_whether_item_landed() {
        let ep = Endpoint::from(grouped_view());
        assert!(ep.insert_at(None, 5).unwrap());
        assert!(!ep.insert_at(None, 15).unwrap());
        assert!(ep.select_in_child_context(15).unwrap());
        assert_eq!(ep.selected_items(), vec![5, 15]);
    }

    #[test]
    fn remove_searches_child_contexts() {
        let view = grouped_view();
        view.select_many([1, 11, 21]).unwrap();
        let ep = Endpoint::from(view.clone());

        assert!(ep.remove(&21).unwrap());
        assert_eq!(view.primary_items(), vec![1]);
        assert!(!ep.remove(&99).unwrap());
    }

    #[test]
    fn on_changed_normalizes_widget_events() {
        let view = grouped_view();
        let ep = Endpoint::from(view.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = ep.on_changed(move |c| {
            l.borrow_mut().push(c.clone());
            Ok(())
        });

        view.select_in_context(view.placement_of(&12).unwrap(), 12).unwrap();
        view.clear().unwrap();
        assert_eq!(
            *log.borrow(),
            vec![ListChange::append(vec![12]), ListChange::Reset]
        );
    }

    #[test]
    fn same_container_compares_identity() {
        let list = ObservableList::from_vec(vec![1u32]);
        let a = Endpoint::from(list.clone());
        let b = Endpoint::from(list);
        let c = Endpoint::from(ObservableList::from_vec(vec![1u32]));
        assert!(a.same_container(&b));
        assert!(!a.same_container(&c));
        assert!(!a.same_container(&Endpoint::from(SelectionView::new())));
    }

    #[test]
    fn snapshot_and_restore() {
        let ep = Endpoint::from(ObservableList::from_vec(vec![1u32, 2]));
        let snap = ep.snapshot();
        ep.clear().unwrap();
        ep.restore(&snap).unwrap();
        assert_eq!(ep.items(), vec![1, 2]);
    }
}
