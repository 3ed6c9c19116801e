#![forbid(unsafe_code)]

//! Widget-backed selection with nested child contexts.
//!
//! A `SelectionView` owns a primary selection plus zero or more child
//! contexts. Each scope is an independent, ordered, duplicate-free list. An
//! item is selected in at most one scope at a time.
//!
//! # Placement
//!
//! Grouped widgets decide where an item may be selected: rows that belong to a
//! sub-grid can only be selected inside that sub-grid's context. A placement
//! function (`item -> Option<ChildContextId>`) captures that rule. A plain
//! [`SelectionView::select`] of a placed item into the primary selection does
//! not land; [`SelectionView::select_into_context`] force-selects it where it
//! belongs.
//!
//! # Invariants
//!
//! 1. An item is selected in at most one scope.
//! 2. Every effective mutation raises exactly one [`SelectionChanged`] per
//!    affected scope; `clear()` and `restore()` raise a single reset.
//! 3. Removal searches the primary selection first, then child contexts in
//!    creation order.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `UnknownContext` | Stale or foreign `ChildContextId` | No mutation |
//! | `NoChildContexts` | Force-select on a view without contexts | No mutation |
//! | `ItemNotSelected` | `deselect` of an item absent from every scope | No mutation |
//! | `Listener` | A subscriber failed | Mutation stays committed |

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashSet;
use selsync_reactive::{ListenerError, ListenerResult, Notifier, Subscription};

/// Handle to a child context, stable for the lifetime of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildContextId(usize);

impl ChildContextId {
    /// Position of the context in creation order.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ChildContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Where inside a view an item is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionScope {
    Primary,
    Child(ChildContextId),
}

/// Native selection-changed notification, one per affected scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChanged<T> {
    pub scope: SelectionScope,
    pub added: Vec<T>,
    pub removed: Vec<T>,
    /// Insertion position of `added` inside `scope`, when known.
    pub index: Option<usize>,
    /// Every scope was wiped or reloaded; `added`/`removed` are not listed.
    pub reset: bool,
}

impl<T> SelectionChanged<T> {
    fn added(scope: SelectionScope, added: Vec<T>, index: Option<usize>) -> Self {
        Self {
            scope,
            added,
            removed: Vec::new(),
            index,
            reset: false,
        }
    }

    fn removed(scope: SelectionScope, removed: Vec<T>) -> Self {
        Self {
            scope,
            added: Vec::new(),
            removed,
            index: None,
            reset: false,
        }
    }

    fn reset() -> Self {
        Self {
            scope: SelectionScope::Primary,
            added: Vec::new(),
            removed: Vec::new(),
            index: None,
            reset: true,
        }
    }
}

/// Errors from selection view operations.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("unknown child context {0}")]
    UnknownContext(ChildContextId),
    #[error("view has no child contexts to select into")]
    NoChildContexts,
    #[error("item is not selected in the primary selection or any child context")]
    ItemNotSelected,
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Captured selection state of a view, used to roll back a failed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot<T> {
    primary: Vec<T>,
    contexts: Vec<Vec<T>>,
}

impl<T> ViewSnapshot<T> {
    #[must_use]
    pub fn primary(&self) -> &[T] {
        &self.primary
    }

    #[must_use]
    pub fn contexts(&self) -> &[Vec<T>] {
        &self.contexts
    }
}

type Placement<T> = Rc<dyn Fn(&T) -> Option<ChildContextId>>;

struct ChildContext<T> {
    label: String,
    items: Vec<T>,
}

struct ViewState<T> {
    primary: Vec<T>,
    contexts: Vec<ChildContext<T>>,
}

impl<T: PartialEq> ViewState<T> {
    fn locate(&self, item: &T) -> Option<SelectionScope> {
        if self.primary.contains(item) {
            return Some(SelectionScope::Primary);
        }
        self.contexts
            .iter()
            .position(|ctx| ctx.items.contains(item))
            .map(|i| SelectionScope::Child(ChildContextId(i)))
    }

    fn scope_mut(&mut self, scope: SelectionScope) -> Result<&mut Vec<T>, ViewError> {
        match scope {
            SelectionScope::Primary => Ok(&mut self.primary),
            SelectionScope::Child(id) => self
                .contexts
                .get_mut(id.0)
                .map(|ctx| &mut ctx.items)
                .ok_or(ViewError::UnknownContext(id)),
        }
    }
}

struct ViewInner<T> {
    state: RefCell<ViewState<T>>,
    placement: RefCell<Option<Placement<T>>>,
    notifier: Notifier<SelectionChanged<T>>,
}

/// Shared selection store of one widget. Clones share the same state.
pub struct SelectionView<T> {
    inner: Rc<ViewInner<T>>,
}

impl<T> Clone for SelectionView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Eq + Hash + 'static> SelectionView<T> {
    /// Create a view with an empty primary selection and no child contexts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ViewInner {
                state: RefCell::new(ViewState {
                    primary: Vec::new(),
                    contexts: Vec::new(),
                }),
                placement: RefCell::new(None),
                notifier: Notifier::new(),
            }),
        }
    }

    /// Builder form of [`set_placement`](Self::set_placement).
    #[must_use]
    pub fn with_placement(self, placement: impl Fn(&T) -> Option<ChildContextId> + 'static) -> Self {
        self.set_placement(placement);
        self
    }

    /// Install the rule deciding which child context an item belongs to.
    pub fn set_placement(&self, placement: impl Fn(&T) -> Option<ChildContextId> + 'static) {
        *self.inner.placement.borrow_mut() = Some(Rc::new(placement));
    }

    /// Child context an item is placed in, if any.
    #[must_use]
    pub fn placement_of(&self, item: &T) -> Option<ChildContextId> {
        let placement = self.inner.placement.borrow().clone();
        placement.and_then(|place| place(item))
    }

    // --- Child contexts ---

    /// Add a child context (e.g. a nested sub-grid). Returns its handle.
    pub fn add_context(&self, label: impl Into<String>) -> ChildContextId {
        let mut state = self.inner.state.borrow_mut();
        state.contexts.push(ChildContext {
            label: label.into(),
            items: Vec::new(),
        });
        ChildContextId(state.contexts.len() - 1)
    }

    #[must_use]
    pub fn context_count(&self) -> usize {
        self.inner.state.borrow().contexts.len()
    }

    #[must_use]
    pub fn context_label(&self, id: ChildContextId) -> Option<String> {
        self.inner
            .state
            .borrow()
            .contexts
            .get(id.0)
            .map(|ctx| ctx.label.clone())
    }

    // --- Queries ---

    #[must_use]
    pub fn primary_items(&self) -> Vec<T> {
        self.inner.state.borrow().primary.clone()
    }

    pub fn context_items(&self, id: ChildContextId) -> Result<Vec<T>, ViewError> {
        self.inner
            .state
            .borrow()
            .contexts
            .get(id.0)
            .map(|ctx| ctx.items.clone())
            .ok_or(ViewError::UnknownContext(id))
    }

    /// Every selected item: primary first, then each child context in
    /// creation order, without duplicates.
    #[must_use]
    pub fn merged_items(&self) -> Vec<T> {
        let state = self.inner.state.borrow();
        let mut seen = AHashSet::new();
        state
            .primary
            .iter()
            .chain(state.contexts.iter().flat_map(|ctx| ctx.items.iter()))
            .filter(|item| seen.insert(*item))
            .cloned()
            .collect()
    }

    /// Whether `item` is selected in any scope.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.locate(item).is_some()
    }

    #[must_use]
    pub fn locate(&self, item: &T) -> Option<SelectionScope> {
        self.inner.state.borrow().locate(item)
    }

    // --- Mutation ---

    /// Select `item` in the primary selection at `index` (clamped; `None`
    /// appends).
    ///
    /// Returns `Ok(false)` without notifying when the item is already selected
    /// somewhere or placement routes it to a child context.
    pub fn select(&self, item: T, index: Option<usize>) -> Result<bool, ViewError> {
        if self.placement_of(&item).is_some() {
            return Ok(false);
        }
        let at = {
            let mut state = self.inner.state.borrow_mut();
            if state.locate(&item).is_some() {
                return Ok(false);
            }
            let at = index.map_or(state.primary.len(), |i| i.min(state.primary.len()));
            state.primary.insert(at, item.clone());
            at
        };
        self.emit(SelectionChanged::added(
            SelectionScope::Primary,
            vec![item],
            Some(at),
        ))?;
        Ok(true)
    }

    /// Select `item` inside a specific child context.
    pub fn select_in_context(&self, id: ChildContextId, item: T) -> Result<bool, ViewError> {
        {
            let mut state = self.inner.state.borrow_mut();
            if id.0 >= state.contexts.len() {
                return Err(ViewError::UnknownContext(id));
            }
            if state.locate(&item).is_some() {
                return Ok(false);
            }
            state.contexts[id.0].items.push(item.clone());
        }
        self.emit(SelectionChanged::added(
            SelectionScope::Child(id),
            vec![item],
            None,
        ))?;
        Ok(true)
    }

    /// Force-select `item` into the child context placement assigns it to,
    /// or the first child context when placement has no opinion.
    pub fn select_into_context(&self, item: T) -> Result<bool, ViewError> {
        let target = match self.placement_of(&item) {
            Some(id) => id,
            None if self.context_count() > 0 => ChildContextId(0),
            None => return Err(ViewError::NoChildContexts),
        };
        self.select_in_context(target, item)
    }

    /// Interactive multi-select: every item goes where placement puts it.
    ///
    /// Raises one notification per affected scope, primary first, then child
    /// contexts in creation order. Returns how many items landed. If placement
    /// names a context that does not exist, nothing is selected.
    pub fn select_many(&self, items: impl IntoIterator<Item = T>) -> Result<usize, ViewError> {
        let placement = self.inner.placement.borrow().clone();

        // Route everything first so an unknown context fails before any scope
        // is touched.
        let mut routed: Vec<(Option<ChildContextId>, T)> = Vec::new();
        {
            let state = self.inner.state.borrow();
            for item in items {
                if state.locate(&item).is_some() || routed.iter().any(|(_, i)| *i == item) {
                    continue;
                }
                let target = placement.as_ref().and_then(|place| place(&item));
                if let Some(id) = target
                    && id.0 >= state.contexts.len()
                {
                    return Err(ViewError::UnknownContext(id));
                }
                routed.push((target, item));
            }
        }

        let mut primary_added = Vec::new();
        let mut primary_at = None;
        let mut ctx_added: Vec<(ChildContextId, Vec<T>)> = Vec::new();
        {
            let mut state = self.inner.state.borrow_mut();
            for (target, item) in routed {
                match target {
                    Some(id) => {
                        let Some(ctx) = state.contexts.get_mut(id.0) else {
                            continue;
                        };
                        ctx.items.push(item.clone());
                        match ctx_added.iter_mut().find(|(cid, _)| *cid == id) {
                            Some((_, bucket)) => bucket.push(item),
                            None => ctx_added.push((id, vec![item])),
                        }
                    }
                    None => {
                        primary_at.get_or_insert(state.primary.len());
                        state.primary.push(item.clone());
                        primary_added.push(item);
                    }
                }
            }
        }

        ctx_added.sort_by_key(|(id, _)| *id);
        let landed = primary_added.len() + ctx_added.iter().map(|(_, v)| v.len()).sum::<usize>();

        let mut first_err: Option<ListenerError> = None;
        if !primary_added.is_empty() {
            let event = SelectionChanged::added(SelectionScope::Primary, primary_added, primary_at);
            if let Err(err) = self.inner.notifier.notify(&event) {
                first_err.get_or_insert(err);
            }
        }
        for (id, added) in ctx_added {
            let event = SelectionChanged::added(SelectionScope::Child(id), added, None);
            if let Err(err) = self.inner.notifier.notify(&event) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(landed),
        }
    }

    /// Deselect `item`, searching the primary selection first and then every
    /// child context in creation order. Returns the scope it was found in.
    pub fn deselect(&self, item: &T) -> Result<SelectionScope, ViewError> {
        let (scope, removed) = {
            let mut state = self.inner.state.borrow_mut();
            let scope = state.locate(item).ok_or(ViewError::ItemNotSelected)?;
            let list = state.scope_mut(scope)?;
            let at = list
                .iter()
                .position(|i| i == item)
                .ok_or(ViewError::ItemNotSelected)?;
            (scope, list.remove(at))
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(scope = ?scope, "deselected item");
        self.emit(SelectionChanged::removed(scope, vec![removed]))?;
        Ok(scope)
    }

    /// Deselect `item` from one scope only. Returns `Ok(false)` if absent.
    pub fn deselect_in(&self, scope: SelectionScope, item: &T) -> Result<bool, ViewError> {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let list = state.scope_mut(scope)?;
            match list.iter().position(|i| i == item) {
                Some(at) => list.remove(at),
                None => return Ok(false),
            }
        };
        self.emit(SelectionChanged::removed(scope, vec![removed]))?;
        Ok(true)
    }

    /// Deselect everything in every scope with a single reset notification.
    pub fn clear(&self) -> Result<(), ViewError> {
        {
            let mut state = self.inner.state.borrow_mut();
            state.primary.clear();
            for ctx in &mut state.contexts {
                ctx.items.clear();
            }
        }
        self.emit(SelectionChanged::reset())
    }

    /// Capture the selection of every scope.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot<T> {
        let state = self.inner.state.borrow();
        ViewSnapshot {
            primary: state.primary.clone(),
            contexts: state.contexts.iter().map(|ctx| ctx.items.clone()).collect(),
        }
    }

    /// Reinstate a snapshot with a single reset notification.
    ///
    /// Contexts created after the snapshot was taken are cleared.
    pub fn restore(&self, snapshot: &ViewSnapshot<T>) -> Result<(), ViewError> {
        {
            let mut state = self.inner.state.borrow_mut();
            state.primary = snapshot.primary.clone();
            for (i, ctx) in state.contexts.iter_mut().enumerate() {
                ctx.items = snapshot.contexts.get(i).cloned().unwrap_or_default();
            }
        }
        self.emit(SelectionChanged::reset())
    }

    // --- Notification ---

    pub fn subscribe(&self, callback: impl Fn(&SelectionChanged<T>) + 'static) -> Subscription {
        self.inner.notifier.subscribe(callback)
    }

    pub fn subscribe_fallible(
        &self,
        callback: impl Fn(&SelectionChanged<T>) -> ListenerResult + 'static,
    ) -> Subscription {
        self.inner.notifier.subscribe_fallible(callback)
    }

    /// Whether two handles share the same backing view.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn emit(&self, event: SelectionChanged<T>) -> Result<(), ViewError> {
        self.inner.notifier.notify(&event).map_err(ViewError::from)
    }
}

impl<T: Clone + Eq + Hash + 'static> Default for SelectionView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for SelectionView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("SelectionView")
            .field("primary", &state.primary)
            .field(
                "contexts",
                &state
                    .contexts
                    .iter()
                    .map(|ctx| (&ctx.label, &ctx.items))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Eq + Hash + 'static>(
        view: &SelectionView<T>,
    ) -> (Rc<RefCell<Vec<SelectionChanged<T>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = view.subscribe(move |e| l.borrow_mut().push(e.clone()));
        (log, sub)
    }

    /// Two sub-grids: "even" and "odd" rows; everything >= 100 is top-level.
    fn grouped() -> (SelectionView<u32>, ChildContextId, ChildContextId) {
        let view = SelectionView::new();
        let even = view.add_context("even");
        let odd = view.add_context("odd");
        view.set_placement(move |n: &u32| match *n {
            n if n >= 100 => None,
            n if n % 2 == 0 => Some(even),
            _ => Some(odd),
        });
        (view, even, odd)
    }

    #[test]
    fn select_into_primary_at_index() {
        let view = SelectionView::new();
        let (log, _sub) = recorder(&view);

        assert!(view.select('a', None).unwrap());
        assert!(view.select('b', Some(0)).unwrap());
        assert_eq!(view.primary_items(), vec!['b', 'a']);
        assert_eq!(log.borrow()[1].index, Some(0));
        assert_eq!(log.borrow()[1].scope, SelectionScope::Primary);
    }

    #[test]
    fn placed_item_does_not_land_in_primary() {
        let (view, even, _) = grouped();
        let (log, _sub) = recorder(&view);

        assert!(!view.select(4, None).unwrap());
        assert!(log.borrow().is_empty());

        assert!(view.select_into_context(4).unwrap());
        assert_eq!(view.context_items(even).unwrap(), vec![4]);
        assert_eq!(log.borrow()[0].scope, SelectionScope::Child(even));
    }

    #[test]
    fn select_into_context_falls_back_to_first_context() {
        let view = SelectionView::new();
        let first = view.add_context("first");
        view.add_context("second");
        assert!(view.select_into_context('x').unwrap());
        assert_eq!(view.context_items(first).unwrap(), vec!['x']);
    }

    #[test]
    fn select_into_context_without_contexts_fails() {
        let view = SelectionView::<u8>::new();
        assert!(matches!(
            view.select_into_context(1),
            Err(ViewError::NoChildContexts)
        ));
    }

    #[test]
    fn an_item_lives_in_one_scope() {
        let view = SelectionView::new();
        let ctx = view.add_context("ctx");
        view.select(1, None).unwrap();
        assert!(!view.select_in_context(ctx, 1).unwrap());
        assert_eq!(view.merged_items(), vec![1]);
    }

    #[test]
    fn merged_items_orders_primary_then_contexts() {
        let (view, even, odd) = grouped();
        view.select_in_context(odd, 3).unwrap();
        view.select_in_context(even, 2).unwrap();
        view.select(100, None).unwrap();
        assert_eq!(view.merged_items(), vec![100, 2, 3]);
    }

    #[test]
    fn deselect_searches_child_contexts_in_order() {
        let (view, even, odd) = grouped();
        view.select(100, None).unwrap();
        view.select_in_context(even, 2).unwrap();
        view.select_in_context(odd, 3).unwrap();

        assert_eq!(view.deselect(&3).unwrap(), SelectionScope::Child(odd));
        assert_eq!(view.primary_items(), vec![100]);
        assert_eq!(view.context_items(even).unwrap(), vec![2]);
        assert!(view.context_items(odd).unwrap().is_empty());
    }

    #[test]
    fn deselect_missing_item_is_an_error() {
        let (view, _, _) = grouped();
        assert!(matches!(view.deselect(&7), Err(ViewError::ItemNotSelected)));
    }

    #[test]
    fn select_many_emits_one_event_per_scope() {
        let (view, even, odd) = grouped();
        let (log, _sub) = recorder(&view);

        assert_eq!(view.select_many([101, 2, 3, 4, 100]).unwrap(), 5);
        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].scope, SelectionScope::Primary);
        assert_eq!(log[0].added, vec![101, 100]);
        assert_eq!(log[0].index, Some(0));
        assert_eq!(log[1].scope, SelectionScope::Child(even));
        assert_eq!(log[1].added, vec![2, 4]);
        assert_eq!(log[2].scope, SelectionScope::Child(odd));
    }

    #[test]
    fn clear_raises_single_reset() {
        let (view, _, _) = grouped();
        view.select_many([1, 2, 100]).unwrap();
        let (log, _sub) = recorder(&view);

        view.clear().unwrap();
        assert!(view.merged_items().is_empty());
        assert_eq!(log.borrow().len(), 1);
        assert!(log.borrow()[0].reset);
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let (view, even, _) = grouped();
        view.select_many([1, 2, 100]).unwrap();
        let snap = view.snapshot();

        view.deselect(&2).unwrap();
        view.select(200, None).unwrap();
        view.restore(&snap).unwrap();

        assert_eq!(view.primary_items(), vec![100]);
        assert_eq!(view.context_items(even).unwrap(), vec![2]);
        assert_eq!(view.snapshot(), snap);
    }

    #[test]
    fn unknown_context_is_rejected() {
        let view = SelectionView::<u8>::new();
        let other = SelectionView::<u8>::new();
        let foreign = other.add_context("x");
        assert!(matches!(
            view.select_in_context(foreign, 1),
            Err(ViewError::UnknownContext(_))
        ));
        assert!(view.context_items(foreign).is_err());
    }

    #[test]
    fn listener_failure_is_reported() {
        let view = SelectionView::new();
        let _sub = view.subscribe_fallible(|_| Err(ListenerError::new("nope")));
        let err = view.select(1, None).unwrap_err();
        assert!(matches!(err, ViewError::Listener(_)));
        assert!(view.contains(&1));
    }

    #[test]
    fn labels_and_debug() {
        let view = SelectionView::<u8>::new();
        let ctx = view.add_context("details");
        assert_eq!(view.context_label(ctx).as_deref(), Some("details"));
        assert_eq!(ctx.to_string(), "ctx#0");
        assert!(format!("{view:?}").contains("details"));
    }

    #[test]
    fn select_many_with_unknown_context_selects_nothing() {
        let view = SelectionView::new();
        let _only = view.add_context("only");
        view.set_placement(|n: &u32| (*n >= 100).then_some(ChildContextId(5)));
        let (log, _sub) = recorder(&view);

        let err = view.select_many([1, 100]).unwrap_err();
        assert!(matches!(err, ViewError::UnknownContext(id) if id == ChildContextId(5)));
        assert!(view.primary_items().is_empty(), "earlier items are not committed");
        assert!(view.merged_items().is_empty());
        assert!(log.borrow().is_empty(), "nothing selected, nothing announced");
    }

    #[test]
    fn select_many_skips_duplicates_within_one_batch() {
        let (view, even, _) = grouped();
        assert_eq!(view.select_many([2, 2, 100, 100]).unwrap(), 2);
        assert_eq!(view.context_items(even).unwrap(), vec![2]);
        assert_eq!(view.primary_items(), vec![100]);
    }
}
