#![forbid(unsafe_code)]

//! Pre-propagation veto and deferred corrective removal.
//!
//! A native widget commits an interactive selection before anyone can object
//! to it. When the user range- or toggle-selects (`SHIFT`/`CTRL` held), every
//! added item is tested against the *sender's own* filter:
//!
//! - rejected items are stripped from the addition before any peer sees
//!   them, so the rejection is global;
//! - they are already selected in the sender, so their removal from the
//!   sender is posted to the idle queue and runs on the next idle turn under
//!   both the propagation flag and the sender's suspension.
//!
//! Until that turn runs the sender shows a selection the engine is about to
//! undo. That window is expected, not an error.
//!
//! If the user deselects a vetoed item first, that removal is dropped: no
//! peer ever held the item. Deselecting it, clearing the sender, or selecting
//! the item again before the idle turn cancels its correction, so a later
//! trusted selection of the same item is never undone behind the peers' back.
//!
//! Additions made without a multi-select modifier are presumed valid and pass
//! through untouched.

use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use selsync_reactive::ListChange;

use crate::engine::SelectionSync;
use crate::error::SyncError;
use crate::guard::{FlagGuard, Suspension};
use crate::registry::{EndpointId, Peer};

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> SelectionSync<T> {
    /// Screen `change` coming from `sender` before any peer sees it.
    ///
    /// Returns `None` when nothing is left to propagate.
    pub(crate) fn screen<'a>(
        &self,
        sender: &Peer<T>,
        change: &'a ListChange<T>,
    ) -> Option<Cow<'a, ListChange<T>>> {
        match change {
            ListChange::Add { items, index } => {
                // A fresh selection supersedes any correction still queued
                // for the same item; the veto below re-arms it if needed.
                self.forget_vetoed(sender.id, items);
                self.screen_additions(sender, change, items, *index)
            }
            ListChange::Remove { items } => match self.strip_vetoed(sender.id, items) {
                None => Some(Cow::Borrowed(change)),
                Some(kept) if kept.is_empty() => None,
                Some(kept) => Some(Cow::Owned(ListChange::Remove { items: kept })),
            },
            ListChange::Replace { added, removed } => {
                let stripped = self.strip_vetoed(sender.id, removed);
                self.forget_vetoed(sender.id, added);
                let Some(removed) = stripped else {
                    return Some(Cow::Borrowed(change));
                };
                let change = match (added.is_empty(), removed.is_empty()) {
                    (true, true) => return None,
                    (false, true) => ListChange::Add {
                        items: added.clone(),
                        index: None,
                    },
                    (true, false) => ListChange::Remove { items: removed },
                    (false, false) => ListChange::Replace {
                        added: added.clone(),
                        removed,
                    },
                };
                Some(Cow::Owned(change))
            }
            ListChange::Reset => {
                self.forget_vetoed(sender.id, &[]);
                Some(Cow::Borrowed(change))
            }
        }
    }

    /// Cancel pending corrections of `sender` for `items`, or for every item
    /// when `items` is empty.
    fn forget_vetoed(&self, sender: EndpointId, items: &[T]) {
        self.inner.vetoed.borrow_mut().retain(|(owner, item)| {
            *owner != sender || !(items.is_empty() || items.contains(item))
        });
    }

    fn screen_additions<'a>(
        &self,
        sender: &Peer<T>,
        change: &'a ListChange<T>,
        items: &[T],
        index: Option<usize>,
    ) -> Option<Cow<'a, ListChange<T>>> {
        if items.is_empty()
            || !self.inner.config.multi_select_veto
            || sender.filter.is_none()
            || !self.multi_select_active()
        {
            return Some(Cow::Borrowed(change));
        }

        let (kept, vetoed): (Vec<T>, Vec<T>) =
            items.iter().cloned().partition(|item| sender.accepts(item));
        if vetoed.is_empty() {
            return Some(Cow::Borrowed(change));
        }

        tracing::warn!(
            sender = %sender.id,
            vetoed = vetoed.len(),
            kept = kept.len(),
            "multi-select additions rejected by sender filter"
        );
        self.inner
            .vetoed
            .borrow_mut()
            .extend(vetoed.iter().map(|item| (sender.id, item.clone())));
        self.schedule_correction(sender.id, vetoed);

        if kept.is_empty() {
            return None;
        }
        Some(Cow::Owned(ListChange::Add { items: kept, index }))
    }

    /// Drop removals of items that were vetoed and never propagated.
    ///
    /// `None` means no item of `items` was pending.
    fn strip_vetoed(&self, sender: EndpointId, items: &[T]) -> Option<Vec<T>> {
        let mut pending = self.inner.vetoed.borrow_mut();
        if !pending.iter().any(|(owner, _)| *owner == sender) {
            return None;
        }
        let before = pending.len();
        let kept: Vec<T> = items
            .iter()
            .filter(|item| {
                match pending
                    .iter()
                    .position(|(owner, vetoed)| *owner == sender && vetoed == *item)
                {
                    Some(at) => {
                        pending.swap_remove(at);
                        false
                    }
                    None => true,
                }
            })
            .cloned()
            .collect();
        if pending.len() == before {
            return None;
        }
        tracing::debug!(sender = %sender, dropped = before - pending.len(), "removal of vetoed items not propagated");
        Some(kept)
    }

    fn schedule_correction(&self, sender: EndpointId, items: Vec<T>) {
        let weak = Rc::downgrade(&self.inner);
        self.inner.idle.post(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match Self::from_inner(inner).correct(sender, &items) {
                Ok(removed) => {
                    tracing::debug!(sender = %sender, removed, "deferred corrective removal done");
                }
                Err(err) => {
                    tracing::warn!(sender = %sender, error = %err, "deferred corrective removal failed");
                }
            }
        });
    }

    /// Deselect vetoed items from the sender without re-triggering
    /// propagation.
    ///
    /// Only items still pending are touched: one the user deselected, cleared
    /// or selected again since the veto is no longer ours to undo.
    fn correct(&self, sender: EndpointId, items: &[T]) -> Result<usize, SyncError> {
        let pending: Vec<T> = {
            let mut vetoed = self.inner.vetoed.borrow_mut();
            let pending = items
                .iter()
                .filter(|item| vetoed.iter().any(|(owner, v)| *owner == sender && v == *item))
                .cloned()
                .collect();
            vetoed.retain(|(owner, item)| *owner != sender || !items.contains(item));
            pending
        };
        if pending.is_empty() {
            return Ok(0);
        }

        let endpoint = self
            .inner
            .registry
            .borrow()
            .endpoint(sender)
            .cloned()
            .ok_or(SyncError::NotRegistered(sender))?;

        let _propagating = FlagGuard::raise(&self.inner.propagating);
        let _suspended = Suspension::new(&self.inner.suspended, sender);

        let mut removed = 0;
        for item in &pending {
            if endpoint.remove(item)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
