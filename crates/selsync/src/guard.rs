#![forbid(unsafe_code)]

//! RAII guards for the engine's reentrancy state.
//!
//! Both guards restore the previous value on drop, so the state is cleared
//! before control returns to any caller even on early `?` returns.

use std::cell::Cell;

use crate::registry::EndpointId;

/// Marks one endpoint as suspended: its own change notifications are
/// ignored while the engine mutates it.
pub(crate) struct Suspension<'a> {
    slot: &'a Cell<Option<EndpointId>>,
    previous: Option<EndpointId>,
}

impl<'a> Suspension<'a> {
    pub(crate) fn new(slot: &'a Cell<Option<EndpointId>>, id: EndpointId) -> Self {
        let previous = slot.replace(Some(id));
        Self { slot, previous }
    }
}

impl Drop for Suspension<'_> {
    fn drop(&mut self) {
        self.slot.set(self.previous);
    }
}

/// Raises a boolean flag for the guard's lifetime.
pub(crate) struct FlagGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> FlagGuard<'a> {
    pub(crate) fn raise(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}
