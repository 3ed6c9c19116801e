#![forbid(unsafe_code)]

//! Keyboard modifiers held during interactive selection.

use std::cell::Cell;
use std::rc::Rc;

use bitflags::bitflags;

bitflags! {
    /// Modifier keys.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const SUPER = 0b1000;
    }
}

impl Modifiers {
    /// Range (`SHIFT`) or toggle (`CTRL`) selection is in progress.
    #[must_use]
    pub const fn is_multi_select(self) -> bool {
        self.intersects(Self::SHIFT.union(Self::CTRL))
    }
}

/// Shared handle to the currently held modifiers.
///
/// The host input loop writes it on every key event; the synchronization
/// engine reads it to decide whether an addition was an interactive
/// multi-select.
#[derive(Debug, Clone, Default)]
pub struct InputModifiers {
    held: Rc<Cell<Modifiers>>,
}

impl InputModifiers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, modifiers: Modifiers) {
        self.held.set(modifiers);
    }

    #[must_use]
    pub fn get(&self) -> Modifiers {
        self.held.get()
    }

    pub fn release_all(&self) {
        self.held.set(Modifiers::empty());
    }

    #[must_use]
    pub fn is_multi_select(&self) -> bool {
        self.held.get().is_multi_select()
    }
}
