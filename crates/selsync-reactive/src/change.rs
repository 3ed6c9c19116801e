#![forbid(unsafe_code)]

//! The uniform four-way change description.

use std::fmt;

/// Discriminant of a [`ListChange`], handy for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Replace,
    Reset,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Reset => "reset",
        })
    }
}

/// A normalized mutation of an ordered container.
///
/// Plain containers emit this shape directly; widget selection events are
/// converted into it before they reach the synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange<T> {
    /// `items` were inserted starting at `index`. `None` means "appended".
    Add { items: Vec<T>, index: Option<usize> },
    /// `items` were removed.
    Remove { items: Vec<T> },
    /// `removed` were taken out and `added` put in their place.
    Replace { added: Vec<T>, removed: Vec<T> },
    /// The container was reset; listeners must not try to diff it.
    Reset,
}

impl<T> ListChange<T> {
    /// Convenience constructor for an appended addition.
    pub fn append(items: Vec<T>) -> Self {
        Self::Add { items, index: None }
    }

    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Add { .. } => ChangeKind::Add,
            Self::Remove { .. } => ChangeKind::Remove,
            Self::Replace { .. } => ChangeKind::Replace,
            Self::Reset => ChangeKind::Reset,
        }
    }

    /// Items that entered the container.
    #[must_use]
    pub fn added(&self) -> &[T] {
        match self {
            Self::Add { items, .. } => items,
            Self::Replace { added, .. } => added,
            Self::Remove { .. } | Self::Reset => &[],
        }
    }

    /// Items that left the container. Empty for `Reset`, which does not
    /// enumerate what it dropped.
    #[must_use]
    pub fn removed(&self) -> &[T] {
        match self {
            Self::Remove { items } => items,
            Self::Replace { removed, .. } => removed,
            Self::Add { .. } | Self::Reset => &[],
        }
    }

    /// Whether the change names no items. A `Reset` is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Reset => false,
            _ => self.added().is_empty() && self.removed().is_empty(),
        }
    }
}
