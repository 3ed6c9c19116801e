#![forbid(unsafe_code)]

//! Widget-side selection model for selsync.
//!
//! A selection-capable widget (a grid, a grouped list, a tree) does not
//! expose a flat list: its "currently selected" set is split between a
//! primary selection and any number of nested *child contexts*, one per
//! sub-view. [`SelectionView`] models that as an explicit ownership tree and
//! raises a native [`SelectionChanged`] notification per affected scope.
//!
//! [`normalize`] converts those notifications into the uniform
//! [`ListChange`](selsync_reactive::ListChange) shape the engine consumes.
//! [`InputModifiers`] carries the keyboard modifiers held during interactive
//! selection.

pub mod modifiers;
pub mod normalize;
pub mod selection_view;

pub use modifiers::{InputModifiers, Modifiers};
pub use normalize::normalize;
pub use selection_view::{
    ChildContextId, SelectionChanged, SelectionScope, SelectionView, ViewError, ViewSnapshot,
};
