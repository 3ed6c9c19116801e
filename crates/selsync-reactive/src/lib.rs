#![forbid(unsafe_code)]

//! Change-notification primitives for selection synchronization.
//!
//! This crate provides the single-threaded building blocks the engine sits on:
//!
//! - [`ObservableList`]: an ordered, duplicate-free, shared list that notifies
//!   subscribers with a [`ListChange`] on every effective mutation.
//! - [`Notifier`]: the ordered subscriber list behind every observable here.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`IdleQueue`]: an explicit "run on the next idle turn" task queue.
//!
//! # Architecture
//!
//! Everything uses `Rc<..>` for single-threaded shared ownership. Subscribers
//! are stored as `Weak` callbacks and cleaned up lazily during notification,
//! so dropping a [`Subscription`] is all it takes to disconnect.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the list.
//! 2. Subscribers are notified in registration order.
//! 3. Every live subscriber sees every notification, even when an earlier
//!    subscriber fails; the first failure is handed back to the mutator.
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. Tasks posted to an [`IdleQueue`] while it is draining run on the next
//!    turn, never the current one.

pub mod change;
pub mod dispatch;
pub mod error;
pub mod list;
pub mod notifier;

pub use change::{ChangeKind, ListChange};
pub use dispatch::IdleQueue;
pub use error::{ListenerError, ListenerResult};
pub use list::ObservableList;
pub use notifier::{Notifier, Subscription};
