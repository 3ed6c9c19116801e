#![forbid(unsafe_code)]

//! Multi-container selection synchronization.
//!
//! Several independently owned selection containers (plain observable lists
//! and widget-backed selection views) are registered with one
//! [`SelectionSync`] engine. A mutation of any of them is propagated to all
//! others, and one aggregate [`Synchronized`] event is emitted per round.
//!
//! # Usage
//!
//! ```
//! use selsync::{SelectionSync, SyncConfig};
//! use selsync_reactive::ObservableList;
//!
//! let e1 = ObservableList::from_vec(vec!['A', 'B']);
//! let e2 = ObservableList::new();
//!
//! let sync = SelectionSync::new(SyncConfig::default());
//! sync.register(e1.clone()).unwrap();
//! sync.register(e2.clone()).unwrap();
//! assert_eq!(e2.items(), vec!['A', 'B']);
//!
//! e1.insert(2, 'C').unwrap();
//! assert_eq!(e2.items(), vec!['A', 'B', 'C']);
//! ```
//!
//! # Scheduling
//!
//! Everything runs synchronously on the host's single UI thread. The only
//! deferred step is the corrective removal of vetoed items, posted to the
//! engine's [`IdleQueue`](selsync_reactive::IdleQueue); the host pumps it with
//! `run_idle()` once per dispatch turn.
//!
//! Registering or unregistering from inside a synchronized listener is
//! rejected with [`SyncError::RegistryBusy`].

pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod event;
pub mod filter;
mod guard;
pub mod registry;
pub mod veto;

pub use config::SyncConfig;
#[cfg(feature = "policy-config")]
pub use config::ConfigError;
pub use endpoint::{Endpoint, EndpointKind, EndpointSnapshot};
pub use engine::SelectionSync;
pub use error::SyncError;
pub use event::Synchronized;
pub use filter::ItemFilter;
pub use registry::EndpointId;
