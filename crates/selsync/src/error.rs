#![forbid(unsafe_code)]

//! Engine error taxonomy.
//!
//! Every variant except `Listener` is a contract violation on the caller's
//! side: the engine operates on already-validated in-memory references and
//! has no recoverable runtime failures of its own.

use selsync_reactive::ListenerError;
use selsync_widgets::ViewError;

use crate::registry::EndpointId;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("endpoint {0} is not registered")]
    NotRegistered(EndpointId),
    #[error("container is not registered with this engine")]
    UnknownContainer,
    #[error("container is already registered as endpoint {0}")]
    AlreadyRegistered(EndpointId),
    #[error("registry cannot change while a propagation round is in flight")]
    RegistryBusy,
    #[error("item {item} not found in endpoint {endpoint} (primary selection or any child context)")]
    ItemNotFound { endpoint: EndpointId, item: String },
    #[error("selection view: {0}")]
    View(ViewError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

impl From<ViewError> for SyncError {
    fn from(err: ViewError) -> Self {
        match err {
            ViewError::Listener(inner) => Self::Listener(inner),
            other => Self::View(other),
        }
    }
}

impl SyncError {
    /// Whether this is a programmer error rather than a listener failure.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Listener(_))
    }
}
