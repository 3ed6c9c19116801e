#![forbid(unsafe_code)]

//! Listener failure type shared by every notifier in the workspace.

use std::error::Error;

/// Result returned by fallible subscribers.
pub type ListenerResult = Result<(), ListenerError>;

/// An opaque failure raised by a change listener.
///
/// Listener errors flow back to whoever performed the mutation that triggered
/// the notification. The concrete error is kept boxed so it can be recovered
/// with [`ListenerError::downcast_ref`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ListenerError(Box<dyn Error + Send + Sync + 'static>);

impl ListenerError {
    /// Wrap any error (or message) as a listener failure.
    pub fn new(err: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }

    /// Borrow the wrapped error as a concrete type, if it is one.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Whether the wrapped error is of type `E`.
    #[must_use]
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    /// Unwrap into the boxed inner error.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn Error + Send + Sync + 'static> {
        self.0
    }
}
