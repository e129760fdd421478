//! Error types for event handling.

/// Errors an [`EventHandler`](crate::EventHandler) can report.
///
/// The bus never propagates these to the publisher. It logs them and
/// moves on to the next handler.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The handler failed while processing the event.
    #[error("handler failed: {0}")]
    Handler(String),
}
