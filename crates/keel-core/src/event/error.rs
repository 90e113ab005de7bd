//! Errors of the event dispatcher.
use thiserror::Error;

use crate::event::EventId;

#[derive(Debug, Error)]
pub enum EventSystemError {
    /// No handler is registered under this id
    #[error("No event handler registered with id {0}")]
    UnknownHandler(EventId),
}
