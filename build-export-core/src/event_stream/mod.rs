use std::time::Duration;

use thiserror::Error;

use crate::export_api::STATUS_COMPLETE;

mod connection;
pub use connection::{
    ConnectionHandle, EventStreamConnection, StreamCloser, StreamListener, StreamOutcome,
};

mod connector;
pub use connector::{EventStream, HyperConnector, StreamConnector, StreamRequest};

mod retry_state;
pub use retry_state::{RetryDecision, RetryState};

mod sse_decoder;
pub use sse_decoder::SseDecoder;

#[cfg(test)]
pub(crate) mod scripted_connector;

/// One dispatched server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name, `message` when the server didn't name it.
    pub event: String,
    pub data: String,
    /// Last event id seen on the stream at the time this event was dispatched.
    pub id: Option<String>,
    /// Reconnection time the server asked for in this event block.
    pub retry: Option<Duration>,
}

impl SseEvent {
    pub fn new<S: Into<String>, D: Into<String>>(event: S, data: D) -> SseEvent {
        SseEvent {
            event: event.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }
}

/// Anything that ends an attempt at reading a stream.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum StreamFault {
    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Stream closed by the server")]
    Ended,
}

impl StreamFault {
    /// Status code attached to the failure, `None` when the failure never got as far as a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamFault::Status(code) => Some(*code),
            StreamFault::Transport(_) | StreamFault::Ended => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == Some(STATUS_COMPLETE)
    }
}
