use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{RetryDecision, RetryState, SseEvent, StreamConnector, StreamFault, StreamRequest};
use crate::{auth::AuthHeader, config::RetryPolicy, ExportApiError};

/// Receives the lifecycle of one logical stream.
///
/// Callbacks run on the connection's task, one at a time and in delivery order.
pub trait StreamListener: Send {
    fn on_open(&mut self) {}

    /// Called once per bound event. A returned error is logged and the event skipped,
    /// the stream keeps going.
    fn on_event(&mut self, event: &SseEvent) -> Result<(), ExportApiError>;

    fn on_error(&mut self, _fault: &StreamFault) {}

    /// The server signalled it has nothing more to send. Called at most once.
    fn on_complete(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    RetriesExhausted,
    Closed,
}

/// Force-closes a connection from outside its task.
#[derive(Clone, Debug, Default)]
pub struct StreamCloser(CancellationToken);

impl StreamCloser {
    pub fn close(&self) {
        self.0.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_cancelled()
    }
}

#[derive(Debug)]
pub struct ConnectionHandle {
    closer: StreamCloser,
    task: JoinHandle<StreamOutcome>,
}

impl ConnectionHandle {
    pub fn close(&self) {
        self.closer.close();
    }

    pub fn closer(&self) -> StreamCloser {
        self.closer.clone()
    }

    /// Waits for the connection to finish on its own, or after being closed.
    pub async fn outcome(self) -> StreamOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Event stream task failed: {:?}", e);
                StreamOutcome::Closed
            }
        }
    }
}

#[derive(Debug)]
struct AttemptState {
    retry_state: RetryState,
    retry_interval: Duration,
    last_event_id: Option<String>,
}

#[derive(Debug)]
pub struct EventStreamConnection {
    connector: Arc<dyn StreamConnector>,
    url: String,
    auth_header: AuthHeader,
    event_names: Vec<String>,
    retry: RetryPolicy,
    closer: StreamCloser,
}

impl EventStreamConnection {
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        url: String,
        auth_header: AuthHeader,
        event_names: &[&str],
        retry: RetryPolicy,
    ) -> Self {
        Self {
            connector,
            url,
            auth_header,
            event_names: event_names.iter().map(|e| e.to_string()).collect(),
            retry,
            closer: StreamCloser::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn closer(&self) -> StreamCloser {
        self.closer.clone()
    }

    /// Runs the connection on its own task.
    pub fn open<L: StreamListener + 'static>(self, listener: L) -> ConnectionHandle {
        let closer = self.closer();
        let task = tokio::spawn(async move {
            let mut listener = listener;
            self.run(&mut listener).await
        });
        ConnectionHandle { closer, task }
    }

    /// Drives the connection on the current task until it completes, runs out of
    /// retries or gets closed. Nothing here fails towards the caller, every problem
    /// goes to the listener's `on_error`.
    pub async fn run<L: StreamListener>(self, listener: &mut L) -> StreamOutcome {
        let mut state = AttemptState {
            retry_state: RetryState::new(self.retry),
            retry_interval: self.retry.retry_interval(),
            last_event_id: None,
        };

        loop {
            state.retry_state.next_attempt();

            let fault = tokio::select! {
                biased;
                _ = self.closer.0.cancelled() => {
                    debug!("Closing stream '{}'", self.url);
                    return StreamOutcome::Closed;
                }
                fault = self.attempt(listener, &mut state) => fault,
            };

            match state.retry_state.on_error(fault.status()) {
                RetryDecision::Complete => {
                    debug!("Stream '{}' complete", self.url);
                    listener.on_complete();
                    return StreamOutcome::Completed;
                }
                RetryDecision::Retry => {
                    warn!(
                        "Stream '{}' failed with: {}, retry {}/{} in {:?}",
                        self.url,
                        fault,
                        state.retry_state.retries(),
                        self.retry.max_retries,
                        state.retry_interval
                    );
                    listener.on_error(&fault);
                }
                RetryDecision::GiveUp => {
                    error!(
                        "Connecting to {} ERROR: max retries reached {}",
                        self.url, self.retry.max_retries
                    );
                    listener.on_error(&fault);
                    return StreamOutcome::RetriesExhausted;
                }
            }

            tokio::select! {
                biased;
                _ = self.closer.0.cancelled() => {
                    debug!("Closing stream '{}' while waiting to reconnect", self.url);
                    return StreamOutcome::Closed;
                }
                _ = tokio::time::sleep(state.retry_interval) => (),
            }
        }
    }

    fn is_bound(&self, event: &SseEvent) -> bool {
        self.event_names.iter().any(|name| name == &event.event)
    }

    async fn attempt<L: StreamListener>(
        &self,
        listener: &mut L,
        state: &mut AttemptState,
    ) -> StreamFault {
        let request = StreamRequest {
            url: self.url.clone(),
            auth_header: self.auth_header.clone(),
            last_event_id: state.last_event_id.clone(),
        };

        let mut stream = match self.connector.connect(&request).await {
            Ok(stream) => stream,
            Err(fault) => return fault,
        };

        state.retry_state.on_open();
        listener.on_open();

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(fault) => return fault,
            };

            if let Some(retry) = event.retry {
                state.retry_interval = retry;
            }
            if let Some(id) = event.id.as_ref() {
                state.last_event_id = Some(id.clone());
            }

            if !self.is_bound(&event) {
                trace!("Ignoring unbound '{}' event on '{}'", event.event, self.url);
                continue;
            }

            if let Err(e) = listener.on_event(&event) {
                warn!(
                    "Skipping '{}' event on '{}', failed with: {}",
                    event.event, self.url, e
                );
            }
        }
        StreamFault::Ended
    }
}
