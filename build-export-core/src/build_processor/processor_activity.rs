use crate::event_stream::StreamOutcome;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessorNotification {
    BuildStarted(String),
    BuildCompleted(String),
    /// The build's stream was given up on or closed before it completed,
    /// its completion handlers never ran.
    BuildAbandoned(String),
    DiscoveryEnded(StreamOutcome),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessorActivity {
    pub builds_discovered: u64,
    pub builds_started: u64,
    pub builds_completed: u64,
    pub builds_abandoned: u64,
    pub peak_in_flight: usize,
}
