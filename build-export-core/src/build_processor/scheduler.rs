use std::collections::{HashMap, HashSet, VecDeque};

use super::{BuildStreams, ProcessorActivity, ProcessorNotification};
use crate::{
    event_stream::{StreamCloser, StreamOutcome},
    export_api::Build,
};

#[derive(Debug)]
pub(crate) enum SchedulerMessage {
    Enqueue(Build),
    /// Admission check, posted to the back of the queue after a build finishes.
    ProcessPending,
    BuildFinished {
        build_id: String,
        outcome: StreamOutcome,
    },
    DiscoveryEnded(StreamOutcome),
    Shutdown,
}

/// Sole owner of the pending queue and the in-flight set. Everything that changes
/// them arrives as a message, so they are only ever touched from this task.
pub(crate) struct Scheduler {
    streams: BuildStreams,
    tx: async_channel::Sender<SchedulerMessage>,
    rx: async_channel::Receiver<SchedulerMessage>,
    max_concurrent_builds: usize,
    pending: VecDeque<Build>,
    pending_ids: HashSet<String>,
    in_flight: HashMap<String, StreamCloser>,
    discovery: Option<StreamCloser>,
    shutting_down: bool,
    activity: ProcessorActivity,
    notifications: Option<async_channel::Sender<ProcessorNotification>>,
}

impl Scheduler {
    pub(crate) fn new(
        streams: BuildStreams,
        tx: async_channel::Sender<SchedulerMessage>,
        rx: async_channel::Receiver<SchedulerMessage>,
        max_concurrent_builds: usize,
        discovery: StreamCloser,
        notifications: Option<async_channel::Sender<ProcessorNotification>>,
    ) -> Self {
        Self {
            streams,
            tx,
            rx,
            max_concurrent_builds,
            pending: VecDeque::new(),
            pending_ids: HashSet::new(),
            in_flight: HashMap::new(),
            discovery: Some(discovery),
            shutting_down: false,
            activity: ProcessorActivity::default(),
            notifications,
        }
    }

    fn is_finished(&self) -> bool {
        self.discovery.is_none() && self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub(crate) async fn run(mut self) -> ProcessorActivity {
        while !self.is_finished() {
            let msg = match self.rx.recv().await {
                Ok(msg) => msg,
                Err(_) => break,
            };
            self.handle(msg);
        }
        self.activity
    }

    fn notify(&self, notification: ProcessorNotification) {
        if let Some(tx) = self.notifications.as_ref() {
            let _ = tx.try_send(notification);
        }
    }

    fn handle(&mut self, msg: SchedulerMessage) {
        match msg {
            SchedulerMessage::Enqueue(build) => self.enqueue(build),
            SchedulerMessage::ProcessPending => self.process_pending(),
            SchedulerMessage::BuildFinished { build_id, outcome } => {
                self.finished_processing_build(build_id, outcome)
            }
            SchedulerMessage::DiscoveryEnded(outcome) => {
                match outcome {
                    StreamOutcome::Completed => info!("Build stream completed"),
                    StreamOutcome::RetriesExhausted => {
                        error!("Build stream gave up, no new builds will be discovered")
                    }
                    StreamOutcome::Closed => info!("Build stream closed"),
                }
                self.discovery = None;
                self.notify(ProcessorNotification::DiscoveryEnded(outcome));
            }
            SchedulerMessage::Shutdown => self.shutdown(),
        }
    }

    fn enqueue(&mut self, build: Build) {
        if self.shutting_down {
            debug!("Shutting down, dropping build {}", build.build_id);
            return;
        }
        if self.pending_ids.contains(&build.build_id) || self.in_flight.contains_key(&build.build_id)
        {
            debug!("Build {} is already queued or in flight", build.build_id);
            return;
        }

        self.activity.builds_discovered += 1;
        self.pending_ids.insert(build.build_id.clone());
        self.pending.push_back(build);
        self.process_pending();
    }

    fn process_pending(&mut self) {
        while self.in_flight.len() < self.max_concurrent_builds {
            let build = match self.pending.pop_front() {
                Some(build) => build,
                None => break,
            };
            self.activate(build);
        }
    }

    fn activate(&mut self, build: Build) {
        self.pending_ids.remove(&build.build_id);
        let build_id = build.build_id.clone();

        self.notify(ProcessorNotification::BuildStarted(build_id.clone()));
        let handle = self.streams.open_build(&build);
        self.in_flight.insert(build_id.clone(), handle.closer());

        self.activity.builds_started += 1;
        self.activity.peak_in_flight = std::cmp::max(self.activity.peak_in_flight, self.in_flight.len());
        debug!(
            "Processing build {}, {} in flight, {} pending",
            build_id,
            self.in_flight.len(),
            self.pending.len()
        );

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = handle.outcome().await;
            let _ = tx
                .send(SchedulerMessage::BuildFinished { build_id, outcome })
                .await;
        });
    }

    fn finished_processing_build(&mut self, build_id: String, outcome: StreamOutcome) {
        self.in_flight.remove(&build_id);

        match outcome {
            StreamOutcome::Completed => {
                self.activity.builds_completed += 1;
                self.notify(ProcessorNotification::BuildCompleted(build_id));
            }
            StreamOutcome::RetriesExhausted | StreamOutcome::Closed => {
                warn!(
                    "Build {} was abandoned before its stream completed ({:?})",
                    build_id, outcome
                );
                self.activity.builds_abandoned += 1;
                self.notify(ProcessorNotification::BuildAbandoned(build_id));
            }
        }

        // Admission happens from the back of the queue, never inline from a completion.
        let _ = self.tx.try_send(SchedulerMessage::ProcessPending);
    }

    fn shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;

        info!(
            "Shutting down, closing {} build streams and dropping {} pending builds",
            self.in_flight.len(),
            self.pending.len()
        );
        if let Some(discovery) = self.discovery.as_ref() {
            discovery.close();
        }
        for closer in self.in_flight.values() {
            closer.close();
        }
        self.pending.clear();
        self.pending_ids.clear();
    }
}
