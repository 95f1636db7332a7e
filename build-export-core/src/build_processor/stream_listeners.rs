use std::sync::Arc;

use super::scheduler::SchedulerMessage;
use crate::{
    build_handlers::{DispatchTable, HandledEventTypes},
    event_stream::{SseEvent, StreamFault, StreamListener},
    export_api::{Build, BuildEvent},
    ExportApiError,
};

/// Feeds builds announced on the discovery stream into the scheduler.
#[derive(Debug)]
pub(crate) struct DiscoveryListener {
    url: String,
    scheduler_tx: async_channel::Sender<SchedulerMessage>,
}

impl DiscoveryListener {
    pub(crate) fn new(url: String, scheduler_tx: async_channel::Sender<SchedulerMessage>) -> Self {
        Self { url, scheduler_tx }
    }
}

impl StreamListener for DiscoveryListener {
    fn on_open(&mut self) {
        info!("Build stream '{}' open", self.url);
    }

    fn on_event(&mut self, event: &SseEvent) -> Result<(), ExportApiError> {
        let build = Build::from_json(&event.data)?;
        debug!("Discovered build {}", build.build_id);
        let build_id = build.build_id.clone();
        self.scheduler_tx
            .try_send(SchedulerMessage::Enqueue(build))
            .map_err(|_| ExportApiError::ProcessorShutdown(build_id))
    }

    fn on_error(&mut self, fault: &StreamFault) {
        error!("Build stream error: {}", fault);
    }
}

/// Routes one build's event envelopes to that build's handler instances.
#[derive(Debug)]
pub(crate) struct BuildStreamListener {
    handled_event_types: Arc<HandledEventTypes>,
    table: DispatchTable,
}

impl BuildStreamListener {
    pub(crate) fn new(handled_event_types: Arc<HandledEventTypes>, table: DispatchTable) -> Self {
        Self {
            handled_event_types,
            table,
        }
    }
}

impl StreamListener for BuildStreamListener {
    fn on_open(&mut self) {
        info!("Event stream for build {} open", self.table.build_id());
    }

    fn on_event(&mut self, event: &SseEvent) -> Result<(), ExportApiError> {
        let build_event = BuildEvent::from_json(&event.data)?;
        debug!(
            "Build {} event {}",
            self.table.build_id(),
            build_event.event_type()
        );
        if self
            .handled_event_types
            .contains(build_event.event_type())
        {
            self.table.dispatch(&build_event);
        }
        Ok(())
    }

    fn on_error(&mut self, fault: &StreamFault) {
        debug!(
            "Event stream for build {} failed: {}",
            self.table.build_id(),
            fault
        );
    }

    fn on_complete(&mut self) {
        self.table.complete();
    }
}
