use serde::Serialize;

use super::{BUILD_FINISHED, BUILD_STARTED, TASK_FINISHED};
use crate::{
    build_handlers::{BuildEventHandler, HandlerDescriptor},
    export_api::{Build, BuildEvent},
};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub build_id: String,
    pub success: bool,
    pub start_time: Option<i64>,
    pub end_time: i64,
    pub tasks: u64,
    pub cacheable_tasks: u64,
}

/// Emits one [`BuildSummary`] per build when its `BuildFinished` event arrives.
#[derive(Debug)]
pub struct BuildSummaryHandler {
    build_id: String,
    start_time: Option<i64>,
    task_count: u64,
    cacheable_task_count: u64,
    summaries: async_channel::Sender<BuildSummary>,
}

impl BuildSummaryHandler {
    pub fn new(build: &Build, summaries: async_channel::Sender<BuildSummary>) -> Self {
        Self {
            build_id: build.build_id.clone(),
            start_time: None,
            task_count: 0,
            cacheable_task_count: 0,
            summaries,
        }
    }

    pub fn descriptor(summaries: async_channel::Sender<BuildSummary>) -> HandlerDescriptor {
        HandlerDescriptor::new(
            "build-summary",
            &[BUILD_STARTED, TASK_FINISHED, BUILD_FINISHED],
            move |build: &Build| BuildSummaryHandler::new(build, summaries.clone()),
        )
    }
}

impl BuildEventHandler for BuildSummaryHandler {
    fn on_event(&mut self, event: &BuildEvent) {
        match event.event_type() {
            BUILD_STARTED => self.start_time = Some(event.timestamp),
            TASK_FINISHED => {
                if event.data_bool("cacheable").unwrap_or(false) {
                    self.cacheable_task_count += 1;
                }
                self.task_count += 1;
            }
            BUILD_FINISHED => {
                let summary = BuildSummary {
                    build_id: self.build_id.clone(),
                    success: event.data.get("failureId").map_or(true, |v| v.is_null()),
                    start_time: self.start_time,
                    end_time: event.timestamp,
                    tasks: self.task_count,
                    cacheable_tasks: self.cacheable_task_count,
                };
                if self.summaries.try_send(summary).is_err() {
                    debug!("Nobody listens for build summaries, dropping {}", self.build_id);
                }
            }
            _ => (),
        }
    }
}
