use std::collections::HashMap;

use serde::Serialize;

use super::{PROJECT_STRUCTURE, TASK_FINISHED, TASK_STARTED};
use crate::{
    build_handlers::{BuildEventHandler, HandlerDescriptor},
    export_api::{Build, BuildEvent},
};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub build_id: String,
    pub project: Option<String>,
    pub path: String,
    pub duration: i64,
    pub caching_disabled_reason_category: Option<String>,
    pub outcome: Option<String>,
}

/// Emits a [`TaskRecord`] for every finished task of a build.
#[derive(Debug)]
pub struct TaskDurationHandler {
    build_id: String,
    root_project: Option<String>,
    // Keyed by task path, tasks of one build can run in parallel.
    started: HashMap<String, i64>,
    records: async_channel::Sender<TaskRecord>,
}

impl TaskDurationHandler {
    pub fn new(build: &Build, records: async_channel::Sender<TaskRecord>) -> Self {
        Self {
            build_id: build.build_id.clone(),
            root_project: None,
            started: HashMap::new(),
            records,
        }
    }

    pub fn descriptor(records: async_channel::Sender<TaskRecord>) -> HandlerDescriptor {
        HandlerDescriptor::new(
            "task-duration",
            &[PROJECT_STRUCTURE, TASK_STARTED, TASK_FINISHED],
            move |build: &Build| TaskDurationHandler::new(build, records.clone()),
        )
    }

    fn task_finished(&mut self, event: &BuildEvent) {
        let path = match event.data_str("path") {
            Some(path) => path,
            None => {
                warn!("TaskFinished event without a path in build {}", self.build_id);
                return;
            }
        };
        let start = match self.started.remove(path) {
            Some(start) => start,
            None => {
                debug!(
                    "Task {} of build {} finished without having started",
                    path, self.build_id
                );
                return;
            }
        };

        let record = TaskRecord {
            build_id: self.build_id.clone(),
            project: self.root_project.clone(),
            path: path.to_string(),
            duration: event.timestamp - start,
            caching_disabled_reason_category: event
                .data_str("cachingDisabledReasonCategory")
                .map(|s| s.to_string()),
            outcome: event.data_str("outcome").map(|s| s.to_string()),
        };
        let _ = self.records.try_send(record);
    }
}

impl BuildEventHandler for TaskDurationHandler {
    fn on_event(&mut self, event: &BuildEvent) {
        match event.event_type() {
            PROJECT_STRUCTURE => {
                if self.root_project.is_none() {
                    self.root_project = event.data_str("rootProjectName").map(|s| s.to_string());
                }
            }
            TASK_STARTED => {
                if let Some(path) = event.data_str("path") {
                    self.started.insert(path.to_string(), event.timestamp);
                }
            }
            TASK_FINISHED => self.task_finished(event),
            _ => (),
        }
    }
}
