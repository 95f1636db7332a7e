use super::TASK_FINISHED;
use crate::{
    build_handlers::{BuildEventHandler, HandlerDescriptor},
    export_api::{Build, BuildEvent, ExportApiUrls},
};

/// Counts the cacheable tasks of a build and logs the total once the build's stream completes.
#[derive(Debug)]
pub struct CacheableTaskCountHandler {
    build_scan: String,
    cacheable_task_count: u64,
}

impl CacheableTaskCountHandler {
    pub fn new(urls: &ExportApiUrls, build: &Build) -> Self {
        Self {
            build_scan: urls.build_scan(&build.build_id),
            cacheable_task_count: 0,
        }
    }

    pub fn descriptor(urls: &ExportApiUrls) -> HandlerDescriptor {
        let urls = urls.clone();
        HandlerDescriptor::new(
            "cacheable-task-count",
            &[TASK_FINISHED],
            move |build: &Build| CacheableTaskCountHandler::new(&urls, build),
        )
        .with_completion()
    }

    pub fn cacheable_task_count(&self) -> u64 {
        self.cacheable_task_count
    }
}

impl BuildEventHandler for CacheableTaskCountHandler {
    fn on_event(&mut self, event: &BuildEvent) {
        if event.data_bool("cacheable").unwrap_or(false) {
            self.cacheable_task_count += 1;
        }
    }

    fn complete(&mut self) {
        info!(
            "Build {} had {} cacheable tasks",
            self.build_scan, self.cacheable_task_count
        );
    }
}
