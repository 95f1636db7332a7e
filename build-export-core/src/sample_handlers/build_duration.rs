use super::{BUILD_FINISHED, BUILD_STARTED};
use crate::{
    build_handlers::{BuildEventHandler, HandlerDescriptor},
    export_api::{Build, BuildEvent, ExportApiUrls},
};

/// Logs how long a build took, from its `BuildStarted` to its `BuildFinished` event.
#[derive(Debug)]
pub struct BuildDurationHandler {
    build_scan: String,
    start_time: Option<i64>,
    duration_ms: Option<i64>,
}

impl BuildDurationHandler {
    pub fn new(urls: &ExportApiUrls, build: &Build) -> Self {
        Self {
            build_scan: urls.build_scan(&build.build_id),
            start_time: None,
            duration_ms: None,
        }
    }

    pub fn descriptor(urls: &ExportApiUrls) -> HandlerDescriptor {
        let urls = urls.clone();
        HandlerDescriptor::new(
            "build-duration",
            &[BUILD_STARTED, BUILD_FINISHED],
            move |build: &Build| BuildDurationHandler::new(&urls, build),
        )
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.duration_ms
    }
}

impl BuildEventHandler for BuildDurationHandler {
    fn on_event(&mut self, event: &BuildEvent) {
        match event.event_type() {
            BUILD_STARTED => self.start_time = Some(event.timestamp),
            BUILD_FINISHED => match self.start_time {
                Some(start) => {
                    let duration = event.timestamp - start;
                    self.duration_ms = Some(duration);
                    info!("Build {} completed in {}ms", self.build_scan, duration);
                }
                None => warn!(
                    "Build {} finished without a BuildStarted event",
                    self.build_scan
                ),
            },
            _ => (),
        }
    }
}
