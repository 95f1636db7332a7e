use super::ProcessFrom;
use crate::build_handlers::HandledEventTypes;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportApiUrls {
    server_url: String,
}

impl ExportApiUrls {
    pub fn new(server_url: &str) -> ExportApiUrls {
        ExportApiUrls {
            server_url: server_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn export_base(&self) -> String {
        format!("{}/build-export/v1", self.server_url)
    }

    pub fn builds_since(&self, from: &ProcessFrom) -> String {
        format!("{}/builds/since/{}?stream", self.export_base(), from)
    }

    /// Only the types some handler is interested in get requested, so the server
    /// never pushes events nobody would look at.
    pub fn build_events(&self, build_id: &str, event_types: &HandledEventTypes) -> String {
        format!(
            "{}/build/{}/events?eventTypes={}",
            self.export_base(),
            build_id,
            event_types.join(",")
        )
    }

    pub fn build_scan(&self, build_id: &str) -> String {
        format!("{}/s/{}", self.server_url, build_id)
    }

    pub fn task_timeline(&self, build_id: &str, task_path: &str) -> String {
        format!(
            "{}/s/{}/timeline?task-path={}",
            self.server_url, build_id, task_path
        )
    }
}
