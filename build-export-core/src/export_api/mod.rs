mod models;
pub use models::{Build, BuildEvent, EventTypeInfo, ProcessFrom};

mod urls;
pub use urls::ExportApiUrls;

/// Named SSE event carrying one discovered build on the discovery stream.
pub const BUILD_EVENT_NAME: &str = "Build";

/// Named SSE event carrying one build event envelope on a per-build stream.
pub const BUILD_EVENT_ENVELOPE_NAME: &str = "BuildEvent";

/// Status the server answers with once a stream has no more events to send.
pub const STATUS_COMPLETE: u16 = 204;
