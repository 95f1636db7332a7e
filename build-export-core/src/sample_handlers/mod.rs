mod build_duration;
pub use build_duration::BuildDurationHandler;

mod build_summary;
pub use build_summary::{BuildSummary, BuildSummaryHandler};

mod cacheable_task_count;
pub use cacheable_task_count::CacheableTaskCountHandler;

mod task_averages;
pub use task_averages::{TaskAverage, TaskAverages, DEFAULT_TOP_TASKS, NUMBER_OF_SAMPLES};

mod task_duration;
pub use task_duration::{TaskDurationHandler, TaskRecord};

pub const BUILD_STARTED: &str = "BuildStarted";
pub const BUILD_FINISHED: &str = "BuildFinished";
pub const PROJECT_STRUCTURE: &str = "ProjectStructure";
pub const TASK_STARTED: &str = "TaskStarted";
pub const TASK_FINISHED: &str = "TaskFinished";
