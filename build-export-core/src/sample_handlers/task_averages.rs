use std::cmp::Ordering;

use serde::Serialize;

use super::TaskRecord;
use crate::export_api::ExportApiUrls;

/// Samples the moving average of a task's duration is taken over.
pub const NUMBER_OF_SAMPLES: f64 = 10.0;

pub const DEFAULT_TOP_TASKS: usize = 50;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TaskAverage {
    pub name: String,
    /// Milliseconds.
    pub avg: f64,
    /// Timeline of the build the task last ran in.
    pub link: String,
}

/// Exponential moving average of the duration of every task path that ran with
/// caching disabled.
#[derive(Debug)]
pub struct TaskAverages {
    urls: ExportApiUrls,
    tasks: Vec<TaskAverage>,
}

impl TaskAverages {
    pub fn new(urls: ExportApiUrls) -> Self {
        Self {
            urls,
            tasks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn record(&mut self, task: &TaskRecord) {
        if task.caching_disabled_reason_category.is_none() {
            return;
        }

        let link = self.urls.task_timeline(&task.build_id, &task.path);
        let duration = task.duration as f64;
        match self.tasks.iter_mut().find(|t| t.name == task.path) {
            Some(existing) => {
                existing.avg = existing.avg - existing.avg / NUMBER_OF_SAMPLES
                    + duration / NUMBER_OF_SAMPLES;
                existing.link = link;
            }
            None => self.tasks.push(TaskAverage {
                name: task.path.clone(),
                avg: duration,
                link,
            }),
        }
    }

    /// The `n` slowest tasks, slowest first.
    pub fn top(&self, n: usize) -> Vec<TaskAverage> {
        let mut sorted = self.tasks.clone();
        sorted.sort_by(|a, b| b.avg.partial_cmp(&a.avg).unwrap_or(Ordering::Equal));
        sorted.truncate(n);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(build_id: &str, path: &str, duration: i64, reason: Option<&str>) -> TaskRecord {
        TaskRecord {
            build_id: build_id.to_string(),
            project: None,
            path: path.to_string(),
            duration,
            caching_disabled_reason_category: reason.map(|r| r.to_string()),
            outcome: None,
        }
    }

    #[test]
    fn test_moving_average() {
        let mut averages = TaskAverages::new(ExportApiUrls::new("https://ge.example.com"));
        averages.record(&record("b1", ":a", 1_000, Some("NOT_CACHEABLE")));
        averages.record(&record("b2", ":a", 2_000, Some("NOT_CACHEABLE")));

        let top = averages.top(DEFAULT_TOP_TASKS);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, ":a");
        assert!((top[0].avg - 1_100.0).abs() < f64::EPSILON);
        assert_eq!(
            top[0].link,
            "https://ge.example.com/s/b2/timeline?task-path=:a"
        );
    }

    #[test]
    fn test_ignores_cacheable_tasks() {
        let mut averages = TaskAverages::new(ExportApiUrls::new("https://ge.example.com"));
        averages.record(&record("b1", ":a", 1_000, None));
        assert!(averages.is_empty());
    }

    #[test]
    fn test_top_is_sorted_and_truncated() {
        let mut averages = TaskAverages::new(ExportApiUrls::new("https://ge.example.com"));
        for (path, duration) in [(":fast", 10), (":slow", 900), (":mid", 300)] {
            averages.record(&record("b1", path, duration, Some("OVERLAPPING_OUTPUTS")));
        }

        let names: Vec<String> = averages.top(2).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![":slow", ":mid"]);
        assert_eq!(averages.len(), 3);
    }
}
