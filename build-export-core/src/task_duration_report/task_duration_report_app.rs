#[macro_use]
extern crate log;

use std::time::Duration;

use build_export_core::{
    build_handlers::HandlerRegistry,
    export_app::{self, ExportApiApp, ExportApiOpt},
    sample_handlers::{
        BuildSummary, BuildSummaryHandler, TaskAverages, TaskDurationHandler, TaskRecord,
        DEFAULT_TOP_TASKS,
    },
};
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    name = "task-duration-report",
    about = "Reports the slowest tasks that ran with caching disabled"
)]
struct Opt {
    #[clap(flatten)]
    export: ExportApiOpt,

    /// Seconds between two reports of the slowest tasks
    #[clap(long, default_value = "10")]
    report_interval_secs: u64,

    /// How many tasks each report lists
    #[clap(long, default_value_t = DEFAULT_TOP_TASKS)]
    top: usize,
}

fn log_build(build: &BuildSummary) {
    info!(
        "Build {} {} in {}ms with {} tasks, {} cacheable",
        build.build_id,
        if build.success { "succeeded" } else { "failed" },
        build
            .start_time
            .map(|start| (build.end_time - start).to_string())
            .unwrap_or_else(|| String::from("?")),
        build.tasks,
        build.cacheable_tasks
    );
}

fn log_top_tasks(averages: &TaskAverages, top: usize) {
    if averages.is_empty() {
        return;
    }
    info!("Slowest tasks with caching disabled:");
    for task in averages.top(top) {
        info!("{:>8}s  {}  {}", (task.avg / 1000.0).floor(), task.name, task.link);
    }
}

async fn report(
    mut averages: TaskAverages,
    builds: async_channel::Receiver<BuildSummary>,
    tasks: async_channel::Receiver<TaskRecord>,
    interval: Duration,
    top: usize,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut builds_open = true;
    let mut tasks_open = true;
    while builds_open || tasks_open {
        tokio::select! {
            build = builds.recv(), if builds_open => match build {
                Ok(build) => log_build(&build),
                Err(_) => builds_open = false,
            },
            task = tasks.recv(), if tasks_open => match task {
                Ok(task) => averages.record(&task),
                Err(_) => tasks_open = false,
            },
            _ = ticker.tick() => log_top_tasks(&averages, top),
        }
    }
    log_top_tasks(&averages, top);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();
    export_app::init_logging();

    let app = ExportApiApp::load(opt.export)?;
    debug!("Starting with {:?}", app);

    let (build_tx, build_rx) = async_channel::unbounded();
    let (task_tx, task_rx) = async_channel::unbounded();
    let registry = HandlerRegistry::new(vec![
        BuildSummaryHandler::descriptor(build_tx),
        TaskDurationHandler::descriptor(task_tx),
    ]);
    let processor = app.build_processor(registry);

    let reporter = tokio::spawn(report(
        TaskAverages::new(app.urls.clone()),
        build_rx,
        task_rx,
        Duration::from_secs(opt.report_interval_secs),
        opt.top,
    ));

    export_app::run_until_interrupted(processor, app.process_from).await;
    // Both channels close once the processor and its handlers are gone.
    reporter.await?;
    Ok(())
}
