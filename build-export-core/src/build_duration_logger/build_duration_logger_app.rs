#[macro_use]
extern crate log;

use build_export_core::{
    build_handlers::HandlerRegistry,
    export_app::{self, ExportApiApp, ExportApiOpt},
    sample_handlers::{BuildDurationHandler, CacheableTaskCountHandler},
};
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    name = "build-duration-logger",
    about = "Logs the duration and cacheable task count of every build published to the server"
)]
struct Opt {
    #[clap(flatten)]
    export: ExportApiOpt,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();
    export_app::init_logging();

    let app = ExportApiApp::load(opt.export)?;
    debug!("Starting with {:?}", app);

    let registry = HandlerRegistry::new(vec![
        BuildDurationHandler::descriptor(&app.urls),
        CacheableTaskCountHandler::descriptor(&app.urls),
    ]);
    let processor = app.build_processor(registry);

    export_app::run_until_interrupted(processor, app.process_from).await;
    Ok(())
}
