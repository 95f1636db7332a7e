use std::{error::Error, path::PathBuf, sync::Arc};

use anyhow::anyhow;
use clap::Args;

use crate::{
    auth::AuthHeader,
    build_handlers::HandlerRegistry,
    build_processor::{BuildProcessor, ProcessorActivity, ProcessorSettings},
    config::{auth_header_for, load_config_file, validate_server_url, Config, Credentials},
    event_stream::HyperConnector,
    export_api::{ExportApiUrls, ProcessFrom},
};

pub const CONFIG_FILE_NAME: &str = "build_export.conf";

/// Command line options shared by the Export API sample programs.
#[derive(Args, Debug, Clone, Default)]
pub struct ExportApiOpt {
    /// Address of the build server, overrides `server_url` from the config file
    pub server_url: Option<String>,

    #[clap(long)]
    pub config_path: Option<PathBuf>,

    /// `now` or milliseconds since the epoch
    #[clap(long)]
    pub process_from: Option<ProcessFrom>,

    #[clap(long, env = "MAX_CONCURRENT_BUILDS")]
    pub max_concurrent_builds: Option<usize>,

    #[clap(long, env = "EXPORT_API_USER")]
    pub user: Option<String>,

    #[clap(long, env = "EXPORT_API_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[clap(long, env = "EXPORT_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Everything a sample program needs to start processing, after command line options
/// have been layered over the config file.
#[derive(Debug)]
pub struct ExportApiApp {
    pub urls: ExportApiUrls,
    pub auth_header: AuthHeader,
    pub settings: ProcessorSettings,
    pub process_from: ProcessFrom,
}

impl ExportApiApp {
    pub fn load(opt: ExportApiOpt) -> Result<ExportApiApp, Box<dyn Error>> {
        let config = load_config_file(&opt.config_path.as_deref(), CONFIG_FILE_NAME)?;
        ExportApiApp::resolve(opt, config)
    }

    pub fn resolve(opt: ExportApiOpt, config: Config) -> Result<ExportApiApp, Box<dyn Error>> {
        let server_url = match opt.server_url.as_deref() {
            Some(url) => validate_server_url(url)?,
            None => config.server_url.clone().ok_or_else(|| {
                anyhow!("No server url given on the command line or in the config file")
            })?,
        };

        let credentials = Credentials::from_parts(opt.user, opt.password, opt.token)
            .or_else(|| config.credentials.clone());
        let auth_header = auth_header_for(credentials.as_ref())?;

        let mut settings = ProcessorSettings::from(&config);
        if let Some(max) = opt.max_concurrent_builds {
            settings.max_concurrent_builds = max;
        }

        Ok(ExportApiApp {
            urls: ExportApiUrls::new(&server_url),
            auth_header,
            settings,
            process_from: opt.process_from.unwrap_or(config.process_from),
        })
    }

    pub fn build_processor(&self, registry: HandlerRegistry) -> BuildProcessor {
        BuildProcessor::new(
            self.urls.clone(),
            self.auth_header.clone(),
            self.settings.clone(),
            registry,
            Arc::new(HyperConnector::new()),
        )
    }
}

/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.target(pretty_env_logger::env_logger::Target::Stderr);
    if let Ok(s) = ::std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        builder.parse_filters("info");
    }
    builder.init();
}

/// Runs the processor until discovery ends and every build is done, or until ctrl-c.
pub async fn run_until_interrupted(
    processor: BuildProcessor,
    process_from: ProcessFrom,
) -> ProcessorActivity {
    let handle = processor.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            handle.shutdown();
        }
    });

    let activity = processor.start(process_from).await;
    info!(
        "Done, {} builds discovered, {} completed, {} abandoned",
        activity.builds_discovered, activity.builds_completed, activity.builds_abandoned
    );
    activity
}
