use clap::Parser;
use georepo::app;
use georepo::config::{DEFAULT_CONFIG_FILE, Settings};
use std::path::PathBuf;

/// Web dashboard for the geospatial data repository
#[derive(Parser)]
#[command(name = "georepo", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listen address, overrides the configuration
    #[arg(short, long)]
    bind: Option<String>,
}

/// Main entry point for the web application
///
/// Loads the configuration, opens the configured backing store and serves the
/// dashboard and JSON API until the process is stopped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut settings = Settings::load(&args.config)?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }

    app::run(settings).await
}
