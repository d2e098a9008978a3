mod app;

use anyhow::Result;
use clap::Parser;
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
};

use portal_core::{
    config::{self, AppConfig},
    HttpRegistrar,
};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Terminal client for the student portal.
#[derive(Parser, Debug)]
#[clap(name = "portal", version)]
struct Cli {
    /// Student id to act for; overrides `student_id` in the settings file
    #[clap(short, long)]
    student: Option<String>,

    /// Settings file to use instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config_path = match cli.config {
        Some(path) => path,
        None => config::ensure_default_config()?,
    };
    let mut config = AppConfig::load_from(&config_path)?;
    if let Some(student) = cli.student {
        config = config.with_student(student);
    }
    tracing::info!(
        api = %config.api_base_url,
        student = %config.student_id,
        config = %config_path.display(),
        "Starting portal"
    );

    let api = HttpRegistrar::from_config(&config)?;
    let mut app = app::PortalApp::new(api, config);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("portal.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
