use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ppe_detect::app::PpeApp;
use ppe_detect::config::AppConfig;

#[derive(Parser)]
#[command(name = "ppe-detect")]
#[command(about = "Detect personal protective equipment in images with YOLOv8")]
struct Cli {
    /// Skip training and load existing weights instead
    #[arg(long)]
    skip_training: bool,

    /// Do not launch the web interface
    #[arg(long)]
    no_ui: bool,

    /// Only validate an existing model
    #[arg(long)]
    validate_only: bool,

    /// Custom path to the model weights
    #[arg(long, value_name = "FILE")]
    model_path: Option<PathBuf>,

    /// Path to a YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep the web interface on loopback instead of all interfaces
    #[arg(long)]
    no_share: bool,

    /// Web interface port
    #[arg(long, default_value_t = 7860)]
    port: u16,

    /// Re-raise errors with their full chain instead of a one-line report
    #[arg(long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    ctrlc::set_handler(|| {
        eprintln!("\ninterrupted");
        std::process::exit(0);
    })
    .context("failed to install interrupt handler")?;

    if let Err(e) = run(&args) {
        if args.debug {
            return Err(e);
        }
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(args: &Cli) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::default(),
    };

    let mut app = PpeApp::new(config)?;
    info!("{}", app.system_info());

    if args.validate_only {
        app.load_trained_model(args.model_path.as_deref())?;
        app.validate_model()?;
        app.test_inference()?;
        Ok(())
    } else {
        app.run_full_pipeline(
            args.skip_training,
            !args.no_ui,
            !args.no_share,
            args.port,
        )
    }
}
