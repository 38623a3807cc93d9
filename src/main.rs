// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use greenscreen::backends::camera::DeviceSelector;
use greenscreen::config::Config;
use greenscreen::constants::output::LOG_FILE;
use greenscreen::errors::ConfigError;
use greenscreen::storage;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

mod cli;

#[derive(Parser)]
#[command(name = "greenscreen")]
#[command(about = "Live green-screen compositing and recording")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Capture device index or path (from 'greenscreen list')
    #[arg(short, long, global = true)]
    device: Option<DeviceSelector>,

    /// Background image or video
    #[arg(short, long, global = true)]
    background: Option<PathBuf>,

    /// Directory that session folders are created in
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Container for the recorded streams (mp4, mkv, webm)
    #[arg(long, global = true)]
    container: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the composited feed in the terminal (default)
    Preview,

    /// List capture devices
    List,

    /// Record without a preview
    Record {
        /// Recording duration in seconds (0 records until Ctrl+C)
        #[arg(short = 't', long, default_value = "10")]
        duration: u64,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Also save it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (mut config, config_error) = match load_config(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    apply_overrides(&mut config, &cli);

    let command = cli.command.unwrap_or(Commands::Preview);
    init_logging(&config, matches!(command, Commands::Preview));

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Ignoring config file, using defaults");
    }
    config.validate()?;

    match command {
        Commands::Preview => greenscreen::terminal::run(config),
        Commands::List => cli::list_devices(),
        Commands::Record { duration } => cli::record(&config, duration),
        Commands::Config { write } => {
            let path = cli.config.clone().or_else(Config::config_path);
            cli::show_config(&config, write.then_some(path).flatten())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => match Config::config_path() {
            Some(path) => Config::load_from(&path),
            None => Ok(Config::default()),
        },
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    if let Some(background) = &cli.background {
        config.background = Some(background.clone());
    }
    if let Some(output) = &cli.output {
        config.output_root = output.clone();
    }
    if let Some(container) = &cli.container {
        config.video_container = container.to_lowercase();
    }
}

/// Install the tracing subscriber
///
/// Set RUST_LOG to control the level, e.g. RUST_LOG=greenscreen=debug.
/// The terminal preview owns the screen, so its logs go to a file in the
/// output root instead of stderr.
fn init_logging(config: &Config, to_file: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    if to_file {
        let file = storage::init_output_dir(&config.output_root)
            .ok()
            .and_then(|()| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(config.output_root.join(LOG_FILE))
                    .ok()
            });

        match file {
            Some(file) => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .init(),
            None => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::sink)
                .init(),
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_level(true)
        .init();
}
