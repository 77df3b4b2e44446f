use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;
mod render;
mod repl;

#[derive(Parser)]
#[command(name = "ara")]
#[command(about = "ARA - Accident Report Assistant", long_about = None)]
struct Cli {
    /// Write logs to stderr as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive accident report conversation
    Chat {
        /// Configuration file (defaults to ~/.config/ara/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Video file replayed as the camera
        #[arg(long)]
        camera_file: Option<PathBuf>,
    },
    /// Check media files against the upload rules without uploading
    CheckMedia {
        /// Configuration file (defaults to ~/.config/ara/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs)?;

    match cli.command {
        Commands::Chat {
            config,
            camera_file,
        } => commands::chat::run(config, camera_file).await?,
        Commands::CheckMedia { config, files } => commands::check_media::run(config, files).await?,
    }

    Ok(())
}
