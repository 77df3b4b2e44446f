//! Interactive conversation REPL.

use super::load_config;
use crate::render;
use crate::repl::{CliHelper, ReplCommand};
use anyhow::Result;
use ara_application::{ConversationController, Outcome};
use ara_core::capture::CameraDevice;
use ara_core::error::Result as AraResult;
use ara_core::upload::MediaItem;
use ara_infrastructure::{
    AraPaths, FileCameraDevice, HttpReportBackend, SecretCredentialProvider, SecretStorage,
    UnavailableCamera, load_media,
};
use colored::Colorize;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::path::PathBuf;
use std::sync::Arc;

/// Runs the conversation until `/quit` or end of input.
///
/// Intents run on background tasks so the prompt stays responsive while
/// messages are composed or uploads are in flight; everything the user sees
/// comes from the controller's subscriptions.
pub async fn run(config_path: Option<PathBuf>, camera_file: Option<PathBuf>) -> Result<()> {
    let paths = AraPaths::new()?;
    let config = load_config(config_path, &paths)?;
    tracing::info!("[Chat] Using backend at {}", config.backend.base_url);

    let backend = Arc::new(HttpReportBackend::new(
        &config.backend,
        config.upload.chunk_bytes,
    )?);
    let credentials = Arc::new(SecretCredentialProvider::new(SecretStorage::new(&paths)));
    let camera: Arc<dyn CameraDevice> = match camera_file {
        Some(path) => Arc::new(FileCameraDevice::new(path)),
        None => Arc::new(UnavailableCamera),
    };
    let controller = Arc::new(ConversationController::new(
        &config,
        backend,
        credentials,
        camera,
    ));

    render::print_banner();
    let watchers = [
        tokio::spawn(render::print_timeline(controller.subscribe_timeline())),
        tokio::spawn(render::print_progress(controller.clone())),
        tokio::spawn(render::print_capture(controller.subscribe_capture())),
        tokio::spawn(render::print_phase(controller.subscribe_phase())),
    ];
    controller.start().await;

    let mut rl: Editor<CliHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline(">> "));

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                match ReplCommand::parse(trimmed) {
                    ReplCommand::Quit => break,
                    ReplCommand::Help => render::print_help(),
                    ReplCommand::Report => {
                        render::print_report(controller.view_report().await.as_ref())
                    }
                    ReplCommand::Unknown(input) => {
                        println!("{}", format!("Unknown command: {input}").yellow());
                    }
                    command => {
                        let controller = controller.clone();
                        tokio::spawn(async move { dispatch(&controller, command).await });
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    controller.shutdown().await;
    for watcher in watchers {
        watcher.abort();
    }
    println!("{}", "Goodbye!".bright_green());
    Ok(())
}

async fn dispatch(controller: &ConversationController, command: ReplCommand) {
    let result = match command {
        ReplCommand::Text(text) => controller.submit_text(&text).await,
        ReplCommand::Upload(paths) => match load_all(&paths).await {
            Ok(files) => controller.upload_batch(files).await,
            Err(err) => controller.reject_input(err).await,
        },
        ReplCommand::Camera => controller.open_camera().await,
        ReplCommand::Record => controller.start_capture().await,
        ReplCommand::Stop => controller.stop_capture().await,
        ReplCommand::Retake => controller.retake().await,
        ReplCommand::Send => controller.upload_recording().await,
        ReplCommand::Close => Ok(controller.close_camera().await),
        ReplCommand::Restart => {
            controller.restart().await;
            Ok(Outcome::Applied)
        }
        ReplCommand::Report | ReplCommand::Help | ReplCommand::Quit | ReplCommand::Unknown(_) => {
            return;
        }
    };

    match result {
        Ok(Outcome::Ignored { reason }) => render::print_ignored(reason),
        Ok(Outcome::Applied) => {}
        // Already shown as an error message in the timeline.
        Err(err) => tracing::debug!("[Chat] Intent failed: {}", err),
    }
}

async fn load_all(paths: &[PathBuf]) -> AraResult<Vec<MediaItem>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(load_media(path).await?);
    }
    Ok(files)
}
