//! Terminal rendering of conversation state.

use crate::repl::COMMANDS;
use ara_application::{ConversationController, IgnoreReason};
use ara_core::capture::RecordingState;
use ara_core::conversation::{
    ChatMessage, ConversationPhase, MessageId, MessageSender, TimelineView,
};
use ara_core::report::ReportAggregate;
use colored::Colorize;
use std::sync::Arc;
use tokio::sync::watch;

pub fn print_banner() {
    println!("{}", "=== ARA - Accident Report Assistant ===".bright_magenta().bold());
    println!(
        "{}",
        "Describe the accident, then attach media. Type /help for commands.".bright_black()
    );
    println!();
}

pub fn print_help() {
    for (name, help) in COMMANDS {
        println!("  {} {}", name.bright_cyan(), help.bright_black());
    }
}

fn print_message(message: &ChatMessage) {
    match message.sender() {
        MessageSender::User => println!("{}", format!("> {}", message.content()).green()),
        MessageSender::System => {
            for line in message.content().lines() {
                println!("{}", line.bright_blue());
            }
        }
        MessageSender::Error => println!("{}", format!("! {}", message.content()).red()),
    }
}

/// Prints messages as they are appended, until the timeline goes away.
///
/// Identifiers grow across restarts, so anything newer than the last
/// printed id is new.
pub async fn print_timeline(mut view: watch::Receiver<TimelineView>) {
    let mut last_printed: Option<MessageId> = None;
    let mut thinking = false;

    loop {
        {
            let current = view.borrow_and_update();
            for message in current.messages.iter() {
                if !last_printed.is_none_or(|last| message.id() > last) {
                    continue;
                }
                print_message(message);
                last_printed = Some(message.id());
            }
            if current.thinking && !thinking {
                println!("{}", "... thinking".bright_black());
            }
            thinking = current.thinking;
        }

        if view.changed().await.is_err() {
            break;
        }
    }
}

/// Prints the upload percentage whenever it grows, naming the job.
pub async fn print_progress(controller: Arc<ConversationController>) {
    let mut percent = controller.subscribe_progress();
    while percent.changed().await.is_ok() {
        let current = *percent.borrow_and_update();
        if current == 0 {
            continue;
        }
        let what = controller
            .current_upload()
            .map(|job| format!("{} {}(s)", job.item_count, job.kind))
            .unwrap_or_else(|| "media".to_string());
        println!("{}", format!("Uploading {what}... {current}%").bright_black());
    }
}

/// Prints phase changes.
pub async fn print_phase(mut phase: watch::Receiver<ConversationPhase>) {
    while phase.changed().await.is_ok() {
        let current = *phase.borrow_and_update();
        let hint = match current {
            ConversationPhase::Intake => "",
            ConversationPhase::MediaPending => " (/upload or /camera)",
            ConversationPhase::Complete => " (/report to view, /restart for another)",
        };
        println!("{}", format!("[step: {current}]{hint}").bright_magenta());
    }
}

/// Prints camera state transitions.
pub async fn print_capture(mut state: watch::Receiver<RecordingState>) {
    while state.changed().await.is_ok() {
        let current = *state.borrow_and_update();
        let hint = match current {
            RecordingState::Streaming => " (/record to start)",
            RecordingState::Recording => " (/stop to finish)",
            RecordingState::Reviewing => " (/send to upload, /retake to record again)",
            _ => "",
        };
        println!("{}", format!("[camera: {current}]{hint}").bright_yellow());
    }
}

pub fn print_ignored(reason: IgnoreReason) {
    let text = match reason {
        IgnoreReason::WrongPhase(phase) => format!("Not available right now ({phase})."),
        IgnoreReason::CallPending => "Still waiting for the server...".to_string(),
        IgnoreReason::MediaFlowActive => "An upload is already being handled.".to_string(),
        IgnoreReason::CaptureState(state) => format!("The camera is {state}."),
        IgnoreReason::Stale => return,
    };
    println!("{}", text.bright_black());
}

pub fn print_report(report: Option<&ReportAggregate>) {
    let Some(report) = report else {
        println!("{}", "The report is not ready yet.".bright_black());
        return;
    };

    println!("{}", format!("Report {}", report.report_id).bold());
    if let Some(description) = &report.description {
        println!("{description}");
    }
    println!(
        "{}",
        format!("{} attachment(s), {}", report.media_refs.len(), report.media_kind).bright_black()
    );
    for media_ref in &report.media_refs {
        println!("  {}", media_ref.bright_black());
    }
}
