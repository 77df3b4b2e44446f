//! REPL input parsing and line editing helpers.

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::PathBuf;

/// Slash commands with their one-line help.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/upload", "<files...>  upload 4-6 photos or one video"),
    ("/camera", "open the camera preview"),
    ("/record", "start recording (opens the camera if needed)"),
    ("/stop", "stop recording and review the clip"),
    ("/retake", "discard the clip and record again"),
    ("/send", "upload the reviewed recording"),
    ("/close", "close the camera"),
    ("/report", "show the finished report"),
    ("/restart", "start over with a new accident"),
    ("/help", "show this help"),
    ("/quit", "exit"),
];

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Free text: the accident description.
    Text(String),
    Upload(Vec<PathBuf>),
    Camera,
    Record,
    Stop,
    Retake,
    Send,
    Close,
    Report,
    Restart,
    Help,
    Quit,
    /// A slash command that does not exist, or `/upload` without files.
    Unknown(String),
}

impl ReplCommand {
    /// Parses a trimmed, non-empty input line.
    pub fn parse(line: &str) -> Self {
        if !line.starts_with('/') {
            return Self::Text(line.to_string());
        }

        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        match command {
            "/upload" => {
                let files: Vec<PathBuf> = words.map(PathBuf::from).collect();
                if files.is_empty() {
                    Self::Unknown(line.to_string())
                } else {
                    Self::Upload(files)
                }
            }
            "/camera" => Self::Camera,
            "/record" => Self::Record,
            "/stop" => Self::Stop,
            "/retake" => Self::Retake,
            "/send" => Self::Send,
            "/close" => Self::Close,
            "/report" => Self::Report,
            "/restart" => Self::Restart,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// rustyline helper providing slash-command completion, highlighting and hints.
#[derive(Clone)]
pub struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}
