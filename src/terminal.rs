//! Terminal front end: colored output and a stdin line reader.

use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::view::{Line, View};

/// Prints to stdout; alerts go to stderr.
#[derive(Debug, Default)]
pub struct TerminalView {
    last_typing: Option<String>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl View for TerminalView {
    fn render_rooms(&mut self, rooms: &[String], current: &str) {
        let list = rooms
            .iter()
            .map(|room| {
                if room == current {
                    format!("[{room}]").bright_green().bold().to_string()
                } else {
                    room.normal().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        println!("{} {}", "salas:".bold(), list);
    }

    fn render_line(&mut self, line: &Line) {
        match line {
            Line::System(text) => println!("{}", format!("  * {text}").dimmed().italic()),
            Line::Sent(text) => println!("{} {}", "»".bright_green(), text),
            Line::Received { user, text } => {
                println!("{} {}", format!("{user}:").bright_cyan().bold(), text)
            }
        }
    }

    fn set_typing(&mut self, text: Option<&str>) {
        // A printed line cannot be taken back, so only changes are shown.
        if let Some(text) = text {
            if self.last_typing.as_deref() != Some(text) {
                println!("{}", text.yellow().dimmed());
            }
        }
        self.last_typing = text.map(str::to_string);
    }

    fn alert(&mut self, message: &str) {
        eprintln!("{} {}", "!".bright_red().bold(), message.bright_red());
    }

    fn notice(&mut self, message: &str) {
        println!("{}", message.bright_blue());
    }
}

/// Read stdin line by line on a background task. The receiver closes at EOF.
pub fn spawn_stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}
