//! Line commands typed while the dashboard runs.
//!
//! One thread owns stdin. After handing over a line it waits to be resumed,
//! so it never reads while a setup prompt has the terminal.

use std::{
    io::{self, BufRead},
    sync::mpsc as std_mpsc,
    thread,
};

use log::debug;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Configure,
    Sync,
    Quit,
    Unknown,
}

impl ConsoleCommand {
    /// With `setup_pending`, a bare Enter opens setup.
    pub fn parse(line: &str, setup_pending: bool) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "c" | "config" | "configure" => ConsoleCommand::Configure,
            "" if setup_pending => ConsoleCommand::Configure,
            "s" | "sync" => ConsoleCommand::Sync,
            "q" | "quit" => ConsoleCommand::Quit,
            _ => ConsoleCommand::Unknown,
        }
    }
}

pub const HELP: &str = "Commands: c = change API key/ZIP, s = sync now, q = quit (then Enter)";

pub struct Console {
    lines: mpsc::Receiver<String>,
    resume: std_mpsc::Sender<()>,
    open: bool,
}

impl Console {
    pub fn spawn() -> Self {
        let (line_tx, lines) = mpsc::channel(1);
        let (resume, resume_rx) = std_mpsc::channel();

        thread::spawn(move || {
            let stdin = io::stdin();
            loop {
                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                if line_tx.blocking_send(line).is_err() || resume_rx.recv().is_err() {
                    break;
                }
            }
            debug!("Console reader stopped");
        });

        Self { lines, resume, open: true }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Next line typed; `None` once stdin is closed.
    ///
    /// Call [`Console::resume`] when done with the line.
    pub async fn next_line(&mut self) -> Option<String> {
        let line = self.lines.recv().await;
        if line.is_none() {
            self.open = false;
        }
        line
    }

    /// Let the reader take the next line.
    pub fn resume(&self) {
        let _ = self.resume.send(());
    }
}
