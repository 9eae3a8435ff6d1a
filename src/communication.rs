use std::path::PathBuf;

use crate::photo::PhotoHandle;

/// Everything that reaches the alarm driver from outside its own loop:
/// user actions and photos finishing their background load.
#[derive(Debug, Clone)]
pub enum Message {
    WakeUp,
    AnotherRound,
    Acknowledge,
    Disarm,
    Reset,
    PhotoLoaded(PhotoHandle),
    PhotoFailed { path: PathBuf, reason: String },
    Quit,
}

impl Message {
    /// Maps a line typed into the terminal runner to an action.
    #[must_use]
    pub fn from_command(line: &str) -> Option<Self> {
        Some(match line.trim().to_ascii_lowercase().as_str() {
            "w" | "wake" | "cancel" => Self::WakeUp,
            "r" | "round" | "again" => Self::AnotherRound,
            "o" | "ok" => Self::Acknowledge,
            "d" | "disarm" => Self::Disarm,
            "x" | "reset" => Self::Reset,
            "q" | "quit" | "exit" => Self::Quit,
            _ => return None,
        })
    }
}
