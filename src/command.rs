//! Shell command model and the filter pipeline.
//!
//! A [`Command`] is parsed once from the raw shell line recorded for a layer
//! and is immutable afterwards except for classification
//! ([`Command::recognize`]). [`partition_commands`] splits a layer's command
//! sequence into ignored text, unrecognized text, and the retained install
//! candidates without touching the caller's sequence.

use serde::{Deserialize, Serialize};

/// What a recognized command does to the package set of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    /// Installs packages; its words are candidate package names.
    Install,
    /// Administrative command with no package effect.
    Ignore,
    /// Recognized but neither an install nor an ignore.
    Neither,
}

/// One shell command recorded for a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// The raw shell line as recorded in the image history.
    pub raw: String,
    /// Program name, the lookup key into the command library.
    pub name: String,
    /// First non-flag token after the program name, if any.
    pub subcommand: Option<String>,
    /// Remaining non-flag tokens; for install commands these are the
    /// candidate package names.
    pub words: Vec<String>,
    /// Set when the command matched a command-library entry.
    pub recognized: bool,
    pub action: CommandAction,
}

impl Command {
    /// Parse a raw shell line into its word sequence.
    ///
    /// Tokens starting with `-` are treated as option flags and excluded
    /// from `subcommand`/`words`.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut tokens = raw.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_string();

        let mut subcommand = None;
        let mut words = Vec::new();
        for token in tokens {
            if token.starts_with('-') {
                continue;
            }
            if subcommand.is_none() {
                subcommand = Some(token.to_string());
            } else {
                words.push(token.to_string());
            }
        }

        Self {
            raw,
            name,
            subcommand,
            words,
            recognized: false,
            action: CommandAction::Neither,
        }
    }

    /// Mark the command as matched by a command-library entry.
    pub fn recognize(&mut self, action: CommandAction) {
        self.recognized = true;
        self.action = action;
    }

    pub fn is_recognized(&self) -> bool {
        self.recognized
    }

    pub fn is_install(&self) -> bool {
        self.recognized && self.action == CommandAction::Install
    }

    pub fn is_ignore(&self) -> bool {
        self.recognized && self.action == CommandAction::Ignore
    }
}

/// Result of [`partition_commands`]: the three outputs of the filter
/// pipeline. `ignored` and `unrecognized` hold the raw command text, one
/// line per command; `retained` keeps the original relative order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilteredCommands {
    pub ignored: String,
    pub unrecognized: String,
    pub retained: Vec<Command>,
}

/// Partition a command sequence into ignored, unrecognized, and retained
/// commands.
///
/// Runs as two passes: ignored commands are removed first, then
/// unrecognized ones from the remainder. Every input command lands in
/// exactly one output and the input slice is left untouched.
pub fn partition_commands(commands: &[Command]) -> FilteredCommands {
    let mut ignored = String::new();
    let mut after_ignored = Vec::new();
    for command in commands {
        if command.is_ignore() {
            ignored.push_str(&command.raw);
            ignored.push('\n');
        } else {
            after_ignored.push(command.clone());
        }
    }

    let mut unrecognized = String::new();
    let mut retained = Vec::new();
    for command in after_ignored {
        if !command.is_recognized() {
            unrecognized.push_str(&command.raw);
            unrecognized.push('\n');
        } else {
            retained.push(command);
        }
    }

    FilteredCommands {
        ignored,
        unrecognized,
        retained,
    }
}
