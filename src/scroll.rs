/*!
 * Scroll Key Map
 *
 * Translates keys pressed in scroll mode into scroll commands. A binding is
 * either a single normalized key (`j`, `Ctrl+D`, `PageDown`) or a two-letter
 * sequence such as `gg`, whose second key must arrive within
 * `SEQUENCE_TIMEOUT` of the first.
 */

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::{ScrollAmount, ScrollDirection};
use crate::error::{Error, ErrorCode, Result};
use crate::input::Key;

/// Longest gap allowed between the two keys of a sequence.
pub const SEQUENCE_TIMEOUT: Duration = Duration::from_millis(500);

/// Named scroll operations that keys bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollCommand {
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
    GoTop,
    GoBottom,
    PageUp,
    PageDown,
}

impl ScrollCommand {
    pub fn target(&self) -> (ScrollDirection, ScrollAmount) {
        use ScrollAmount::*;
        use ScrollDirection::*;
        match self {
            ScrollCommand::ScrollUp => (Up, Char),
            ScrollCommand::ScrollDown => (Down, Char),
            ScrollCommand::ScrollLeft => (Left, Char),
            ScrollCommand::ScrollRight => (Right, Char),
            ScrollCommand::GoTop => (Up, End),
            ScrollCommand::GoBottom => (Down, End),
            ScrollCommand::PageUp => (Up, HalfPage),
            ScrollCommand::PageDown => (Down, HalfPage),
        }
    }
}

impl fmt::Display for ScrollCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (direction, amount) = self.target();
        write!(f, "{:?}/{:?}", direction, amount)
    }
}

/// Bindings shipped out of the box.
pub fn default_bindings() -> BTreeMap<ScrollCommand, Vec<String>> {
    let table: [(ScrollCommand, &[&str]); 8] = [
        (ScrollCommand::ScrollUp, &["k", "Up"]),
        (ScrollCommand::ScrollDown, &["j", "Down"]),
        (ScrollCommand::ScrollLeft, &["h", "Left"]),
        (ScrollCommand::ScrollRight, &["l", "Right"]),
        (ScrollCommand::GoTop, &["gg", "Cmd+Up"]),
        (ScrollCommand::GoBottom, &["Shift+G", "Cmd+Down"]),
        (ScrollCommand::PageUp, &["Ctrl+U", "PageUp"]),
        (ScrollCommand::PageDown, &["Ctrl+D", "PageDown"]),
    ];
    table
        .into_iter()
        .map(|(cmd, keys)| (cmd, keys.iter().map(|k| k.to_string()).collect()))
        .collect()
}

fn as_sequence(binding: &str) -> Option<[char; 2]> {
    let mut chars = binding.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), None) if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
            Some([a.to_ascii_lowercase(), b.to_ascii_lowercase()])
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollKeyMap {
    keys: HashMap<Key, ScrollCommand>,
    sequences: HashMap<[char; 2], ScrollCommand>,
    sequence_starts: HashSet<char>,
}

impl ScrollKeyMap {
    /// Builds the map. An unparseable binding is `InvalidConfig`.
    pub fn new(bindings: &BTreeMap<ScrollCommand, Vec<String>>) -> Result<Self> {
        let mut map = Self::default();
        for (command, keys) in bindings {
            for binding in keys {
                if let Some(seq) = as_sequence(binding) {
                    map.sequences.insert(seq, *command);
                    map.sequence_starts.insert(seq[0]);
                    continue;
                }
                let key = Key::normalize(binding).ok_or_else(|| {
                    Error::new(ErrorCode::InvalidConfig, format!("invalid scroll key '{}'", binding))
                        .with_context("command", command)
                })?;
                map.keys.insert(key, *command);
            }
        }
        Ok(map)
    }

    pub fn lookup(&self, key: &Key) -> Option<ScrollCommand> {
        self.keys.get(key).copied()
    }

    pub fn is_sequence_start(&self, key: &Key) -> bool {
        key.as_char()
            .map(|c| self.sequence_starts.contains(&c))
            .unwrap_or(false)
    }

    pub fn lookup_sequence(&self, first: char, second: char) -> Option<ScrollCommand> {
        self.sequences.get(&[first, second]).copied()
    }
}

/// Result of feeding one key to a [`ScrollInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Command(ScrollCommand),
    /// First key of a sequence; waiting for the second.
    Pending,
    Ignored,
}

/// Per-session scroll key state.
#[derive(Debug, Clone)]
pub struct ScrollInput {
    keymap: ScrollKeyMap,
    pending: Option<(char, Instant)>,
}

impl ScrollInput {
    pub fn new(keymap: ScrollKeyMap) -> Self {
        Self {
            keymap,
            pending: None,
        }
    }

    pub fn reset(&mut self) {
        self.pending = None;
    }

    pub fn handle_key(&mut self, key: &Key) -> ScrollOutcome {
        self.handle_key_at(key, Instant::now())
    }

    pub fn handle_key_at(&mut self, key: &Key, now: Instant) -> ScrollOutcome {
        if let Some((first, at)) = self.pending.take() {
            if now.duration_since(at) <= SEQUENCE_TIMEOUT {
                if let Some(command) = key.as_char().and_then(|c| self.keymap.lookup_sequence(first, c)) {
                    return ScrollOutcome::Command(command);
                }
            } else {
                debug!("[Scroll] Sequence '{}' timed out", first);
            }
        }

        if self.keymap.is_sequence_start(key) {
            if let Some(c) = key.as_char() {
                self.pending = Some((c, now));
                return ScrollOutcome::Pending;
            }
        }
        match self.keymap.lookup(key) {
            Some(command) => ScrollOutcome::Command(command),
            None => ScrollOutcome::Ignored,
        }
    }
}
