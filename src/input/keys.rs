/*!
 * Key Normalizer
 *
 * Converts raw key strings from the keyboard tap, the stdin driver and the
 * config file into a single `Key` value shared by every mode.
 *
 * Accepted spellings:
 * - "a", "G" → printable characters (case kept)
 * - "esc", "Escape", "\x1b" → Escape
 * - "backspace", "delete", "\x7f" → Backspace
 * - "Ctrl+D", "\x04" → ctrl+d
 * - "Up", "\x1f", "PageDown" → named keys
 * - "Shift+G" → "G"
 */

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Escape,
    Backspace,
    Enter,
    Tab,
    Space,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub cmd: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.cmd)
    }
}

/// A normalized key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    pub modifiers: Modifiers,
    pub code: KeyCode,
}

impl Key {
    pub fn new(modifiers: Modifiers, code: KeyCode) -> Self {
        Self { modifiers, code }
    }

    pub fn plain(code: KeyCode) -> Self {
        Self::new(Modifiers::none(), code)
    }

    pub fn char(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    pub fn escape() -> Self {
        Self::plain(KeyCode::Escape)
    }

    pub fn backspace() -> Self {
        Self::plain(KeyCode::Backspace)
    }

    /// Parses a raw key string. Returns `None` for anything unrecognized.
    pub fn normalize(raw: &str) -> Option<Key> {
        if raw.is_empty() {
            return None;
        }

        let mut chars = raw.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::from_single_char(c);
        }

        let parts: Vec<&str> = raw
            .split('+')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        let (last, prefix) = parts.split_last()?;

        let mut modifiers = Modifiers::none();
        for part in prefix {
            match part.to_lowercase().as_str() {
                "control" | "ctrl" => modifiers.ctrl = true,
                "alt" | "option" | "meta" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "super" | "cmd" | "command" => modifiers.cmd = true,
                other => {
                    debug!("[Keys] Unknown modifier '{}' in '{}'", other, raw);
                    return None;
                }
            }
        }

        let code = Self::named_code(last)?;
        let key = match code {
            KeyCode::Char(c) if modifiers.shift && c.is_alphabetic() => {
                modifiers.shift = false;
                Key::new(modifiers, KeyCode::Char(c.to_ascii_uppercase()))
            }
            KeyCode::Char(c) if !modifiers.is_empty() => {
                Key::new(modifiers, KeyCode::Char(c.to_ascii_lowercase()))
            }
            code => Key::new(modifiers, code),
        };
        Some(key)
    }

    fn from_single_char(c: char) -> Option<Key> {
        let key = match c {
            '\x1b' => Key::escape(),
            '\x7f' | '\x08' => Key::backspace(),
            '\r' | '\n' => Key::plain(KeyCode::Enter),
            '\t' => Key::plain(KeyCode::Tab),
            ' ' => Key::plain(KeyCode::Space),
            '\x1f' => Key::plain(KeyCode::Up),
            '\x1e' => Key::plain(KeyCode::Down),
            '\x1d' => Key::plain(KeyCode::Left),
            '\x1c' => Key::plain(KeyCode::Right),
            '\x01'..='\x1a' => {
                let letter = (b'a' + (c as u8) - 1) as char;
                Key::new(Modifiers::ctrl(), KeyCode::Char(letter))
            }
            c if c.is_control() => return None,
            c => Key::char(c),
        };
        Some(key)
    }

    fn named_code(name: &str) -> Option<KeyCode> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(KeyCode::Char(c));
        }
        let code = match name.to_lowercase().as_str() {
            "esc" | "escape" => KeyCode::Escape,
            "backspace" | "delete" | "del" => KeyCode::Backspace,
            "return" | "enter" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "space" => KeyCode::Space,
            "up" | "arrowup" => KeyCode::Up,
            "down" | "arrowdown" => KeyCode::Down,
            "left" | "arrowleft" => KeyCode::Left,
            "right" | "arrowright" => KeyCode::Right,
            "pageup" => KeyCode::PageUp,
            "pagedown" => KeyCode::PageDown,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            _ => return None,
        };
        Some(code)
    }

    /// The character typed, if this is an unmodified printable key.
    pub fn as_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) if self.modifiers.is_empty() => Some(c),
            _ => None,
        }
    }

    /// Unmodified alphanumeric or punctuation key.
    pub fn is_graphic(&self) -> bool {
        self.as_char().map(|c| !c.is_whitespace()).unwrap_or(false)
    }

    pub fn is_escape(&self) -> bool {
        self.code == KeyCode::Escape && self.modifiers.is_empty()
    }

    pub fn is_backspace(&self) -> bool {
        self.code == KeyCode::Backspace && self.modifiers.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (on, name) in [(m.cmd, "cmd"), (m.ctrl, "ctrl"), (m.alt, "alt"), (m.shift, "shift")] {
            if on {
                write!(f, "{}+", name)?;
            }
        }
        match self.code {
            KeyCode::Char(c) => write!(f, "{}", c),
            KeyCode::Escape => f.write_str("Escape"),
            KeyCode::Backspace => f.write_str("Backspace"),
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Tab => f.write_str("Tab"),
            KeyCode::Space => f.write_str("Space"),
            KeyCode::Up => f.write_str("Up"),
            KeyCode::Down => f.write_str("Down"),
            KeyCode::Left => f.write_str("Left"),
            KeyCode::Right => f.write_str("Right"),
            KeyCode::PageUp => f.write_str("PageUp"),
            KeyCode::PageDown => f.write_str("PageDown"),
            KeyCode::Home => f.write_str("Home"),
            KeyCode::End => f.write_str("End"),
        }
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Key::normalize(raw).ok_or_else(|| {
            Error::new(ErrorCode::InvalidInput, format!("unrecognized key '{}'", raw.escape_default()))
        })
    }
}

impl TryFrom<String> for Key {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}
