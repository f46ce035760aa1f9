//! Typed-prefix state for hint mode.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{Hint, HintCollection};
use crate::input::Key;

type UpdateCallback = Box<dyn FnMut(&[Hint]) + Send>;

/// Outcome of one keystroke.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputResult {
    /// Set when the prefix now equals exactly one label.
    pub matched: Option<Hint>,
    /// Whether the filtered view changed.
    pub changed: bool,
}

/// Accumulates typed characters and narrows the visible hints.
///
/// Once a hint has matched, further input is ignored until the collection
/// is replaced or the manager is reset.
pub struct HintManager {
    collection: Arc<HintCollection>,
    prefix: String,
    filtered: Vec<Hint>,
    matched: bool,
    on_update: Option<UpdateCallback>,
}

impl HintManager {
    pub fn new() -> Self {
        Self {
            collection: Arc::new(HintCollection::default()),
            prefix: String::new(),
            filtered: Vec::new(),
            matched: false,
            on_update: None,
        }
    }

    /// Registers the redraw callback, replacing any previous one.
    pub fn on_update(&mut self, callback: impl FnMut(&[Hint]) + Send + 'static) {
        self.on_update = Some(Box::new(callback));
    }

    pub fn set_collection(&mut self, collection: Arc<HintCollection>) {
        self.collection = collection;
        self.prefix.clear();
        self.matched = false;
        self.show_all();
    }

    pub fn collection(&self) -> &Arc<HintCollection> {
        &self.collection
    }

    /// Clears the typed prefix. A second reset is a no-op.
    pub fn reset(&mut self) {
        if self.prefix.is_empty() && !self.matched {
            return;
        }
        self.prefix.clear();
        self.matched = false;
        self.show_all();
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn filtered(&self) -> &[Hint] {
        &self.filtered
    }

    pub fn handle_input(&mut self, key: &Key) -> InputResult {
        if self.matched {
            return InputResult::default();
        }

        if key.is_backspace() {
            self.prefix.pop();
            if self.prefix.is_empty() {
                self.show_all();
            } else {
                self.show_prefix();
            }
            return InputResult {
                matched: None,
                changed: true,
            };
        }

        let typed = match key.as_char() {
            Some(c) if key.is_graphic() => c,
            _ => return InputResult::default(),
        };

        let mut candidate = self.prefix.clone();
        candidate.extend(typed.to_uppercase());
        if self.collection.filter_by_prefix(&candidate).is_empty() {
            debug!("[Hints] No label starts with '{}', resetting", candidate);
            self.prefix.clear();
            self.show_all();
            return InputResult {
                matched: None,
                changed: true,
            };
        }

        self.prefix = candidate;
        self.show_prefix();

        let matched = match self.filtered.as_slice() {
            [only] if only.label() == self.prefix => Some(only.clone()),
            _ => None,
        };
        if matched.is_some() {
            self.matched = true;
        }
        InputResult {
            matched,
            changed: true,
        }
    }

    fn show_all(&mut self) {
        self.filtered = self.collection.all().to_vec();
        self.emit();
    }

    fn show_prefix(&mut self) {
        let len = self.prefix.chars().count();
        self.filtered = self
            .collection
            .filter_by_prefix(&self.prefix)
            .into_iter()
            .map(|h| h.with_matched_prefix(len))
            .collect();
        self.emit();
    }

    fn emit(&mut self) {
        if let Some(callback) = self.on_update.as_mut() {
            callback(&self.filtered);
        }
    }
}

impl Default for HintManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HintManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HintManager")
            .field("prefix", &self.prefix)
            .field("filtered", &self.filtered.len())
            .field("matched", &self.matched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::{Element, ElementId, Role};
    use crate::geometry::Rect;
    use crate::input::KeyCode;
    use std::sync::Mutex;

    fn collection(labels: &[&str]) -> Arc<HintCollection> {
        let hints = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let element = Element::new(
                    ElementId::new(format!("el-{}", i)),
                    Rect::new(i as i32 * 10, 0, 10, 10),
                    Role::Button,
                    true,
                    "",
                    "",
                )
                .unwrap();
                Hint::new(*label, Arc::new(element)).unwrap()
            })
            .collect();
        Arc::new(HintCollection::new(hints).unwrap())
    }

    fn manager_with_log(labels: &[&str]) -> (HintManager, Arc<Mutex<Vec<Vec<String>>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let mut manager = HintManager::new();
        manager.on_update(move |hints| {
            sink.lock()
                .unwrap()
                .push(hints.iter().map(|h| h.label().to_string()).collect());
        });
        manager.set_collection(collection(labels));
        log.lock().unwrap().clear();
        (manager, log)
    }

    fn labels(manager: &HintManager) -> Vec<&str> {
        manager.filtered().iter().map(|h| h.label()).collect()
    }

    #[test]
    fn typing_narrows_then_matches() {
        let (mut m, log) = manager_with_log(&["A", "S", "DA", "DS"]);
        let r = m.handle_input(&Key::char('d'));
        assert!(r.changed && r.matched.is_none());
        assert_eq!(labels(&m), ["DA", "DS"]);
        assert!(m.filtered().iter().all(|h| h.matched_prefix() == 1));

        let r = m.handle_input(&Key::char('s'));
        assert_eq!(r.matched.map(|h| h.label().to_string()), Some("DS".to_string()));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn unknown_character_resets_to_full_set() {
        let (mut m, log) = manager_with_log(&["A", "S", "DA", "DS"]);
        m.handle_input(&Key::char('d'));
        let r = m.handle_input(&Key::char('x'));
        assert!(r.changed);
        assert_eq!(m.prefix(), "");
        assert_eq!(labels(&m), ["A", "S", "DA", "DS"]);
        assert_eq!(log.lock().unwrap().last().unwrap().len(), 4);
    }

    #[test]
    fn backspace_always_emits() {
        let (mut m, log) = manager_with_log(&["A", "S", "DA", "DS"]);
        m.handle_input(&Key::backspace());
        assert_eq!(log.lock().unwrap().len(), 1);
        m.handle_input(&Key::char('d'));
        m.handle_input(&Key::backspace());
        assert_eq!(m.prefix(), "");
        assert_eq!(labels(&m).len(), 4);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn non_graphic_keys_are_ignored() {
        let (mut m, log) = manager_with_log(&["A", "S"]);
        for key in [
            Key::plain(KeyCode::Tab),
            Key::plain(KeyCode::Space),
            Key::plain(KeyCode::Up),
            Key::normalize("ctrl+a").unwrap(),
        ] {
            assert_eq!(m.handle_input(&key), InputResult::default());
        }
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(m.prefix(), "");
    }

    #[test]
    fn at_most_one_match_per_collection() {
        let (mut m, _log) = manager_with_log(&["A", "S"]);
        assert!(m.handle_input(&Key::char('a')).matched.is_some());
        assert!(m.handle_input(&Key::char('s')).matched.is_none());
        m.reset();
        assert!(m.handle_input(&Key::char('s')).matched.is_some());
    }

    #[test]
    fn reset_is_idempotent() {
        let (mut m, log) = manager_with_log(&["A", "SA", "SS"]);
        m.handle_input(&Key::char('s'));
        m.reset();
        m.reset();
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(m.prefix(), "");
    }

    #[test]
    fn same_input_gives_same_output() {
        let run = || {
            let (mut m, _) = manager_with_log(&["A", "SA", "SS", "D"]);
            for c in ['s', 'x', 's', 's'] {
                m.handle_input(&Key::char(c));
            }
            labels(&m).iter().map(|s| s.to_string()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
