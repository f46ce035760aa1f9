/*!
 * Hint Label Generator
 *
 * Produces a prefix-free set of labels of length ≤ 3 over an alphabet. Each
 * level keeps as many labels as possible while leaving enough slots for the
 * remainder one level down; labels within a level come from a base-N counter
 * that starts right after the previous level's kept prefixes.
 */

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Hint;
use crate::a11y::Element;
use crate::error::{Error, ErrorCode, Result};

/// Longest label the generator emits.
pub const MAX_LABEL_LENGTH: u32 = 3;

/// Uppercases `alphabet` and checks it holds at least two distinct
/// printable characters. Shared by hint and grid mode.
pub fn parse_alphabet(alphabet: &str) -> Result<Vec<char>> {
    let mut chars: Vec<char> = Vec::new();
    for c in alphabet.chars().flat_map(char::to_uppercase) {
        if c.is_whitespace() || c.is_control() {
            return Err(Error::new(
                ErrorCode::InvalidInput,
                "alphabet may only contain printable characters",
            )
            .with_context("alphabet", alphabet));
        }
        if chars.contains(&c) {
            return Err(Error::new(
                ErrorCode::InvalidInput,
                format!("alphabet contains '{}' more than once", c),
            )
            .with_context("alphabet", alphabet));
        }
        chars.push(c);
    }
    if chars.len() < 2 {
        return Err(Error::new(
            ErrorCode::InvalidInput,
            format!("alphabet needs at least 2 characters, got {}", chars.len()),
        ));
    }
    Ok(chars)
}

/// Generates hint labels for a fixed alphabet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGenerator {
    alphabet: Vec<char>,
}

impl LabelGenerator {
    /// Builds a generator. The alphabet is uppercased and must hold at least
    /// two distinct printable characters.
    pub fn new(alphabet: &str) -> Result<Self> {
        Ok(Self {
            alphabet: parse_alphabet(alphabet)?,
        })
    }

    pub fn alphabet(&self) -> String {
        self.alphabet.iter().collect()
    }

    /// Largest label count this alphabet supports (N³).
    pub fn capacity(&self) -> usize {
        self.alphabet.len().pow(MAX_LABEL_LENGTH)
    }

    /// Number of labels kept at each length, shortest first.
    fn level_counts(&self, count: usize) -> Vec<usize> {
        let n = self.alphabet.len();
        let mut counts = Vec::with_capacity(MAX_LABEL_LENGTH as usize);
        let mut remaining = count;
        let mut available = n;

        while remaining > 0 && available > 0 {
            let keep = if available >= remaining {
                remaining
            } else if available * n < remaining {
                0
            } else {
                (available * n - remaining) / (n - 1)
            };
            counts.push(keep);
            remaining -= keep;
            available = (available - keep) * n;
        }
        counts
    }

    /// Returns `count` labels ordered by length, then alphabet order.
    pub fn labels(&self, count: usize) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if count > self.capacity() {
            return Err(Error::new(
                ErrorCode::HintGenerationFailed,
                format!("too many elements: {} exceeds maximum {}", count, self.capacity()),
            ));
        }

        let n = self.alphabet.len();
        let mut labels = Vec::with_capacity(count);
        let mut counter: Vec<usize> = Vec::new();

        for (level, keep) in self.level_counts(count).into_iter().enumerate() {
            let length = level + 1;
            if length == 1 {
                labels.extend(self.alphabet[..keep].iter().map(|c| c.to_string()));
                counter = vec![keep];
                continue;
            }
            counter.resize(length, 0);
            for _ in 0..keep {
                labels.push(counter.iter().map(|&i| self.alphabet[i]).collect());
                for digit in counter.iter_mut().rev() {
                    *digit += 1;
                    if *digit < n {
                        break;
                    }
                    *digit = 0;
                }
            }
        }
        Ok(labels)
    }

    /// Assigns labels to elements, top-to-bottom then left-to-right.
    pub fn generate(&self, mut elements: Vec<Element>, cancel: &CancellationToken) -> Result<Vec<Hint>> {
        if elements.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(Error::canceled());
        }

        let labels = self.labels(elements.len())?;
        elements.sort_by_key(|e| {
            let b = e.bounds();
            (b.y, b.x)
        });

        if cancel.is_cancelled() {
            return Err(Error::canceled());
        }

        let hints = labels
            .into_iter()
            .zip(elements)
            .map(|(label, element)| Hint::new(label, Arc::new(element)))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::wrap(e, ErrorCode::HintGenerationFailed, "failed to build hint"))?;
        debug!("[Labels] Generated {} hints over '{}'", hints.len(), self.alphabet());
        Ok(hints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::{ElementId, Role};
    use crate::geometry::Rect;

    fn element(x: i32, y: i32) -> Element {
        Element::new(
            ElementId::new(format!("el-{}-{}", x, y)),
            Rect::new(x, y, 10, 10),
            Role::Button,
            true,
            "",
            "",
        )
        .unwrap()
    }

    #[test]
    fn keeps_room_for_longer_labels() {
        let gen = LabelGenerator::new("asdf").unwrap();
        assert_eq!(gen.labels(5).unwrap(), ["A", "S", "D", "FA", "FS"]);
        assert_eq!(gen.level_counts(5), [3, 2]);
    }

    #[test]
    fn alphabet_fits_exactly() {
        let gen = LabelGenerator::new("asdf").unwrap();
        assert_eq!(gen.labels(4).unwrap(), ["A", "S", "D", "F"]);
    }

    #[test]
    fn saturation_uses_only_three_char_labels() {
        let gen = LabelGenerator::new("asd").unwrap();
        let labels = gen.labels(27).unwrap();
        assert_eq!(labels.len(), 27);
        assert!(labels.iter().all(|l| l.len() == 3));
        assert_eq!(labels.first().map(String::as_str), Some("AAA"));
        assert_eq!(labels.last().map(String::as_str), Some("DDD"));
    }

    #[test]
    fn over_capacity_fails() {
        let gen = LabelGenerator::new("as").unwrap();
        let err = gen.labels(9).unwrap_err();
        assert_eq!(err.code(), ErrorCode::HintGenerationFailed);
    }

    #[test]
    fn zero_count_is_empty() {
        let gen = LabelGenerator::new("as").unwrap();
        assert!(gen.labels(0).unwrap().is_empty());
    }

    #[test]
    fn invalid_alphabets() {
        assert!(LabelGenerator::new("a").is_err());
        assert!(LabelGenerator::new("aA").is_err());
        assert!(LabelGenerator::new("a s").is_err());
        assert_eq!(LabelGenerator::new("Jk;").unwrap().alphabet(), "JK;");
    }

    #[test]
    fn positional_ordering() {
        let gen = LabelGenerator::new("asdf").unwrap();
        let hints = gen
            .generate(
                vec![element(10, 100), element(10, 10), element(100, 10)],
                &CancellationToken::new(),
            )
            .unwrap();
        let placed: Vec<_> = hints
            .iter()
            .map(|h| (h.label().to_string(), h.element().bounds().x, h.element().bounds().y))
            .collect();
        assert_eq!(
            placed,
            [
                ("A".to_string(), 10, 10),
                ("S".to_string(), 100, 10),
                ("D".to_string(), 10, 100)
            ]
        );
    }

    #[test]
    fn cancelled_generation_emits_nothing() {
        let gen = LabelGenerator::new("asdf").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = gen.generate(vec![element(0, 0)], &cancel).unwrap_err();
        assert!(err.is_cancellation());
    }
}
