//! Configuration value checks.
//!
//! Every helper names the offending field and fails with `InvalidConfig` so
//! the message can go straight to the user.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, ErrorCode, Result};
use crate::hints::generator::parse_alphabet;
use crate::input::Key;

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::new(ErrorCode::InvalidConfig, message).with_context("field", field)
}

fn hex_color() -> Result<&'static Regex> {
    static HEX: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    HEX.get_or_init(|| Regex::new(r"^#([0-9A-Fa-f]{3}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$"))
        .as_ref()
        .map_err(|e| Error::internal(format!("color pattern: {}", e)))
}

/// Accepts `#RGB`, `#RRGGBB` and `#RRGGBBAA`.
pub fn validate_color(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(field, format!("{} cannot be empty", field)));
    }
    if !hex_color()?.is_match(value) {
        return Err(invalid(
            field,
            format!("{} has invalid hex color '{}' (expected #RGB, #RRGGBB or #RRGGBBAA)", field, value),
        ));
    }
    Ok(())
}

/// At least two distinct printable characters.
pub fn validate_alphabet(field: &str, value: &str) -> Result<()> {
    parse_alphabet(value)
        .map(|_| ())
        .map_err(|e| invalid(field, format!("{}: {}", field, e.message())))
}

pub fn validate_role_names(field: &str, roles: &[String]) -> Result<()> {
    if let Some(index) = roles.iter().position(|r| r.trim().is_empty()) {
        return Err(invalid(field, format!("{}[{}] is an empty role name", field, index)));
    }
    Ok(())
}

pub fn validate_positive(field: &str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(invalid(field, format!("{} must be positive, got {}", field, value)));
    }
    Ok(())
}

pub fn validate_at_least(field: &str, value: i64, min: i64) -> Result<()> {
    if value < min {
        return Err(invalid(field, format!("{} must be at least {}, got {}", field, min, value)));
    }
    Ok(())
}

/// Exactly `count` distinct ASCII graphic characters, compared without case.
pub fn validate_cell_keys(field: &str, keys: &str, count: usize) -> Result<()> {
    if let Some(c) = keys.chars().find(|c| !c.is_ascii_graphic()) {
        return Err(invalid(field, format!("{} has non-ASCII or blank key '{}'", field, c)));
    }
    let len = keys.chars().count();
    if len != count {
        return Err(invalid(field, format!("{} needs {} keys, got {}", field, count, len)));
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(c) = keys.chars().find(|c| !seen.insert(c.to_ascii_lowercase())) {
        return Err(invalid(field, format!("{} repeats key '{}'", field, c)));
    }
    Ok(())
}

pub fn validate_opacity(field: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("{} must be between 0 and 1, got {}", field, value)));
    }
    Ok(())
}

pub fn validate_keys(field: &str, keys: &[String]) -> Result<Vec<Key>> {
    keys.iter()
        .map(|raw| {
            Key::normalize(raw).ok_or_else(|| invalid(field, format!("{} has unrecognized key '{}'", field, raw)))
        })
        .collect()
}

pub fn validate_bundle_ids(field: &str, bundles: &[String]) -> Result<()> {
    for bundle in bundles {
        let trimmed = bundle.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Err(invalid(field, format!("{} has an empty bundle pattern", field)));
        }
        if trimmed.strip_suffix('*').unwrap_or(trimmed).contains('*') {
            return Err(invalid(
                field,
                format!("{} pattern '{}' may only end with '*'", field, bundle),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_hex_colors() {
        assert!(validate_color("c", "#fff").is_ok());
        assert!(validate_color("c", "#FFD700").is_ok());
        assert!(validate_color("c", "#FFD700CC").is_ok());
        assert!(validate_color("c", "FFD700").is_err());
        assert!(validate_color("c", "#FFD7").is_err());
        let err = validate_color("hints.style.text_color", "").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert_eq!(err.context().get("field").map(String::as_str), Some("hints.style.text_color"));
    }

    #[test]
    fn validates_alphabets() {
        assert!(validate_alphabet("a", "asdf").is_ok());
        assert_eq!(validate_alphabet("a", "aa").unwrap_err().code(), ErrorCode::InvalidConfig);
        assert!(validate_alphabet("a", "x").is_err());
    }

    #[test]
    fn rejects_empty_roles_and_bad_steps() {
        assert!(validate_role_names("r", &["AXButton".into(), " ".into()]).is_err());
        assert!(validate_positive("s", 0).is_err());
        assert!(validate_positive("s", 50).is_ok());
        assert!(validate_opacity("o", 1.5).is_err());
    }

    #[test]
    fn validates_cell_keys() {
        assert!(validate_cell_keys("k", "uijk", 4).is_ok());
        assert!(validate_cell_keys("k", "uiJj", 4).is_err());
        assert!(validate_cell_keys("k", "uij", 4).is_err());
        assert!(validate_cell_keys("k", "ui k", 4).is_err());
        assert!(validate_at_least("m", 10, 10).is_ok());
        assert!(validate_at_least("m", 9, 10).is_err());
    }

    #[test]
    fn validates_bundle_patterns() {
        assert!(validate_bundle_ids("b", &["com.foo.*".into(), "com.bar".into()]).is_ok());
        assert!(validate_bundle_ids("b", &["*".into()]).is_err());
        assert!(validate_bundle_ids("b", &["com.*.bar".into()]).is_err());
    }

    #[test]
    fn parses_exit_keys() {
        let keys = validate_keys("k", &["escape".into(), "Ctrl+C".into()]).unwrap();
        assert_eq!(keys[0], Key::escape());
        assert!(validate_keys("k", &["nope+x".into()]).is_err());
    }
}
