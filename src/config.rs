/*!
 * Configuration
 *
 * JSON configuration with one section per mode. Every field has a default,
 * so a missing file or a partial one is valid. Loaded from
 * `<config_dir>/hintpilot/config.json` unless a path is given.
 */

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::a11y::roles::default_clickable_roles;
use crate::a11y::{ElementFilter, Role};
use crate::action::{ActionKind, ScrollSteps};
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::Size;
use crate::grid::RecursiveLayout;
use crate::input::Key;
use crate::integration::{BundleMatcher, EnhancedBundles};
use crate::overlay::{DotStyle, GridStyle, HintStyle};
use crate::scroll::{default_bindings, ScrollCommand, ScrollKeyMap};
use crate::validation::{
    validate_alphabet, validate_at_least, validate_bundle_ids, validate_cell_keys, validate_color,
    validate_keys, validate_opacity, validate_positive, validate_role_names,
};

const APP_DIR: &str = "hintpilot";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub hints: HintsConfig,
    pub grid: GridConfig,
    pub recursive_grid: RecursiveGridConfig,
    pub scroll: ScrollConfig,
    pub action: ActionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub excluded_bundles: Vec<String>,
    pub restore_cursor_position: bool,
    pub mode_exit_keys: Vec<String>,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            excluded_bundles: Vec::new(),
            restore_cursor_position: false,
            mode_exit_keys: vec!["escape".into()],
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinSize {
    pub width: i32,
    pub height: i32,
}

impl Default for MinSize {
    fn default() -> Self {
        Self { width: 1, height: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintsConfig {
    pub alphabet: String,
    pub clickable_roles: Vec<String>,
    pub min_element_size: MinSize,
    pub include_offscreen: bool,
    pub include_menubar: bool,
    pub additional_menubar_targets: Vec<String>,
    pub include_dock: bool,
    pub include_notification_center: bool,
    pub include_stage_manager: bool,
    pub max_depth: usize,
    pub style: HintStyle,
    pub enhanced_bundles: EnhancedBundles,
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            alphabet: "asdfghjkl".into(),
            clickable_roles: default_clickable_roles().iter().map(|r| r.as_ax_str().to_string()).collect(),
            min_element_size: MinSize::default(),
            include_offscreen: false,
            include_menubar: false,
            additional_menubar_targets: vec![
                "com.apple.TextInputMenuAgent".into(),
                "com.apple.controlcenter".into(),
                "com.apple.systemuiserver".into(),
            ],
            include_dock: false,
            include_notification_center: false,
            include_stage_manager: false,
            max_depth: crate::a11y::walker::DEFAULT_MAX_DEPTH,
            style: HintStyle::default(),
            enhanced_bundles: EnhancedBundles::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub alphabet: String,
    pub style: GridStyle,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            alphabet: "abcdefghijklmnpqrstuvwxyz".into(),
            style: GridStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursiveGridConfig {
    /// One key per cell, row-major.
    pub keys: String,
    pub grid_cols: usize,
    pub grid_rows: usize,
    pub reset_key: String,
    pub min_size_width: i32,
    pub min_size_height: i32,
    pub max_depth: usize,
    pub style: GridStyle,
}

impl Default for RecursiveGridConfig {
    fn default() -> Self {
        let layout = RecursiveLayout::default();
        Self {
            keys: "uijk".into(),
            grid_cols: layout.cols,
            grid_rows: layout.rows,
            reset_key: ",".into(),
            min_size_width: layout.min_size.width,
            min_size_height: layout.min_size.height,
            max_depth: layout.max_depth,
            style: GridStyle::default(),
        }
    }
}

impl RecursiveGridConfig {
    const MIN_CELL: i64 = 10;

    fn validate(&self) -> Result<()> {
        if self.grid_cols < 2 || self.grid_rows < 2 {
            return Err(Error::new(ErrorCode::InvalidConfig, "recursive grid needs at least 2 columns and 2 rows")
                .with_context("field", "recursive_grid.grid_cols"));
        }
        validate_cell_keys("recursive_grid.keys", &self.keys, self.grid_cols * self.grid_rows)?;
        for (field, value) in [
            ("recursive_grid.min_size_width", self.min_size_width),
            ("recursive_grid.min_size_height", self.min_size_height),
        ] {
            validate_at_least(field, value as i64, Self::MIN_CELL)?;
        }
        validate_positive("recursive_grid.max_depth", self.max_depth as i64)?;

        let reset = validate_keys("recursive_grid.reset_key", std::slice::from_ref(&self.reset_key))?;
        let conflict = reset.iter().any(|key| {
            key.is_backspace()
                || key
                    .as_char()
                    .map(|c| self.keys.chars().any(|k| k.eq_ignore_ascii_case(&c)))
                    .unwrap_or(false)
        });
        if conflict {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                format!("recursive_grid.reset_key '{}' is reserved or used by a cell", self.reset_key),
            )
            .with_context("field", "recursive_grid.reset_key"));
        }

        for (field, value) in [
            ("recursive_grid.style.background_color", &self.style.background_color),
            ("recursive_grid.style.text_color", &self.style.text_color),
            ("recursive_grid.style.matched_text_color", &self.style.matched_text_color),
            ("recursive_grid.style.matched_background_color", &self.style.matched_background_color),
            ("recursive_grid.style.border_color", &self.style.border_color),
        ] {
            validate_color(field, value)?;
        }
        validate_opacity("recursive_grid.style.opacity", self.style.opacity)
    }

    pub fn layout(&self) -> RecursiveLayout {
        RecursiveLayout {
            cols: self.grid_cols,
            rows: self.grid_rows,
            min_size: Size::new(self.min_size_width, self.min_size_height),
            max_depth: self.max_depth,
        }
    }

    /// Parsed reset key. Invalid entries were rejected by `validate`.
    pub fn reset(&self) -> Option<Key> {
        Key::normalize(&self.reset_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub scroll_step: i32,
    pub scroll_step_half: i32,
    pub scroll_step_full: i32,
    pub key_bindings: BTreeMap<ScrollCommand, Vec<String>>,
    pub highlight_color: String,
    pub highlight_width: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        let steps = ScrollSteps::default();
        Self {
            scroll_step: steps.char,
            scroll_step_half: steps.half_page,
            scroll_step_full: steps.end,
            key_bindings: default_bindings(),
            highlight_color: "#FF0000".into(),
            highlight_width: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub highlight_color: String,
    pub highlight_width: u32,
    pub cursor_dot_radius: u32,
    pub cursor_dot: DotStyle,
    pub move_mouse_step: i32,
    pub key_bindings: BTreeMap<ActionKind, String>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        let key_bindings = [
            (ActionKind::LeftClick, "Shift+L"),
            (ActionKind::RightClick, "Shift+R"),
            (ActionKind::MiddleClick, "Shift+M"),
            (ActionKind::MouseDown, "Shift+I"),
            (ActionKind::MouseUp, "Shift+U"),
        ]
        .into_iter()
        .map(|(kind, key)| (kind, key.to_string()))
        .collect();
        Self {
            highlight_color: "#00FF00".into(),
            highlight_width: 3,
            cursor_dot_radius: 4,
            cursor_dot: DotStyle::default(),
            move_mouse_step: 10,
            key_bindings,
        }
    }
}

impl Config {
    /// Platform location of the default config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads and validates. With no explicit path, a missing default file
    /// yields the defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if required {
                return Err(Error::new(ErrorCode::InvalidConfig, "config file not found")
                    .with_context("path", path.display()));
            }
            info!("[Config] No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        info!("[Config] Loading {}", path.display());
        let raw = fs::read_to_string(&path).map_err(|e| {
            Error::wrap(e, ErrorCode::InvalidConfig, "cannot read config file")
                .with_context("path", path.display())
        })?;
        Self::from_json(&raw).map_err(|e| e.with_context("path", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)
            .map_err(|e| Error::wrap(e, ErrorCode::InvalidConfig, "malformed config"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_bundle_ids("general.excluded_bundles", &self.general.excluded_bundles)?;
        validate_keys("general.mode_exit_keys", &self.general.mode_exit_keys)?;

        let hints = &self.hints;
        validate_alphabet("hints.alphabet", &hints.alphabet)?;
        validate_role_names("hints.clickable_roles", &hints.clickable_roles)?;
        validate_positive("hints.max_depth", hints.max_depth as i64)?;
        validate_bundle_ids("hints.additional_menubar_targets", &hints.additional_menubar_targets)?;
        validate_bundle_ids("hints.enhanced_bundles.electron", &hints.enhanced_bundles.electron)?;
        validate_bundle_ids("hints.enhanced_bundles.chromium", &hints.enhanced_bundles.chromium)?;
        validate_bundle_ids("hints.enhanced_bundles.firefox", &hints.enhanced_bundles.firefox)?;
        for (field, value) in [
            ("hints.style.background_color", &hints.style.background_color),
            ("hints.style.text_color", &hints.style.text_color),
            ("hints.style.matched_text_color", &hints.style.matched_text_color),
            ("hints.style.border_color", &hints.style.border_color),
        ] {
            validate_color(field, value)?;
        }
        validate_opacity("hints.style.opacity", hints.style.opacity)?;

        let grid = &self.grid;
        validate_alphabet("grid.alphabet", &grid.alphabet)?;
        for (field, value) in [
            ("grid.style.background_color", &grid.style.background_color),
            ("grid.style.text_color", &grid.style.text_color),
            ("grid.style.matched_text_color", &grid.style.matched_text_color),
            ("grid.style.matched_background_color", &grid.style.matched_background_color),
            ("grid.style.border_color", &grid.style.border_color),
        ] {
            validate_color(field, value)?;
        }
        validate_opacity("grid.style.opacity", grid.style.opacity)?;

        self.recursive_grid.validate()?;

        let scroll = &self.scroll;
        validate_positive("scroll.scroll_step", scroll.scroll_step as i64)?;
        validate_positive("scroll.scroll_step_half", scroll.scroll_step_half as i64)?;
        validate_positive("scroll.scroll_step_full", scroll.scroll_step_full as i64)?;
        validate_color("scroll.highlight_color", &scroll.highlight_color)?;
        validate_positive("scroll.highlight_width", scroll.highlight_width as i64)?;
        ScrollKeyMap::new(&scroll.key_bindings)?;

        let action = &self.action;
        validate_color("action.highlight_color", &action.highlight_color)?;
        validate_positive("action.highlight_width", action.highlight_width as i64)?;
        validate_positive("action.move_mouse_step", action.move_mouse_step as i64)?;
        validate_color("action.cursor_dot.color", &action.cursor_dot.color)?;
        validate_color("action.cursor_dot.border_color", &action.cursor_dot.border_color)?;
        for (kind, key) in &action.key_bindings {
            if *kind == ActionKind::Scroll {
                return Err(Error::new(ErrorCode::InvalidConfig, "scroll cannot be bound in action mode")
                    .with_context("field", "action.key_bindings"));
            }
            validate_keys("action.key_bindings", std::slice::from_ref(key))?;
        }
        Ok(())
    }

    pub fn clickable_roles(&self) -> Vec<Role> {
        self.hints.clickable_roles.iter().map(|r| Role::parse(r.trim())).collect()
    }

    pub fn element_filter(&self) -> ElementFilter {
        let hints = &self.hints;
        ElementFilter {
            min_size: Size::new(hints.min_element_size.width, hints.min_element_size.height),
            roles: HashSet::new(),
            exclude_roles: HashSet::new(),
            include_offscreen: hints.include_offscreen,
            include_menubar: hints.include_menubar,
            additional_menubar_targets: hints.additional_menubar_targets.clone(),
            include_dock: hints.include_dock,
            include_notification_center: hints.include_notification_center,
            include_stage_manager: hints.include_stage_manager,
        }
    }

    pub fn scroll_steps(&self) -> ScrollSteps {
        ScrollSteps {
            char: self.scroll.scroll_step,
            half_page: self.scroll.scroll_step_half,
            end: self.scroll.scroll_step_full,
        }
    }

    pub fn excluded_bundles(&self) -> BundleMatcher {
        BundleMatcher::new(&self.general.excluded_bundles)
    }

    pub fn exit_keys(&self) -> Result<Vec<Key>> {
        validate_keys("general.mode_exit_keys", &self.general.mode_exit_keys)
    }

    /// Action-mode key → action. Invalid entries were rejected by `validate`.
    pub fn action_keys(&self) -> Vec<(Key, ActionKind)> {
        self.action
            .key_bindings
            .iter()
            .filter_map(|(kind, raw)| Key::normalize(raw).map(|key| (key, *kind)))
            .collect()
    }
}
