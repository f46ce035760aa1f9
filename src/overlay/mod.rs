/*!
 * Overlay Module
 *
 * Port over the transparent, click-through window that draws hint labels,
 * grid cells, highlight rectangles and the cursor dot. Draw calls never
 * block; the implementation folds pending commands into a `Scene` and only
 * the latest scene is guaranteed to reach the screen.
 */

pub mod recording;
pub mod render;
pub mod threaded;

pub use recording::RecordingOverlay;
pub use render::{Renderer, TracingRenderer};
pub use threaded::ThreadedOverlay;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::grid::GridCell;
use crate::hints::Hint;

/// Callback invoked once a resize has been applied on the render thread.
pub type ResizeDone = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintStyle {
    pub font_family: String,
    pub font_size: f32,
    pub background_color: String,
    pub text_color: String,
    pub matched_text_color: String,
    pub border_color: String,
    pub border_radius: u32,
    pub border_width: u32,
    pub padding: u32,
    pub opacity: f32,
    pub show_arrow: bool,
}

impl Default for HintStyle {
    fn default() -> Self {
        Self {
            font_family: "SF Mono".into(),
            font_size: 12.0,
            background_color: "#FFD700".into(),
            text_color: "#000000".into(),
            matched_text_color: "#737373".into(),
            border_color: "#000000".into(),
            border_radius: 4,
            border_width: 1,
            padding: 4,
            opacity: 0.95,
            show_arrow: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridStyle {
    pub font_family: String,
    pub font_size: f32,
    pub background_color: String,
    pub text_color: String,
    pub matched_text_color: String,
    pub matched_background_color: String,
    pub border_color: String,
    pub border_width: u32,
    pub opacity: f32,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            font_family: "SF Mono".into(),
            font_size: 12.0,
            background_color: "#ABE9B3".into(),
            text_color: "#000000".into(),
            matched_text_color: "#F8BD96".into(),
            matched_background_color: "#F8BD96".into(),
            border_color: "#ABE9B3".into(),
            border_width: 1,
            opacity: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotStyle {
    pub color: String,
    pub border_color: String,
    pub border_width: u32,
}

impl Default for DotStyle {
    fn default() -> Self {
        Self {
            color: "#FF0000".into(),
            border_color: "#FFFFFF".into(),
            border_width: 1,
        }
    }
}

/// Outline drawn around a rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub rect: Rect,
    pub color: String,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorDot {
    pub center: Point,
    pub radius: u32,
    pub style: DotStyle,
}

/// Everything that should be on screen right now.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub hints: Option<(Vec<Hint>, HintStyle)>,
    pub grid: Option<(Vec<GridCell>, GridStyle)>,
    pub scroll_highlight: Option<Highlight>,
    pub action_highlight: Option<Highlight>,
    pub cursor_dot: Option<CursorDot>,
}

impl Scene {
    pub fn is_empty(&self) -> bool {
        self.hints.is_none()
            && self.grid.is_none()
            && self.scroll_highlight.is_none()
            && self.action_highlight.is_none()
            && self.cursor_dot.is_none()
    }

    /// Applies one draw command. Hints and grid are mutually exclusive.
    pub fn apply(&mut self, command: DrawCommand) {
        match command {
            DrawCommand::Hints(hints, style) => {
                self.grid = None;
                self.scroll_highlight = None;
                self.hints = Some((hints, style));
            }
            DrawCommand::Grid(cells, style) => {
                self.hints = None;
                self.scroll_highlight = None;
                self.grid = Some((cells, style));
            }
            DrawCommand::ScrollHighlight(h) => self.scroll_highlight = Some(h),
            DrawCommand::ActionHighlight(h) => self.action_highlight = Some(h),
            DrawCommand::CursorDot(dot) => self.cursor_dot = Some(dot),
            DrawCommand::Hide => *self = Scene::default(),
            DrawCommand::Refresh => {}
        }
    }
}

/// A single draw request as queued for the render thread.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Hints(Vec<Hint>, HintStyle),
    Grid(Vec<GridCell>, GridStyle),
    ScrollHighlight(Highlight),
    ActionHighlight(Highlight),
    CursorDot(CursorDot),
    Hide,
    Refresh,
}

impl DrawCommand {
    /// Whether the overlay is visible after this command.
    pub fn shows(&self) -> Option<bool> {
        match self {
            DrawCommand::Hide => Some(false),
            DrawCommand::Refresh => None,
            _ => Some(true),
        }
    }
}

/// Drawing capability set consumed by the navigator.
///
/// Implementations must hop to their own drawing thread, keep the window
/// above regular windows and let pointer events pass through.
pub trait Overlay: Send + Sync {
    fn show_hints(&self, hints: &[Hint], style: &HintStyle) -> Result<()>;

    fn show_grid(&self, cells: &[GridCell], style: &GridStyle) -> Result<()>;

    fn draw_scroll_highlight(&self, rect: Rect, color: &str, width: u32) -> Result<()>;

    fn draw_action_highlight(&self, rect: Rect, color: &str, width: u32) -> Result<()>;

    fn draw_cursor_dot(&self, center: Point, radius: u32, style: &DotStyle) -> Result<()>;

    /// Clears and hides the window. Hiding a hidden overlay succeeds.
    fn hide(&self) -> Result<()>;

    fn refresh(&self) -> Result<()>;

    fn is_visible(&self) -> bool;

    /// Refits the window to the active screen and calls `done` afterwards.
    fn resize_to_active_screen(&self, done: ResizeDone);

    /// Whether the drawing backend is alive.
    fn is_healthy(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("visible", &self.is_visible())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_replace_grid_and_hide_clears() {
        let mut scene = Scene::default();
        scene.apply(DrawCommand::Grid(Vec::new(), GridStyle::default()));
        scene.apply(DrawCommand::Hints(Vec::new(), HintStyle::default()));
        assert!(scene.grid.is_none());
        assert!(scene.hints.is_some());

        scene.apply(DrawCommand::CursorDot(CursorDot {
            center: Point::new(1, 1),
            radius: 3,
            style: DotStyle::default(),
        }));
        scene.apply(DrawCommand::Hide);
        assert!(scene.is_empty());
    }

    #[test]
    fn refresh_keeps_visibility() {
        assert_eq!(DrawCommand::Refresh.shows(), None);
        assert_eq!(DrawCommand::Hide.shows(), Some(false));
    }
}
