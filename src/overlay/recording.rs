//! In-memory overlay that records draw calls. Backs tests and `--dry-run`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{CursorDot, DotStyle, DrawCommand, GridStyle, Highlight, HintStyle, Overlay, ResizeDone, Scene};
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{Point, Rect};
use crate::grid::GridCell;
use crate::hints::Hint;

#[derive(Debug, Default)]
pub struct RecordingOverlay {
    commands: Mutex<Vec<DrawCommand>>,
    scene: Mutex<Scene>,
    visible: AtomicBool,
    fail_next: AtomicUsize,
    resizes: AtomicUsize,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` draw calls fail with `OverlayFailed`.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<DrawCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Scene after folding every recorded command.
    pub fn scene(&self) -> Scene {
        self.scene.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Labels currently on screen.
    pub fn labels(&self) -> Vec<String> {
        self.scene()
            .hints
            .map(|(hints, _)| hints.iter().map(|h| h.label().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn resizes(&self) -> usize {
        self.resizes.load(Ordering::SeqCst)
    }

    fn record(&self, command: DrawCommand) -> Result<()> {
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::new(ErrorCode::OverlayFailed, "injected overlay failure"));
        }
        if let Some(visible) = command.shows() {
            self.visible.store(visible, Ordering::SeqCst);
        }
        self.scene.lock()?.apply(command.clone());
        self.commands.lock()?.push(command);
        Ok(())
    }
}

impl Overlay for RecordingOverlay {
    fn show_hints(&self, hints: &[Hint], style: &HintStyle) -> Result<()> {
        self.record(DrawCommand::Hints(hints.to_vec(), style.clone()))
    }

    fn show_grid(&self, cells: &[GridCell], style: &GridStyle) -> Result<()> {
        self.record(DrawCommand::Grid(cells.to_vec(), style.clone()))
    }

    fn draw_scroll_highlight(&self, rect: Rect, color: &str, width: u32) -> Result<()> {
        self.record(DrawCommand::ScrollHighlight(Highlight {
            rect,
            color: color.to_string(),
            width,
        }))
    }

    fn draw_action_highlight(&self, rect: Rect, color: &str, width: u32) -> Result<()> {
        self.record(DrawCommand::ActionHighlight(Highlight {
            rect,
            color: color.to_string(),
            width,
        }))
    }

    fn draw_cursor_dot(&self, center: Point, radius: u32, style: &DotStyle) -> Result<()> {
        self.record(DrawCommand::CursorDot(CursorDot {
            center,
            radius,
            style: style.clone(),
        }))
    }

    fn hide(&self) -> Result<()> {
        self.record(DrawCommand::Hide)
    }

    fn refresh(&self) -> Result<()> {
        self.record(DrawCommand::Refresh)
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn resize_to_active_screen(&self, done: ResizeDone) {
        self.resizes.fetch_add(1, Ordering::SeqCst);
        done();
    }
}
