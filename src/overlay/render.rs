//! Drawing backends driven by the render thread.

use tracing::{debug, info};

use super::Scene;
use crate::error::Result;
use crate::geometry::Rect;

/// Paints a complete scene. Lives on the render thread only.
pub trait Renderer: Send {
    fn render(&mut self, scene: &Scene) -> Result<()>;

    /// Refits the drawing surface to the active screen and returns its frame.
    fn resize(&mut self) -> Result<Rect>;
}

/// Backend that logs each scene instead of drawing it. Used for dry runs
/// and on hosts without a window server.
#[derive(Debug, Clone)]
pub struct TracingRenderer {
    frame: Rect,
    renders: u64,
}

impl TracingRenderer {
    pub fn new(frame: Rect) -> Self {
        Self { frame, renders: 0 }
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

impl Renderer for TracingRenderer {
    fn render(&mut self, scene: &Scene) -> Result<()> {
        self.renders += 1;
        if scene.is_empty() {
            debug!("[Overlay] hidden");
            return Ok(());
        }
        if let Some((hints, _)) = &scene.hints {
            let labels: Vec<_> = hints.iter().take(8).map(|h| h.label()).collect();
            info!("[Overlay] {} hints {:?}", hints.len(), labels);
        }
        if let Some((cells, _)) = &scene.grid {
            info!("[Overlay] {} grid cells", cells.len());
        }
        if let Some(h) = &scene.scroll_highlight {
            debug!("[Overlay] scroll highlight {:?} {}", h.rect, h.color);
        }
        if let Some(h) = &scene.action_highlight {
            debug!("[Overlay] action highlight {:?} {}", h.rect, h.color);
        }
        if let Some(dot) = &scene.cursor_dot {
            debug!("[Overlay] cursor dot at ({}, {})", dot.center.x, dot.center.y);
        }
        Ok(())
    }

    fn resize(&mut self) -> Result<Rect> {
        debug!("[Overlay] resized to {:?}", self.frame);
        Ok(self.frame)
    }
}
