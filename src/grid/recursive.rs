//! Recursive grid.
//!
//! The active area is split into `cols`×`rows` cells, one key per cell.
//! Picking a cell narrows the area to it and splits again, until the cells
//! would drop below the minimum size or the depth limit is reached.

use tracing::debug;

use super::GridCell;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{Point, Rect, Size};
use crate::input::Key;

/// Shape and limits of a recursive grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveLayout {
    pub cols: usize,
    pub rows: usize,
    pub min_size: Size,
    pub max_depth: usize,
}

impl Default for RecursiveLayout {
    fn default() -> Self {
        Self {
            cols: 2,
            rows: 2,
            min_size: Size::new(25, 25),
            max_depth: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveGrid {
    layout: RecursiveLayout,
    initial: Rect,
    current: Rect,
    history: Vec<Rect>,
}

impl RecursiveGrid {
    pub fn new(bounds: Rect, layout: RecursiveLayout) -> Result<Self> {
        if bounds.is_empty() {
            return Err(Error::new(ErrorCode::InvalidInput, "recursive grid needs a non-empty area"));
        }
        if layout.cols < 2 || layout.rows < 2 {
            return Err(Error::new(ErrorCode::InvalidInput, "recursive grid needs at least 2x2 cells")
                .with_context("cols", layout.cols)
                .with_context("rows", layout.rows));
        }
        Ok(Self {
            layout,
            initial: bounds,
            current: bounds,
            history: Vec::new(),
        })
    }

    pub fn layout(&self) -> RecursiveLayout {
        self.layout
    }

    pub fn initial(&self) -> Rect {
        self.initial
    }

    pub fn current(&self) -> Rect {
        self.current
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn center(&self) -> Point {
        self.current.center()
    }

    /// Cells of the current area in row-major order. The last row and
    /// column absorb the remainder of an uneven split.
    pub fn cells(&self) -> Vec<Rect> {
        let RecursiveLayout { cols, rows, .. } = self.layout;
        let area = self.current;
        let cell_w = area.width / cols as i32;
        let cell_h = area.height / rows as i32;
        let mut cells = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x = area.x.saturating_add(col as i32 * cell_w);
                let y = area.y.saturating_add(row as i32 * cell_h);
                let width = if col == cols - 1 { area.right().saturating_sub(x) } else { cell_w };
                let height = if row == rows - 1 { area.bottom().saturating_sub(y) } else { cell_h };
                cells.push(Rect::new(x, y, width, height));
            }
        }
        cells
    }

    /// Whether another split keeps cells at or above the minimum size.
    pub fn can_divide(&self) -> bool {
        let RecursiveLayout { cols, rows, min_size, max_depth } = self.layout;
        self.depth() < max_depth
            && self.current.width / cols as i32 >= min_size.width
            && self.current.height / rows as i32 >= min_size.height
    }

    /// Narrows to cell `index` and returns its center with whether the
    /// selection is final. When the area can no longer be split the cell's
    /// center is returned as final and the area is left as is.
    pub fn select(&mut self, index: usize) -> Option<(Point, bool)> {
        let cell = *self.cells().get(index)?;
        if !self.can_divide() {
            return Some((cell.center(), true));
        }
        self.history.push(self.current);
        self.current = cell;
        Some((self.center(), !self.can_divide()))
    }

    /// Returns to the parent area. False at the top level.
    pub fn backtrack(&mut self) -> bool {
        match self.history.pop() {
            Some(parent) => {
                self.current = parent;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.history.clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecursiveEvent {
    Ignored,
    /// The area changed; move the pointer here and redraw.
    Moved(Point),
    /// Final target chosen.
    Selected(Point),
}

/// Key handling for a [`RecursiveGrid`].
#[derive(Debug, Clone)]
pub struct RecursiveSelector {
    grid: RecursiveGrid,
    keys: Vec<char>,
    reset_key: Option<Key>,
    done: bool,
}

impl RecursiveSelector {
    /// `keys` holds one character per cell, row-major.
    pub fn new(grid: RecursiveGrid, keys: &str, reset_key: Option<Key>) -> Result<Self> {
        let keys: Vec<char> = keys.chars().map(|c| c.to_ascii_lowercase()).collect();
        let layout = grid.layout();
        if keys.len() != layout.cols * layout.rows {
            return Err(Error::new(ErrorCode::InvalidInput, "recursive grid needs one key per cell")
                .with_context("keys", keys.len())
                .with_context("cells", layout.cols * layout.rows));
        }
        Ok(Self {
            grid,
            keys,
            reset_key,
            done: false,
        })
    }

    pub fn grid(&self) -> &RecursiveGrid {
        &self.grid
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Labelled cells for the overlay.
    pub fn visible_cells(&self) -> Vec<GridCell> {
        if self.done {
            return Vec::new();
        }
        let nested = self.grid.depth() > 0;
        self.keys
            .iter()
            .zip(self.grid.cells())
            .map(|(key, bounds)| GridCell::new(key.to_ascii_uppercase().to_string(), bounds, nested))
            .collect()
    }

    pub fn handle_input(&mut self, key: &Key) -> RecursiveEvent {
        if self.done {
            return RecursiveEvent::Ignored;
        }
        if self.reset_key.as_ref() == Some(key) {
            self.grid.reset();
            return RecursiveEvent::Moved(self.grid.center());
        }
        if key.is_backspace() {
            return match self.grid.backtrack() {
                true => RecursiveEvent::Moved(self.grid.center()),
                false => RecursiveEvent::Ignored,
            };
        }
        let typed = match key.as_char() {
            Some(c) if key.is_graphic() => c.to_ascii_lowercase(),
            _ => return RecursiveEvent::Ignored,
        };
        let Some(index) = self.keys.iter().position(|k| *k == typed) else {
            return RecursiveEvent::Ignored;
        };
        match self.grid.select(index) {
            Some((point, true)) => {
                debug!(depth = self.grid.depth(), "[Grid] Recursive selection complete");
                self.done = true;
                RecursiveEvent::Selected(point)
            }
            Some((point, false)) => RecursiveEvent::Moved(point),
            None => RecursiveEvent::Ignored,
        }
    }
}
