/*!
 * Grid Module
 *
 * Tiles a rectangle into at most N×N cells addressed by two characters
 * (row ∘ column). The same layout applied to a selected cell produces the
 * subgrid used for the second refinement step.
 */

pub mod recursive;
pub mod selector;

pub use recursive::{RecursiveEvent, RecursiveGrid, RecursiveLayout, RecursiveSelector};
pub use selector::{GridEvent, GridSelector, GridStage};

use serde::Serialize;

use crate::error::{Error, ErrorCode, Result};
use crate::geometry::Rect;
use crate::hints::generator::parse_alphabet;

/// One addressable grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell {
    coordinate: String,
    bounds: Rect,
    is_subgrid: bool,
}

impl GridCell {
    pub(crate) fn new(coordinate: impl Into<String>, bounds: Rect, is_subgrid: bool) -> Self {
        Self {
            coordinate: coordinate.into(),
            bounds,
            is_subgrid,
        }
    }

    pub fn coordinate(&self) -> &str {
        &self.coordinate
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_subgrid(&self) -> bool {
        self.is_subgrid
    }
}

/// Row and column counts for `n` characters over a `width`×`height` area.
///
/// The longer side gets all `n` divisions; the shorter side gets a count
/// proportional to the aspect ratio so cells stay roughly square.
pub fn dimensions(n: usize, width: i32, height: i32) -> (usize, usize) {
    let scaled = |short: i32, long: i32| -> usize {
        let ideal = (n as f64 * short as f64 / long as f64).round() as usize;
        ideal.clamp(1, n)
    };
    if width >= height {
        (scaled(height, width), n)
    } else {
        (n, scaled(width, height))
    }
}

/// Edges of `parts` slices of `len` starting at `start`. The last edge is
/// always `start + len`.
fn breakpoints(start: i32, len: i32, parts: usize) -> Vec<i32> {
    let mut edges: Vec<i32> = (0..=parts)
        .map(|i| start.saturating_add((i as f64 * len as f64 / parts as f64).round() as i32))
        .collect();
    if let Some(last) = edges.last_mut() {
        *last = start.saturating_add(len);
    }
    edges
}

/// A laid-out grid over some rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    alphabet: Vec<char>,
    bounds: Rect,
    rows: usize,
    cols: usize,
    cells: Vec<GridCell>,
    is_subgrid: bool,
}

impl Grid {
    pub fn new(alphabet: &str, bounds: Rect) -> Result<Self> {
        let alphabet = parse_alphabet(alphabet)?;
        if bounds.is_empty() {
            return Err(Error::new(
                ErrorCode::InvalidInput,
                format!("grid bounds are empty: {}x{}", bounds.width, bounds.height),
            ));
        }
        let (rows, cols) = dimensions(alphabet.len(), bounds.width, bounds.height);
        Ok(Self::layout(alphabet, bounds, rows, cols, false))
    }

    /// Like [`Grid::new`] with caller-chosen row and column counts. Each
    /// count must lie in `1..=alphabet length`.
    pub fn with_dimensions(alphabet: &str, bounds: Rect, rows: usize, cols: usize) -> Result<Self> {
        let mut grid = Self::new(alphabet, bounds)?;
        let n = grid.alphabet.len();
        if !(1..=n).contains(&rows) || !(1..=n).contains(&cols) {
            return Err(Error::new(
                ErrorCode::InvalidInput,
                format!("grid of {}x{} needs 1..={} rows and columns", rows, cols, n),
            ));
        }
        if (rows, cols) != (grid.rows, grid.cols) {
            grid = Self::layout(grid.alphabet, bounds, rows, cols, false);
        }
        Ok(grid)
    }

    fn layout(alphabet: Vec<char>, bounds: Rect, rows: usize, cols: usize, is_subgrid: bool) -> Self {
        let xs = breakpoints(bounds.x, bounds.width, cols);
        let ys = breakpoints(bounds.y, bounds.height, rows);

        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let x = xs[c];
                let y = ys[r];
                cells.push(GridCell {
                    coordinate: [alphabet[r], alphabet[c]].iter().collect(),
                    bounds: Rect::new(x, y, (xs[c + 1] - x).max(1), (ys[r + 1] - y).max(1)),
                    is_subgrid,
                });
            }
        }

        Self {
            alphabet,
            bounds,
            rows,
            cols,
            cells,
            is_subgrid,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn is_subgrid(&self) -> bool {
        self.is_subgrid
    }

    /// Whether `c` addresses a row of this grid.
    pub fn is_row_char(&self, c: char) -> bool {
        self.alphabet[..self.rows].contains(&c.to_ascii_uppercase())
    }

    pub fn cell(&self, coordinate: &str) -> Option<&GridCell> {
        let coordinate = coordinate.to_uppercase();
        self.cells.iter().find(|cell| cell.coordinate == coordinate)
    }

    /// Cells whose coordinate starts with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<GridCell> {
        let prefix = prefix.to_uppercase();
        self.cells
            .iter()
            .filter(|cell| cell.coordinate.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// Lays the same alphabet out over one of this grid's cells.
    pub fn subgrid(&self, coordinate: &str) -> Option<Grid> {
        self.cell(coordinate)
            .map(|cell| {
                let (rows, cols) = dimensions(self.alphabet.len(), cell.bounds.width.max(1), cell.bounds.height.max(1));
                Self::layout(self.alphabet.clone(), cell.bounds, rows, cols, true)
            })
    }
}
