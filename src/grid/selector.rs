//! Two-level coordinate input for grid mode.
//!
//! Two characters pick a top-level cell and move the target to its center;
//! two more pick a cell of its subgrid. Enter accepts the current target.

use tracing::debug;

use super::{Grid, GridCell};
use crate::geometry::Point;
use crate::input::{Key, KeyCode};

/// Where the selector is in the coordinate sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum GridStage {
    AwaitRow,
    AwaitCol { row: char },
    AwaitSubRow { cell: GridCell, sub: Grid },
    AwaitSubCol { cell: GridCell, sub: Grid, row: char },
    Selected(Point),
}

/// What the overlay and router should do after a key.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    Ignored,
    /// Redraw with exactly these cells.
    Redraw(Vec<GridCell>),
    /// A top-level cell was chosen; its subgrid is now active.
    CellSelected { point: Point, cells: Vec<GridCell> },
    /// Final target chosen.
    Selected(Point),
}

#[derive(Debug, Clone)]
pub struct GridSelector {
    grid: Grid,
    stage: GridStage,
}

impl GridSelector {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            stage: GridStage::AwaitRow,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn stage(&self) -> &GridStage {
        &self.stage
    }

    /// Cells that should be on screen for the current stage.
    pub fn visible_cells(&self) -> Vec<GridCell> {
        match &self.stage {
            GridStage::AwaitRow => self.grid.cells().to_vec(),
            GridStage::AwaitCol { row } => self.grid.matching(&row.to_string()),
            GridStage::AwaitSubRow { sub, .. } => sub.cells().to_vec(),
            GridStage::AwaitSubCol { sub, row, .. } => sub.matching(&row.to_string()),
            GridStage::Selected(_) => Vec::new(),
        }
    }

    pub fn handle_input(&mut self, key: &Key) -> GridEvent {
        if key.is_backspace() {
            return self.back();
        }
        if key.code == KeyCode::Enter && key.modifiers.is_empty() {
            if let GridStage::AwaitSubRow { cell, .. } | GridStage::AwaitSubCol { cell, .. } =
                &self.stage
            {
                let point = cell.bounds().center();
                self.stage = GridStage::Selected(point);
                return GridEvent::Selected(point);
            }
            return GridEvent::Ignored;
        }
        let typed = match key.as_char() {
            Some(c) if key.is_graphic() => c.to_ascii_uppercase(),
            _ => return GridEvent::Ignored,
        };

        let stage = std::mem::replace(&mut self.stage, GridStage::AwaitRow);
        let (next, event) = match stage {
            GridStage::AwaitRow if self.grid.is_row_char(typed) => {
                let next = GridStage::AwaitCol { row: typed };
                let cells = self.grid.matching(&typed.to_string());
                (next, GridEvent::Redraw(cells))
            }
            GridStage::AwaitCol { row } => {
                let coordinate: String = [row, typed].iter().collect();
                match (self.grid.cell(&coordinate).cloned(), self.grid.subgrid(&coordinate)) {
                    (Some(cell), Some(sub)) => {
                        debug!("[Grid] Selected cell {}", coordinate);
                        let point = cell.bounds().center();
                        let cells = sub.cells().to_vec();
                        (GridStage::AwaitSubRow { cell, sub }, GridEvent::CellSelected { point, cells })
                    }
                    _ => (GridStage::AwaitCol { row }, GridEvent::Ignored),
                }
            }
            GridStage::AwaitSubRow { cell, sub } if sub.is_row_char(typed) => {
                let cells = sub.matching(&typed.to_string());
                (GridStage::AwaitSubCol { cell, sub, row: typed }, GridEvent::Redraw(cells))
            }
            GridStage::AwaitSubCol { cell, sub, row } => {
                let coordinate: String = [row, typed].iter().collect();
                match sub.cell(&coordinate).map(|c| c.bounds().center()) {
                    Some(point) => {
                        debug!("[Grid] Selected subcell {}", coordinate);
                        (GridStage::Selected(point), GridEvent::Selected(point))
                    }
                    None => (GridStage::AwaitSubCol { cell, sub, row }, GridEvent::Ignored),
                }
            }
            other => (other, GridEvent::Ignored),
        };
        self.stage = next;
        event
    }

    /// Drops back one level. Nothing typed means nothing to undo.
    fn back(&mut self) -> GridEvent {
        let stage = std::mem::replace(&mut self.stage, GridStage::AwaitRow);
        self.stage = match stage {
            GridStage::AwaitRow => return GridEvent::Ignored,
            GridStage::AwaitCol { .. } => GridStage::AwaitRow,
            GridStage::AwaitSubRow { cell, .. } => {
                let row = cell.coordinate().chars().next().unwrap_or_default();
                GridStage::AwaitCol { row }
            }
            GridStage::AwaitSubCol { cell, sub, .. } => GridStage::AwaitSubRow { cell, sub },
            selected @ GridStage::Selected(_) => {
                self.stage = selected;
                return GridEvent::Ignored;
            }
        };
        GridEvent::Redraw(self.visible_cells())
    }
}
