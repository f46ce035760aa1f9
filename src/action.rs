/*!
 * Action Executor
 *
 * Maps domain actions to pointer injection through the AX client port.
 * Scroll has its own entry point and is rejected by `execute`.
 */

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::a11y::AxClient;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::Point;

/// Pointer action kinds, spelled exactly as the CLI and IPC expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    LeftClick,
    RightClick,
    MiddleClick,
    MouseDown,
    MouseUp,
    MoveMouse,
    Scroll,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::LeftClick,
        ActionKind::RightClick,
        ActionKind::MiddleClick,
        ActionKind::MouseDown,
        ActionKind::MouseUp,
        ActionKind::MoveMouse,
        ActionKind::Scroll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::LeftClick => "left_click",
            ActionKind::RightClick => "right_click",
            ActionKind::MiddleClick => "middle_click",
            ActionKind::MouseDown => "mouse_down",
            ActionKind::MouseUp => "mouse_up",
            ActionKind::MoveMouse => "move_mouse",
            ActionKind::Scroll => "scroll",
        }
    }

    /// Down+up actions, the only ones that honour cursor restoration.
    pub fn is_click(&self) -> bool {
        matches!(
            self,
            ActionKind::LeftClick | ActionKind::RightClick | ActionKind::MiddleClick
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| {
                Error::new(ErrorCode::InvalidInput, format!("unknown action '{}'", raw))
                    .with_context("valid", "left_click, right_click, middle_click, mouse_down, mouse_up, move_mouse, scroll")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for ScrollDirection {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            _ => Err(Error::new(
                ErrorCode::InvalidInput,
                format!("unknown scroll direction '{}'", raw),
            )),
        }
    }
}

/// Scroll magnitude: one line, half a page, or all the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollAmount {
    Char,
    HalfPage,
    End,
}

impl FromStr for ScrollAmount {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "char" | "line" => Ok(ScrollAmount::Char),
            "half" | "half_page" | "halfpage" => Ok(ScrollAmount::HalfPage),
            "end" | "full" => Ok(ScrollAmount::End),
            _ => Err(Error::new(
                ErrorCode::InvalidInput,
                format!("unknown scroll amount '{}'", raw),
            )),
        }
    }
}

/// Pixel sizes of the three scroll magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSteps {
    pub char: i32,
    pub half_page: i32,
    pub end: i32,
}

impl Default for ScrollSteps {
    fn default() -> Self {
        Self {
            char: 50,
            half_page: 500,
            end: 1_000_000,
        }
    }
}

impl ScrollSteps {
    /// Wheel deltas for a scroll. Positive y scrolls content up.
    pub fn delta(&self, direction: ScrollDirection, amount: ScrollAmount) -> (i32, i32) {
        let base = match amount {
            ScrollAmount::Char => self.char,
            ScrollAmount::HalfPage => self.half_page,
            ScrollAmount::End => self.end,
        };
        match direction {
            ScrollDirection::Up => (0, base),
            ScrollDirection::Down => (0, -base),
            ScrollDirection::Left => (base, 0),
            ScrollDirection::Right => (-base, 0),
        }
    }
}

/// Executes pointer actions against the AX client.
pub struct ActionExecutor {
    client: Arc<dyn AxClient>,
    restore_cursor: bool,
    steps: ScrollSteps,
}

impl ActionExecutor {
    pub fn new(client: Arc<dyn AxClient>, restore_cursor: bool, steps: ScrollSteps) -> Self {
        Self {
            client,
            restore_cursor,
            steps,
        }
    }

    pub fn restore_cursor(&self) -> bool {
        self.restore_cursor
    }

    pub fn steps(&self) -> ScrollSteps {
        self.steps
    }

    pub fn set_restore_cursor(&mut self, restore: bool) {
        self.restore_cursor = restore;
    }

    pub fn set_steps(&mut self, steps: ScrollSteps) {
        self.steps = steps;
    }

    /// Injects `kind` at `point`. `Scroll` is rejected with `InvalidInput`.
    pub fn execute(&self, kind: ActionKind, point: Point) -> Result<()> {
        if kind == ActionKind::Scroll {
            return Err(Error::new(
                ErrorCode::InvalidInput,
                "scroll is not a point action; use the scroll entry point",
            ));
        }
        info!("[Action] {} at ({}, {})", kind, point.x, point.y);
        self.client
            .perform_action(kind, point, self.restore_cursor && kind.is_click())
            .map_err(|e| match e.code() {
                ErrorCode::InvalidInput | ErrorCode::ActionFailed => e,
                _ => Error::wrap(e, ErrorCode::ActionFailed, "action injection failed"),
            })
            .map_err(|e| e.with_context("action", kind))
    }

    /// Scrolls at the current cursor position.
    pub fn scroll(&self, direction: ScrollDirection, amount: ScrollAmount) -> Result<(i32, i32)> {
        let (dx, dy) = self.steps.delta(direction, amount);
        debug!("[Action] Scroll {:?}/{:?} → ({}, {})", direction, amount, dx, dy);
        self.client.scroll_at_cursor(dx, dy).map_err(|e| {
            Error::wrap(e, ErrorCode::ActionFailed, "scroll injection failed")
        })?;
        Ok((dx, dy))
    }

    /// Moves the cursor by a relative offset.
    pub fn nudge(&self, dx: i32, dy: i32) -> Result<Point> {
        let from = self.client.cursor_position();
        let to = Point::new(from.x.saturating_add(dx), from.y.saturating_add(dy));
        self.execute(ActionKind::MoveMouse, to)?;
        Ok(to)
    }
}
