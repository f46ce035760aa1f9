/*!
 * Accessibility Module
 *
 * Port over the host accessibility (AX) system plus everything that turns a
 * live AX tree into a flat list of clickable elements: the per-element info
 * cache, the depth-limited walker, the role filter and the collector that
 * stitches in menubar / dock / notification-center roots.
 */

pub mod cache;
pub mod collector;
pub mod element;
pub mod fake;
pub mod filter;
pub mod roles;
pub mod walker;

#[cfg(target_os = "macos")]
pub mod macos;

pub use cache::InfoCache;
pub use collector::ClickableCollector;
pub use element::{Element, ElementId};
pub use filter::ElementFilter;
pub use roles::{ClickableRoles, Role};
pub use walker::{TreeWalker, WalkOptions};

use std::fmt;
use std::sync::Arc;

use crate::action::ActionKind;
use crate::error::Result;
use crate::geometry::{Point, Rect, Size};

/// The AX action name advertised by pressable elements.
pub const PRESS_ACTION: &str = "AXPress";

/// Releases the host resource behind a raw handle value.
pub trait HandleRelease: Send + Sync {
    fn release(&self, raw: usize);
}

/// Cache identity of an element: owning process plus the host's element
/// hash. Hashes are only compared within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ElementKey {
    pub pid: i32,
    pub hash: u64,
}

impl ElementKey {
    pub const fn new(pid: i32, hash: u64) -> Self {
        Self { pid, hash }
    }
}

/// Owned reference to a live accessibility element.
///
/// Exactly one owner exists at any time; dropping the handle releases the
/// underlying host resource. Handles are never cloned and never stored in the
/// info cache, only their `key`.
pub struct AxHandle {
    raw: usize,
    key: ElementKey,
    releaser: Arc<dyn HandleRelease>,
}

impl AxHandle {
    /// Wraps a raw host reference. `key` identifies the underlying element
    /// (equal elements reached through different references share a key).
    pub fn new(raw: usize, key: ElementKey, releaser: Arc<dyn HandleRelease>) -> Self {
        Self { raw, key, releaser }
    }

    pub fn raw(&self) -> usize {
        self.raw
    }

    pub fn key(&self) -> ElementKey {
        self.key
    }
}

impl Drop for AxHandle {
    fn drop(&mut self) {
        self.releaser.release(self.raw);
    }
}

impl fmt::Debug for AxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxHandle")
            .field("raw", &format_args!("{:#x}", self.raw))
            .field("key", &self.key)
            .finish()
    }
}

/// Root of a walk: a window or a whole application.
#[derive(Debug)]
pub enum AxRoot {
    Window(AxHandle),
    Application(AxHandle),
}

impl AxRoot {
    pub fn handle(&self) -> &AxHandle {
        match self {
            AxRoot::Window(h) | AxRoot::Application(h) => h,
        }
    }
}

/// Attribute snapshot read from a single element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxAttributes {
    pub role: Role,
    pub subrole: Option<String>,
    pub title: String,
    pub description: String,
    pub position: Point,
    pub size: Size,
    pub enabled: bool,
    pub actions: Vec<String>,
    pub pid: Option<i32>,
    pub bundle_id: Option<String>,
}

impl AxAttributes {
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    pub fn has_press_action(&self) -> bool {
        self.actions.iter().any(|a| a == PRESS_ACTION)
    }
}

/// Capability set of the host accessibility system.
///
/// Methods block. Every returned handle is owned by the caller and released
/// when dropped. Concurrent calls against the same handle are not required to
/// be safe.
pub trait AxClient: Send + Sync {
    fn frontmost_window(&self) -> Result<AxHandle>;

    fn focused_application(&self) -> Result<AxHandle>;

    fn application_by_bundle(&self, bundle_id: &str) -> Result<AxHandle>;

    /// Menubar element of an application.
    fn menu_bar(&self, app: &AxHandle) -> Result<AxHandle>;

    fn children_of(&self, handle: &AxHandle) -> Result<Vec<AxHandle>>;

    fn attributes_of(&self, handle: &AxHandle) -> Result<AxAttributes>;

    /// Sets a boolean attribute on the application with the given pid.
    fn set_app_attribute(&self, pid: i32, name: &str, value: bool) -> bool;

    /// Injects a pointer action at `point`. Scroll is not accepted here.
    fn perform_action(&self, kind: ActionKind, point: Point, restore_cursor: bool) -> Result<()>;

    /// Posts a discrete scroll event at the current cursor position.
    fn scroll_at_cursor(&self, delta_x: i32, delta_y: i32) -> Result<()>;

    fn cursor_position(&self) -> Point;

    fn active_screen_bounds(&self) -> Rect;

    fn check_permissions(&self) -> bool;

    /// True while the host's "show all windows" overview is on screen.
    fn is_system_overview_active(&self) -> bool;
}
