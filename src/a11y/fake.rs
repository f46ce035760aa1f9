//! In-memory desktop implementing [`AxClient`].
//!
//! Used by the test suite and by `hintpilot run --dry-run`. Every handle it
//! hands out is counted, so callers can assert that nothing leaks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{AxAttributes, AxClient, AxHandle, ElementKey, HandleRelease, Role, PRESS_ACTION};
use crate::action::ActionKind;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{Point, Rect, Size};

pub type NodeId = usize;

/// Process id stamped on every fake handle key.
const FAKE_PID: i32 = 1;

/// Builds an attribute snapshot for a node of `role` covering `bounds`.
pub fn attributes(role: Role, bounds: Rect) -> AxAttributes {
    AxAttributes {
        role,
        position: bounds.origin(),
        size: bounds.size(),
        enabled: true,
        ..Default::default()
    }
}

/// One injected pointer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedAction {
    pub kind: ActionKind,
    pub point: Point,
    pub restore_cursor: bool,
}

#[derive(Default)]
struct Ledger {
    acquired: AtomicUsize,
    outstanding: AtomicUsize,
}

impl HandleRelease for Ledger {
    fn release(&self, _raw: usize) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeNode {
    attributes: AxAttributes,
    children: Vec<NodeId>,
}

struct FakeState {
    nodes: Vec<FakeNode>,
    frontmost_window: Option<NodeId>,
    focused_application: Option<NodeId>,
    applications: HashMap<String, NodeId>,
    menu_bars: HashMap<NodeId, NodeId>,
    failing: HashSet<NodeId>,
    screen: Rect,
    cursor: Point,
    permissions: bool,
    overview_active: bool,
    fail_actions: bool,
    attribute_reads: usize,
    actions: Vec<RecordedAction>,
    scrolls: Vec<(i32, i32)>,
    app_attributes: Vec<(i32, String, bool)>,
    read_hook: Option<Box<dyn Fn(usize) + Send>>,
}

/// Scriptable accessibility tree plus a simulated pointer.
pub struct FakeDesktop {
    state: Mutex<FakeState>,
    ledger: Arc<Ledger>,
}

impl FakeDesktop {
    pub fn new(screen: Rect) -> Self {
        Self {
            state: Mutex::new(FakeState {
                nodes: Vec::new(),
                frontmost_window: None,
                focused_application: None,
                applications: HashMap::new(),
                menu_bars: HashMap::new(),
                failing: HashSet::new(),
                screen,
                cursor: screen.center(),
                permissions: true,
                overview_active: false,
                fail_actions: false,
                attribute_reads: 0,
                actions: Vec::new(),
                scrolls: Vec::new(),
                app_attributes: Vec::new(),
                read_hook: None,
            }),
            ledger: Arc::new(Ledger::default()),
        }
    }

    /// A small desktop with one focused app, a window of buttons, a menubar
    /// and a dock.
    pub fn demo() -> Self {
        let desktop = Self::new(Rect::new(0, 0, 1440, 900));

        let mut app = attributes(Role::Application, Rect::new(0, 0, 1440, 900));
        app.title = "Demo".into();
        app.pid = Some(4242);
        app.bundle_id = Some("com.example.demo".into());
        let app = desktop.add_node(app);
        desktop.set_focused_application(app);
        desktop.register_application("com.example.demo", app);

        let window = desktop.add_node(attributes(Role::Window, Rect::new(100, 80, 900, 600)));
        desktop.set_frontmost_window(Some(window));
        let toolbar = desktop.add_child(window, attributes(Role::Group, Rect::new(100, 80, 900, 40)));
        for (i, title) in ["Back", "Forward", "Reload", "Share"].iter().enumerate() {
            let mut button = attributes(Role::Button, Rect::new(110 + i as i32 * 60, 88, 50, 24));
            button.title = (*title).into();
            desktop.add_child(toolbar, button);
        }
        let content = desktop.add_child(window, attributes(Role::Group, Rect::new(100, 120, 900, 560)));
        for row in 0..3 {
            let mut link = attributes(Role::Link, Rect::new(140, 160 + row * 40, 200, 20));
            link.title = format!("Item {}", row + 1);
            desktop.add_child(content, link);
        }
        let mut field = attributes(Role::TextField, Rect::new(140, 300, 400, 24));
        field.title = "Search".into();
        desktop.add_child(content, field);

        let menubar = desktop.add_node(attributes(Role::MenuBar, Rect::new(0, 0, 1440, 24)));
        desktop.set_menu_bar(app, menubar);
        for (i, title) in ["File", "Edit", "View"].iter().enumerate() {
            let mut item = attributes(Role::MenuBarItem, Rect::new(40 + i as i32 * 50, 0, 44, 24));
            item.title = (*title).into();
            desktop.add_child(menubar, item);
        }

        let dock = desktop.add_node(attributes(Role::Application, Rect::new(0, 840, 1440, 60)));
        desktop.register_application("com.apple.dock", dock);
        let list = desktop.add_child(dock, attributes(Role::Other("AXList".into()), Rect::new(400, 840, 640, 60)));
        for (i, title) in ["Finder", "Terminal"].iter().enumerate() {
            let mut item = attributes(Role::DockItem, Rect::new(420 + i as i32 * 64, 844, 56, 56));
            item.title = (*title).into();
            desktop.add_child(list, item);
        }

        desktop
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn handle(&self, id: NodeId) -> AxHandle {
        self.ledger.acquired.fetch_add(1, Ordering::SeqCst);
        self.ledger.outstanding.fetch_add(1, Ordering::SeqCst);
        AxHandle::new(id, ElementKey::new(FAKE_PID, id as u64), self.ledger.clone())
    }

    pub fn add_node(&self, attributes: AxAttributes) -> NodeId {
        let mut state = self.state();
        state.nodes.push(FakeNode {
            attributes,
            children: Vec::new(),
        });
        state.nodes.len() - 1
    }

    pub fn add_child(&self, parent: NodeId, attributes: AxAttributes) -> NodeId {
        let id = self.add_node(attributes);
        if let Some(node) = self.state().nodes.get_mut(parent) {
            node.children.push(id);
        }
        id
    }

    pub fn set_frontmost_window(&self, window: Option<NodeId>) {
        self.state().frontmost_window = window;
    }

    pub fn set_focused_application(&self, app: NodeId) {
        self.state().focused_application = Some(app);
    }

    pub fn register_application(&self, bundle_id: &str, app: NodeId) {
        self.state().applications.insert(bundle_id.to_string(), app);
    }

    pub fn set_menu_bar(&self, app: NodeId, menubar: NodeId) {
        self.state().menu_bars.insert(app, menubar);
    }

    /// Mutates a node in place, as if the live UI changed.
    pub fn update_attributes(&self, id: NodeId, change: impl FnOnce(&mut AxAttributes)) {
        if let Some(node) = self.state().nodes.get_mut(id) {
            change(&mut node.attributes);
        }
    }

    /// Makes attribute reads of `id` fail from now on.
    pub fn fail_attributes(&self, id: NodeId) {
        self.state().failing.insert(id);
    }

    pub fn set_permissions(&self, granted: bool) {
        self.state().permissions = granted;
    }

    pub fn set_overview_active(&self, active: bool) {
        self.state().overview_active = active;
    }

    pub fn set_cursor(&self, point: Point) {
        self.state().cursor = point;
    }

    pub fn set_screen(&self, screen: Rect) {
        self.state().screen = screen;
    }

    pub fn set_fail_actions(&self, fail: bool) {
        self.state().fail_actions = fail;
    }

    /// Calls `hook` with the running read count after every attribute read.
    pub fn on_attribute_read(&self, hook: impl Fn(usize) + Send + 'static) {
        self.state().read_hook = Some(Box::new(hook));
    }

    pub fn outstanding_handles(&self) -> usize {
        self.ledger.outstanding.load(Ordering::SeqCst)
    }

    pub fn acquired_handles(&self) -> usize {
        self.ledger.acquired.load(Ordering::SeqCst)
    }

    pub fn attribute_reads(&self) -> usize {
        self.state().attribute_reads
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.state().actions.clone()
    }

    pub fn scrolls(&self) -> Vec<(i32, i32)> {
        self.state().scrolls.clone()
    }

    pub fn app_attributes(&self) -> Vec<(i32, String, bool)> {
        self.state().app_attributes.clone()
    }
}

impl AxClient for FakeDesktop {
    fn frontmost_window(&self) -> Result<AxHandle> {
        let window = self.state().frontmost_window;
        window
            .map(|id| self.handle(id))
            .ok_or_else(|| Error::new(ErrorCode::AccessibilityFailed, "no frontmost window"))
    }

    fn focused_application(&self) -> Result<AxHandle> {
        let app = self.state().focused_application;
        app.map(|id| self.handle(id))
            .ok_or_else(|| Error::new(ErrorCode::AccessibilityFailed, "no focused application"))
    }

    fn application_by_bundle(&self, bundle_id: &str) -> Result<AxHandle> {
        let app = self.state().applications.get(bundle_id).copied();
        app.map(|id| self.handle(id)).ok_or_else(|| {
            Error::new(ErrorCode::AccessibilityFailed, "application not running")
                .with_context("bundle_id", bundle_id)
        })
    }

    fn menu_bar(&self, app: &AxHandle) -> Result<AxHandle> {
        let menubar = self.state().menu_bars.get(&app.raw()).copied();
        menubar
            .map(|id| self.handle(id))
            .ok_or_else(|| Error::new(ErrorCode::AccessibilityFailed, "application has no menubar"))
    }

    fn children_of(&self, handle: &AxHandle) -> Result<Vec<AxHandle>> {
        let children = {
            let state = self.state();
            let node = state
                .nodes
                .get(handle.raw())
                .ok_or_else(|| Error::new(ErrorCode::ElementNotFound, "unknown node"))?;
            node.children.clone()
        };
        Ok(children.into_iter().map(|id| self.handle(id)).collect())
    }

    fn attributes_of(&self, handle: &AxHandle) -> Result<AxAttributes> {
        let mut state = self.state();
        state.attribute_reads += 1;
        if let Some(hook) = &state.read_hook {
            hook(state.attribute_reads);
        }
        if state.failing.contains(&handle.raw()) {
            return Err(Error::new(ErrorCode::AccessibilityFailed, "attribute read failed")
                .with_context("node", handle.raw()));
        }
        state
            .nodes
            .get(handle.raw())
            .map(|node| node.attributes.clone())
            .ok_or_else(|| Error::new(ErrorCode::ElementNotFound, "unknown node"))
    }

    fn set_app_attribute(&self, pid: i32, name: &str, value: bool) -> bool {
        debug!("[FakeDesktop] set {}={} on pid {}", name, value, pid);
        self.state().app_attributes.push((pid, name.to_string(), value));
        true
    }

    fn perform_action(&self, kind: ActionKind, point: Point, restore_cursor: bool) -> Result<()> {
        if kind == ActionKind::Scroll {
            return Err(Error::new(
                ErrorCode::InvalidInput,
                "scroll must use the scroll entry point",
            ));
        }
        let mut state = self.state();
        if state.fail_actions {
            return Err(Error::new(ErrorCode::ActionFailed, "event injection failed")
                .with_context("action", kind));
        }
        let before = state.cursor;
        state.cursor = point;
        if restore_cursor && kind.is_click() {
            state.cursor = before;
        }
        state.actions.push(RecordedAction {
            kind,
            point,
            restore_cursor,
        });
        Ok(())
    }

    fn scroll_at_cursor(&self, delta_x: i32, delta_y: i32) -> Result<()> {
        self.state().scrolls.push((delta_x, delta_y));
        Ok(())
    }

    fn cursor_position(&self) -> Point {
        self.state().cursor
    }

    fn active_screen_bounds(&self) -> Rect {
        self.state().screen
    }

    fn check_permissions(&self) -> bool {
        self.state().permissions
    }

    fn is_system_overview_active(&self) -> bool {
        self.state().overview_active
    }
}

/// Marks attributes as advertising the press action.
pub fn pressable(mut attributes: AxAttributes) -> AxAttributes {
    attributes.actions.push(PRESS_ACTION.to_string());
    attributes
}

/// Shorthand for a zero-origin size.
pub fn sized(role: Role, width: i32, height: i32) -> AxAttributes {
    attributes(role, Rect::from_origin_size(Point::new(0, 0), Size::new(width, height)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_counted_and_released() {
        let desktop = FakeDesktop::demo();
        {
            let window = desktop.frontmost_window().unwrap();
            let children = desktop.children_of(&window).unwrap();
            assert_eq!(children.len(), 2);
            assert_eq!(desktop.outstanding_handles(), 3);
        }
        assert_eq!(desktop.outstanding_handles(), 0);
        assert_eq!(desktop.acquired_handles(), 3);
    }

    #[test]
    fn click_with_restore_returns_cursor() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 100, 100));
        desktop.set_cursor(Point::new(5, 5));
        desktop
            .perform_action(ActionKind::LeftClick, Point::new(50, 60), true)
            .unwrap();
        assert_eq!(desktop.cursor_position(), Point::new(5, 5));
        desktop
            .perform_action(ActionKind::RightClick, Point::new(50, 60), false)
            .unwrap();
        assert_eq!(desktop.cursor_position(), Point::new(50, 60));
    }

    #[test]
    fn scroll_is_not_an_action() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 100, 100));
        let err = desktop
            .perform_action(ActionKind::Scroll, Point::new(1, 1), false)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert!(desktop.actions().is_empty());
    }

    #[test]
    fn failing_node_reports_accessibility_failure() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 100, 100));
        let id = desktop.add_node(sized(Role::Button, 10, 10));
        desktop.fail_attributes(id);
        desktop.set_frontmost_window(Some(id));
        let handle = desktop.frontmost_window().unwrap();
        let err = desktop.attributes_of(&handle).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessibilityFailed);
    }
}
