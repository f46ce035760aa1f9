/*!
 * Mode Router
 *
 * Single state machine multiplexing keystrokes among hint, grid, scroll and
 * action modes. The coordinator thread drains router events in arrival order;
 * hint collection runs on the blocking pool and reports back through the
 * same channel, tagged with the session that requested it.
 */

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::ActionKind;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grid::{GridEvent, GridSelector, RecursiveEvent, RecursiveSelector};
use crate::hints::{HintCollection, HintManager};
use crate::input::{Key, KeyCode};
use crate::integration::{AppEvent, LifecycleHandler};
use crate::scroll::{ScrollInput, ScrollKeyMap, ScrollOutcome};
use crate::service::Navigator;

/// Externally visible mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Idle,
    Hints,
    Grid,
    RecursiveGrid,
    Scroll,
    Action,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Hints => "hints",
            Mode::Grid => "grid",
            Mode::RecursiveGrid => "recursive_grid",
            Mode::Scroll => "scroll",
            Mode::Action => "action",
        };
        f.write_str(name)
    }
}

/// Hotkey request to enter a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    /// Hint mode; the action runs on the matched element.
    Hints(ActionKind),
    /// Grid mode; the action runs at the selected point.
    Grid(ActionKind),
    /// Recursive grid; the action runs once the area stops dividing.
    RecursiveGrid(ActionKind),
    Scroll,
    Action,
}

impl ModeRequest {
    pub fn mode(&self) -> Mode {
        match self {
            ModeRequest::Hints(_) => Mode::Hints,
            ModeRequest::Grid(_) => Mode::Grid,
            ModeRequest::RecursiveGrid(_) => Mode::RecursiveGrid,
            ModeRequest::Scroll => Mode::Scroll,
            ModeRequest::Action => Mode::Action,
        }
    }
}

#[derive(Debug)]
pub enum RouterEvent {
    Enter(ModeRequest),
    Exit,
    Key(Key),
    App(AppEvent),
    ConfigReloaded(Box<Config>),
    HintsReady {
        session: u64,
        result: Result<Arc<HintCollection>>,
    },
    Shutdown,
}

/// Key tables derived from the configuration.
struct Bindings {
    exit: Vec<Key>,
    actions: Vec<(Key, ActionKind)>,
    scroll: ScrollKeyMap,
    nudge_step: i32,
}

impl Bindings {
    fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            exit: config.exit_keys()?,
            actions: config.action_keys(),
            scroll: ScrollKeyMap::new(&config.scroll.key_bindings)?,
            nudge_step: config.action.move_mouse_step,
        })
    }

    fn is_exit(&self, key: &Key) -> bool {
        self.exit.contains(key)
    }

    fn action_for(&self, key: &Key) -> Option<ActionKind> {
        self.actions.iter().find(|(k, _)| k == key).map(|(_, kind)| *kind)
    }

    fn nudge_for(&self, key: &Key) -> Option<(i32, i32)> {
        if !key.modifiers.is_empty() {
            return None;
        }
        let step = self.nudge_step;
        match key.code {
            KeyCode::Up => Some((0, -step)),
            KeyCode::Down => Some((0, step)),
            KeyCode::Left => Some((-step, 0)),
            KeyCode::Right => Some((step, 0)),
            _ => None,
        }
    }
}

enum State {
    Idle,
    Loading {
        session: u64,
        action: ActionKind,
        cancel: CancellationToken,
        buffered: Vec<Key>,
    },
    Hints {
        action: ActionKind,
        manager: HintManager,
        cancel: CancellationToken,
    },
    Grid {
        action: ActionKind,
        selector: GridSelector,
    },
    RecursiveGrid {
        action: ActionKind,
        selector: RecursiveSelector,
    },
    Scroll {
        input: ScrollInput,
    },
    Action,
}

impl State {
    fn mode(&self) -> Mode {
        match self {
            State::Idle => Mode::Idle,
            State::Loading { .. } | State::Hints { .. } => Mode::Hints,
            State::Grid { .. } => Mode::Grid,
            State::RecursiveGrid { .. } => Mode::RecursiveGrid,
            State::Scroll { .. } => Mode::Scroll,
            State::Action => Mode::Action,
        }
    }
}

pub struct ModeRouter {
    navigator: Arc<Navigator>,
    lifecycle: LifecycleHandler,
    bindings: Bindings,
    state: State,
    next_session: u64,
    shutdown: CancellationToken,
    events: mpsc::UnboundedSender<RouterEvent>,
    mode_tx: watch::Sender<Mode>,
}

impl ModeRouter {
    /// `events` must feed back into [`ModeRouter::handle`]; collection
    /// results arrive on it.
    pub fn new(
        navigator: Arc<Navigator>,
        lifecycle: LifecycleHandler,
        events: mpsc::UnboundedSender<RouterEvent>,
    ) -> Result<Self> {
        let bindings = Bindings::from_config(&navigator.config())?;
        let (mode_tx, _) = watch::channel(Mode::Idle);
        Ok(Self {
            navigator,
            lifecycle,
            bindings,
            state: State::Idle,
            next_session: 0,
            shutdown: CancellationToken::new(),
            events,
            mode_tx,
        })
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn subscribe(&self) -> watch::Receiver<Mode> {
        self.mode_tx.subscribe()
    }

    /// Processes one event. Returns `false` once the router has shut down.
    pub fn handle(&mut self, event: RouterEvent) -> bool {
        match event {
            RouterEvent::Enter(request) => self.enter(request),
            RouterEvent::Exit => self.exit("requested"),
            RouterEvent::Key(key) => self.on_key(key),
            RouterEvent::App(event) => self.on_app_event(event),
            RouterEvent::ConfigReloaded(config) => self.on_config(*config),
            RouterEvent::HintsReady { session, result } => self.on_hints_ready(session, result),
            RouterEvent::Shutdown => {
                self.exit("shutdown");
                self.shutdown.cancel();
                return false;
            }
        }
        self.mode_tx.send_replace(self.mode());
        true
    }

    fn enter(&mut self, request: ModeRequest) {
        if !matches!(self.state, State::Idle) {
            self.exit("mode switch");
        }
        if self.navigator.is_focused_app_excluded() {
            info!(mode = %request.mode(), "[Router] Focused app excluded, staying idle");
            return;
        }
        info!(mode = %request.mode(), "[Router] Entering mode");

        match request {
            ModeRequest::Hints(action) => self.start_hints(action),
            ModeRequest::Grid(action) => match self.navigator.show_grid() {
                Ok(selector) => self.state = State::Grid { action, selector },
                Err(e) => self.abort_entry(Mode::Grid, e),
            },
            ModeRequest::RecursiveGrid(action) => match self.navigator.show_recursive_grid() {
                Ok(selector) => self.state = State::RecursiveGrid { action, selector },
                Err(e) => self.abort_entry(Mode::RecursiveGrid, e),
            },
            ModeRequest::Scroll => match self.navigator.show_scroll_overlay() {
                Ok(()) => {
                    self.state = State::Scroll {
                        input: ScrollInput::new(self.bindings.scroll.clone()),
                    }
                }
                Err(e) => self.abort_entry(Mode::Scroll, e),
            },
            ModeRequest::Action => match self.navigator.show_action_overlay() {
                Ok(()) => self.state = State::Action,
                Err(e) => self.abort_entry(Mode::Action, e),
            },
        }
    }

    fn abort_entry(&mut self, mode: Mode, e: Error) {
        if e.is_cancellation() {
            debug!(mode = %mode, "[Router] Entry canceled");
        } else {
            warn!(mode = %mode, "[Router] Could not enter mode: {}", e);
        }
        self.state = State::Idle;
    }

    fn start_hints(&mut self, action: ActionKind) {
        self.next_session += 1;
        let session = self.next_session;
        let cancel = self.shutdown.child_token();
        let filter = self.navigator.default_filter();

        let navigator = self.navigator.clone();
        let events = self.events.clone();
        let token = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let result = navigator.build_hints(&filter, &token);
            if events.send(RouterEvent::HintsReady { session, result }).is_err() {
                debug!(session, "[Router] Coordinator gone, dropping hints");
            }
        });

        self.state = State::Loading {
            session,
            action,
            cancel,
            buffered: Vec::new(),
        };
    }

    fn on_hints_ready(&mut self, session: u64, result: Result<Arc<HintCollection>>) {
        let (action, cancel, buffered) = match &mut self.state {
            State::Loading {
                session: current,
                action,
                cancel,
                buffered,
            } if *current == session => (*action, cancel.clone(), std::mem::take(buffered)),
            _ => {
                debug!(session, "[Router] Dropping stale hint result");
                return;
            }
        };

        let collection = match result {
            Ok(c) if cancel.is_cancelled() => {
                debug!(session, count = c.count(), "[Router] Hints arrived after cancel");
                self.state = State::Idle;
                return;
            }
            Ok(c) => c,
            Err(e) => {
                self.abort_entry(Mode::Hints, e);
                return;
            }
        };
        if collection.is_empty() {
            info!("[Router] No clickable elements, leaving hint mode");
            self.state = State::Idle;
            return;
        }

        let mut manager = HintManager::new();
        manager.set_collection(collection.clone());
        if let Err(e) = self.navigator.draw_hints(collection.all()) {
            error!("[Router] Could not draw hints: {}", e);
            cancel.cancel();
            self.state = State::Idle;
            return;
        }
        let navigator = self.navigator.clone();
        manager.on_update(move |hints| {
            if let Err(e) = navigator.draw_hints(hints) {
                warn!("[Router] Hint redraw failed: {}", e);
            }
        });

        info!(session, count = collection.count(), "[Router] Hint mode active");
        self.state = State::Hints {
            action,
            manager,
            cancel,
        };
        for key in buffered {
            if self.mode() != Mode::Hints {
                break;
            }
            self.on_key(key);
        }
    }

    fn on_key(&mut self, key: Key) {
        if self.mode() != Mode::Idle && self.bindings.is_exit(&key) {
            self.exit("exit key");
            return;
        }

        match &mut self.state {
            State::Idle => {}
            State::Loading { buffered, .. } => buffered.push(key),
            State::Hints { action, manager, .. } => {
                let action = *action;
                let result = manager.handle_input(&key);
                if let Some(hint) = result.matched {
                    debug!(label = hint.label(), "[Router] Hint matched");
                    self.exit("hint matched");
                    if let Err(e) = self.navigator.perform_action_on_element(hint.element(), action) {
                        warn!("[Router] Action on '{}' failed: {}", hint.label(), e);
                    }
                }
            }
            State::Grid { action, selector } => {
                let action = *action;
                match selector.handle_input(&key) {
                    GridEvent::Ignored => {}
                    GridEvent::Redraw(cells) => self.redraw_grid(&cells),
                    GridEvent::CellSelected { point, cells } => {
                        if let Err(e) = self.navigator.perform_action(ActionKind::MoveMouse.as_str(), point) {
                            warn!("[Router] Cursor preview failed: {}", e);
                        }
                        self.redraw_grid(&cells);
                    }
                    GridEvent::Selected(point) => {
                        self.exit("grid selected");
                        if let Err(e) = self.navigator.perform_action(action.as_str(), point) {
                            warn!("[Router] Grid action failed: {}", e);
                        }
                    }
                }
            }
            State::RecursiveGrid { action, selector } => {
                let action = *action;
                match selector.handle_input(&key) {
                    RecursiveEvent::Ignored => {}
                    RecursiveEvent::Moved(_) => {
                        if let Err(e) = self.navigator.preview_recursive_grid(selector) {
                            warn!("[Router] Recursive grid preview failed: {}", e);
                        }
                    }
                    RecursiveEvent::Selected(point) => {
                        self.exit("recursive grid selected");
                        if let Err(e) = self.navigator.perform_action(action.as_str(), point) {
                            warn!("[Router] Recursive grid action failed: {}", e);
                        }
                    }
                }
            }
            State::Scroll { input } => match input.handle_key(&key) {
                ScrollOutcome::Command(command) => {
                    let (direction, amount) = command.target();
                    if let Err(e) = self.navigator.scroll(direction, amount) {
                        warn!(command = %command, "[Router] Scroll failed: {}", e);
                    }
                }
                ScrollOutcome::Pending | ScrollOutcome::Ignored => {}
            },
            State::Action => {
                if let Some(kind) = self.bindings.action_for(&key) {
                    match self.navigator.act_at_cursor(kind) {
                        Ok(point) => debug!(action = %kind, x = point.x, y = point.y, "[Router] Action performed"),
                        Err(e) => warn!(action = %kind, "[Router] Action failed: {}", e),
                    }
                } else if let Some((dx, dy)) = self.bindings.nudge_for(&key) {
                    if let Err(e) = self.navigator.nudge_cursor(dx, dy) {
                        warn!("[Router] Cursor move failed: {}", e);
                    }
                }
            }
        }
    }

    fn redraw_grid(&self, cells: &[crate::grid::GridCell]) {
        if let Err(e) = self.navigator.draw_grid(cells) {
            warn!("[Router] Grid redraw failed: {}", e);
        }
    }

    fn on_app_event(&mut self, event: AppEvent) {
        self.lifecycle.handle(&event);
        if event.ends_session() && matches!(self.mode(), Mode::Hints | Mode::Grid | Mode::RecursiveGrid) {
            self.exit("focus or screen changed");
        }
    }

    fn on_config(&mut self, config: Config) {
        let bindings = match Bindings::from_config(&config) {
            Ok(b) => b,
            Err(e) => {
                error!("[Router] Rejected configuration: {}", e);
                return;
            }
        };
        self.exit("configuration reloaded");
        let enhanced = config.hints.enhanced_bundles.clone();
        if let Err(e) = self.navigator.apply_config(config) {
            error!("[Router] Rejected configuration: {}", e);
            return;
        }
        self.lifecycle.apply_config(&enhanced);
        self.bindings = bindings;
    }

    /// Leaves the current mode, cancelling any in-flight collection and
    /// clearing the overlay.
    fn exit(&mut self, reason: &str) {
        let previous = std::mem::replace(&mut self.state, State::Idle);
        let hidden = match previous {
            State::Idle => return,
            State::Loading { cancel, .. } => {
                cancel.cancel();
                Ok(())
            }
            State::Hints { cancel, .. } => {
                cancel.cancel();
                self.navigator.hide_hints()
            }
            State::Grid { .. } | State::RecursiveGrid { .. } => self.navigator.hide_grid(),
            State::Scroll { .. } | State::Action => self.navigator.hide_scroll_overlay(),
        };
        if let Err(e) = hidden {
            warn!("[Router] Could not hide overlay: {}", e);
        }
        info!(reason, "[Router] Back to idle");
    }
}

/// Owns the coordinator thread.
///
/// Router handlers make blocking calls (AX reads, pointer injection with
/// hold delays, overlay resize waits), so the loop runs on the blocking pool
/// rather than on an async worker.
pub struct Coordinator {
    tx: mpsc::UnboundedSender<RouterEvent>,
    mode: watch::Receiver<Mode>,
    task: JoinHandle<()>,
}

impl Coordinator {
    /// Spawns the coordinator on the current runtime's blocking pool.
    pub fn spawn(navigator: Arc<Navigator>, lifecycle: LifecycleHandler) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut router = ModeRouter::new(navigator, lifecycle, tx.clone())?;
        let mode = router.subscribe();

        let task = tokio::task::spawn_blocking(move || {
            info!("[Router] Coordinator started");
            while let Some(event) = rx.blocking_recv() {
                if !router.handle(event) {
                    break;
                }
            }
            info!("[Router] Coordinator stopped");
        });

        Ok(Self { tx, mode, task })
    }

    pub fn send(&self, event: RouterEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::internal("coordinator is not running"))
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<RouterEvent> {
        self.tx.clone()
    }

    pub fn mode(&self) -> Mode {
        *self.mode.borrow()
    }

    /// Waits until the router reports `mode`.
    pub async fn wait_for(&mut self, mode: Mode) -> Result<()> {
        self.mode
            .wait_for(|m| *m == mode)
            .await
            .map(|_| ())
            .map_err(|_| Error::internal("coordinator stopped"))
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.tx.send(RouterEvent::Shutdown);
        self.task
            .await
            .map_err(|e| Error::internal(format!("coordinator task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::fake::FakeDesktop;
    use crate::a11y::{AxClient, InfoCache};
    use crate::geometry::Point;
    use crate::integration::{EnhancedAccessibility, EnhancedBundles};
    use crate::overlay::{DrawCommand, Overlay, RecordingOverlay};

    struct Harness {
        desktop: Arc<FakeDesktop>,
        overlay: Arc<RecordingOverlay>,
        router: ModeRouter,
        rx: mpsc::UnboundedReceiver<RouterEvent>,
    }

    impl Harness {
        fn new(config: Config) -> Self {
            let desktop = Arc::new(FakeDesktop::demo());
            let overlay = Arc::new(RecordingOverlay::new());
            let cache = Arc::new(InfoCache::default());
            let navigator =
                Arc::new(Navigator::new(config, desktop.clone(), overlay.clone(), cache.clone()).unwrap());
            let enhanced = Arc::new(EnhancedAccessibility::new(desktop.clone(), &EnhancedBundles::default()));
            let (tx, rx) = mpsc::unbounded_channel();
            let router = ModeRouter::new(navigator, LifecycleHandler::new(cache, enhanced), tx).unwrap();
            Self {
                desktop,
                overlay,
                router,
                rx,
            }
        }

        /// Feeds the next internally produced event back into the router.
        async fn pump(&mut self) {
            let event = self.rx.recv().await.unwrap();
            self.router.handle(event);
        }

        fn keys(&mut self, keys: &str) {
            for c in keys.chars() {
                self.router.handle(RouterEvent::Key(Key::char(c)));
            }
        }
    }

    #[tokio::test]
    async fn hint_match_clicks_the_element() {
        let mut h = Harness::new(Config::default());
        h.router.handle(RouterEvent::Enter(ModeRequest::Hints(ActionKind::LeftClick)));
        assert_eq!(h.router.mode(), Mode::Hints);
        h.pump().await;
        assert_eq!(h.overlay.labels().len(), 8);

        let label = h.overlay.labels()[0].to_lowercase();
        h.keys(&label);
        assert_eq!(h.router.mode(), Mode::Idle);
        assert!(!h.overlay.is_visible());
        let actions = h.desktop.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::LeftClick);
    }

    #[tokio::test]
    async fn keys_typed_while_loading_are_replayed() {
        let mut h = Harness::new(Config::default());
        h.router.handle(RouterEvent::Enter(ModeRequest::Hints(ActionKind::RightClick)));
        h.keys("a");
        h.pump().await;
        // Eight hints from "asdfghjkl" are single letters, so "a" matches.
        assert_eq!(h.router.mode(), Mode::Idle);
        assert_eq!(h.desktop.actions()[0].kind, ActionKind::RightClick);
    }

    #[tokio::test]
    async fn escape_during_loading_drops_the_result() {
        let mut h = Harness::new(Config::default());
        h.router.handle(RouterEvent::Enter(ModeRequest::Hints(ActionKind::LeftClick)));
        h.router.handle(RouterEvent::Key(Key::escape()));
        assert_eq!(h.router.mode(), Mode::Idle);
        h.pump().await;
        assert_eq!(h.router.mode(), Mode::Idle);
        assert!(h.overlay.labels().is_empty());
        assert!(h.desktop.actions().is_empty());
    }

    #[tokio::test]
    async fn stale_session_results_are_ignored() {
        let mut h = Harness::new(Config::default());
        h.router.handle(RouterEvent::Enter(ModeRequest::Hints(ActionKind::LeftClick)));
        h.router.handle(RouterEvent::HintsReady {
            session: 99,
            result: Ok(Arc::new(HintCollection::default())),
        });
        assert_eq!(h.router.mode(), Mode::Hints);
        h.pump().await;
        assert_eq!(h.overlay.labels().len(), 8);
    }

    #[tokio::test]
    async fn activation_ends_hint_session() {
        let mut h = Harness::new(Config::default());
        h.router.handle(RouterEvent::Enter(ModeRequest::Hints(ActionKind::LeftClick)));
        h.pump().await;
        h.router.handle(RouterEvent::App(AppEvent::Activated {
            name: "Other".into(),
            bundle_id: "com.example.other".into(),
        }));
        assert_eq!(h.router.mode(), Mode::Idle);
        assert!(!h.overlay.is_visible());
    }

    #[tokio::test]
    async fn excluded_app_stays_idle() {
        let mut config = Config::default();
        config.general.excluded_bundles = vec!["COM.EXAMPLE.DEMO".into()];
        let mut h = Harness::new(config);
        h.router.handle(RouterEvent::Enter(ModeRequest::Grid(ActionKind::LeftClick)));
        assert_eq!(h.router.mode(), Mode::Idle);
        h.router.handle(RouterEvent::Enter(ModeRequest::Hints(ActionKind::LeftClick)));
        assert_eq!(h.router.mode(), Mode::Idle);
        assert!(h.overlay.commands().is_empty());
    }

    #[tokio::test]
    async fn grid_selection_previews_then_clicks() {
        let mut config = Config::default();
        config.grid.alphabet = "asd".into();
        let mut h = Harness::new(config);
        h.desktop.set_screen(crate::geometry::Rect::new(0, 0, 300, 300));
        h.router.handle(RouterEvent::Enter(ModeRequest::Grid(ActionKind::LeftClick)));
        assert_eq!(h.router.mode(), Mode::Grid);

        h.keys("aa");
        assert_eq!(h.desktop.cursor_position(), Point::new(50, 50));
        assert_eq!(h.router.mode(), Mode::Grid);

        h.router.handle(RouterEvent::Key(Key::plain(KeyCode::Enter)));
        assert_eq!(h.router.mode(), Mode::Idle);
        let last = *h.desktop.actions().last().unwrap();
        assert_eq!(last.kind, ActionKind::LeftClick);
        assert_eq!(last.point, Point::new(50, 50));
    }

    #[tokio::test]
    async fn recursive_grid_narrows_then_acts() {
        let mut h = Harness::new(Config::default());
        h.desktop.set_screen(crate::geometry::Rect::new(0, 0, 200, 200));
        h.router.handle(RouterEvent::Enter(ModeRequest::RecursiveGrid(ActionKind::LeftClick)));
        assert_eq!(h.router.mode(), Mode::RecursiveGrid);
        assert_eq!(h.desktop.cursor_position(), Point::new(100, 100));

        h.keys("k");
        assert_eq!(h.desktop.cursor_position(), Point::new(150, 150));
        h.router.handle(RouterEvent::Key(Key::backspace()));
        assert_eq!(h.desktop.cursor_position(), Point::new(100, 100));
        h.keys("uu");
        assert_eq!(h.router.mode(), Mode::RecursiveGrid);
        assert_eq!(h.desktop.cursor_position(), Point::new(25, 25));

        h.keys("i");
        assert_eq!(h.router.mode(), Mode::Idle);
        assert!(!h.overlay.is_visible());
        let last = *h.desktop.actions().last().unwrap();
        assert_eq!(last.kind, ActionKind::LeftClick);
        assert_eq!(last.point, Point::new(37, 12));
    }

    #[tokio::test]
    async fn recursive_grid_ends_on_activation() {
        let mut h = Harness::new(Config::default());
        h.router.handle(RouterEvent::Enter(ModeRequest::RecursiveGrid(ActionKind::MoveMouse)));
        h.router.handle(RouterEvent::App(AppEvent::Activated {
            name: "Other".into(),
            bundle_id: "com.example.other".into(),
        }));
        assert_eq!(h.router.mode(), Mode::Idle);
        assert!(!h.overlay.is_visible());
    }

    #[tokio::test]
    async fn scroll_mode_maps_keys() {
        let mut h = Harness::new(Config::default());
        h.router.handle(RouterEvent::Enter(ModeRequest::Scroll));
        assert_eq!(h.router.mode(), Mode::Scroll);
        h.keys("jk");
        h.router.handle(RouterEvent::Key(Key::normalize("Ctrl+D").unwrap()));
        assert_eq!(h.desktop.scrolls(), vec![(0, -50), (0, 50), (0, -500)]);
        h.router.handle(RouterEvent::Key(Key::escape()));
        assert_eq!(h.router.mode(), Mode::Idle);
        assert!(h.overlay.scene().is_empty());
    }

    #[tokio::test]
    async fn action_mode_nudges_and_clicks() {
        let mut h = Harness::new(Config::default());
        h.desktop.set_cursor(Point::new(100, 100));
        h.router.handle(RouterEvent::Enter(ModeRequest::Action));
        assert_eq!(h.router.mode(), Mode::Action);
        assert!(h.overlay.scene().action_highlight.is_some());

        h.router.handle(RouterEvent::Key(Key::plain(KeyCode::Right)));
        assert_eq!(h.desktop.cursor_position(), Point::new(110, 100));
        h.router.handle(RouterEvent::Key(Key::normalize("Shift+R").unwrap()));
        let last = *h.desktop.actions().last().unwrap();
        assert_eq!(last.kind, ActionKind::RightClick);
        assert_eq!(last.point, Point::new(110, 100));
        assert_eq!(h.router.mode(), Mode::Action);
    }

    #[tokio::test]
    async fn config_reload_swaps_exit_keys() {
        let mut h = Harness::new(Config::default());
        let mut config = Config::default();
        config.general.mode_exit_keys = vec!["q".into()];
        h.router.handle(RouterEvent::ConfigReloaded(Box::new(config)));

        h.router.handle(RouterEvent::Enter(ModeRequest::Scroll));
        h.router.handle(RouterEvent::Key(Key::escape()));
        assert_eq!(h.router.mode(), Mode::Scroll);
        h.keys("q");
        assert_eq!(h.router.mode(), Mode::Idle);
    }

    #[tokio::test]
    async fn reload_updates_enhanced_bundle_patterns() {
        let mut h = Harness::new(Config::default());
        let activate = || {
            RouterEvent::App(AppEvent::Activated {
                name: "Demo".into(),
                bundle_id: "com.example.demo".into(),
            })
        };
        h.router.handle(activate());
        assert!(h.desktop.app_attributes().is_empty());

        let mut config = Config::default();
        config.hints.enhanced_bundles.electron = vec!["com.example.*".into()];
        h.router.handle(RouterEvent::ConfigReloaded(Box::new(config)));
        h.router.handle(activate());
        assert_eq!(
            h.desktop.app_attributes(),
            vec![(4242, "AXManualAccessibility".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn invalid_reload_keeps_previous_config() {
        let mut h = Harness::new(Config::default());
        let mut config = Config::default();
        config.hints.alphabet = "a".into();
        h.router.handle(RouterEvent::ConfigReloaded(Box::new(config)));
        h.router.handle(RouterEvent::Enter(ModeRequest::Hints(ActionKind::LeftClick)));
        h.pump().await;
        assert_eq!(h.overlay.labels().len(), 8);
    }

    #[tokio::test]
    async fn coordinator_reports_mode_changes() {
        let desktop = Arc::new(FakeDesktop::demo());
        let overlay = Arc::new(RecordingOverlay::new());
        let cache = Arc::new(InfoCache::default());
        let navigator = Arc::new(Navigator::new(Config::default(), desktop.clone(), overlay.clone(), cache.clone()).unwrap());
        let enhanced = Arc::new(EnhancedAccessibility::new(desktop.clone(), &EnhancedBundles::default()));
        let mut coordinator = Coordinator::spawn(navigator, LifecycleHandler::new(cache, enhanced)).unwrap();

        coordinator.send(RouterEvent::Enter(ModeRequest::Scroll)).unwrap();
        coordinator.wait_for(Mode::Scroll).await.unwrap();
        coordinator.send(RouterEvent::Exit).unwrap();
        coordinator.wait_for(Mode::Idle).await.unwrap();
        assert!(matches!(overlay.commands().last(), Some(DrawCommand::Hide)));
        coordinator.shutdown().await.unwrap();
    }
}
