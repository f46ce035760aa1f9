/*!
 * Navigator Service
 *
 * User-facing flows over the accessibility client, the overlay and the
 * action executor. Each flow checks permissions, honors app exclusion,
 * computes, draws or injects, then logs and records a metric. Flows that
 * can take a while accept a cancellation token checked between phases.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::a11y::{AxClient, ClickableCollector, ClickableRoles, Element, ElementFilter, InfoCache};
use crate::action::{ActionExecutor, ActionKind, ScrollAmount, ScrollDirection};
use crate::config::Config;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{Point, Rect};
use crate::grid::{Grid, GridCell, GridSelector, RecursiveGrid, RecursiveSelector};
use crate::health::{HealthMonitor, HealthReport};
use crate::hints::{Hint, HintCollection, LabelGenerator};
use crate::integration::BundleMatcher;
use crate::metrics::{FlowMetrics, FlowTimer};
use crate::overlay::Overlay;

/// How long a flow waits for the overlay to finish a forced resize.
const RESIZE_WAIT: Duration = Duration::from_secs(1);

/// Where to send users when the accessibility permission is missing.
const PERMISSION_HINT: &str =
    "grant access in System Settings > Privacy & Security > Accessibility, then retry";

/// Values derived from one configuration generation.
struct Settings {
    config: Arc<Config>,
    excluded: BundleMatcher,
    labels: LabelGenerator,
    filter: ElementFilter,
    executor: ActionExecutor,
}

impl Settings {
    fn build(config: Config, client: Arc<dyn AxClient>) -> Result<Self> {
        config.validate()?;
        let labels = LabelGenerator::new(&config.hints.alphabet)
            .map_err(|e| Error::wrap(e, ErrorCode::InvalidConfig, "invalid hint alphabet"))?;
        let executor = ActionExecutor::new(client, config.general.restore_cursor_position, config.scroll_steps());
        Ok(Self {
            excluded: config.excluded_bundles(),
            filter: config.element_filter(),
            labels,
            executor,
            config: Arc::new(config),
        })
    }
}

pub struct Navigator {
    client: Arc<dyn AxClient>,
    overlay: Arc<dyn Overlay>,
    cache: Arc<InfoCache>,
    roles: Arc<ClickableRoles>,
    settings: RwLock<Arc<Settings>>,
    metrics: FlowMetrics,
    health: Mutex<HealthMonitor>,
    permission_reported: AtomicBool,
}

impl Navigator {
    pub fn new(
        config: Config,
        client: Arc<dyn AxClient>,
        overlay: Arc<dyn Overlay>,
        cache: Arc<InfoCache>,
    ) -> Result<Self> {
        let roles = Arc::new(ClickableRoles::new(config.clickable_roles()));
        let settings = Settings::build(config, client.clone())?;
        Ok(Self {
            client,
            overlay,
            cache,
            roles,
            settings: RwLock::new(Arc::new(settings)),
            metrics: FlowMetrics::new(),
            health: Mutex::new(HealthMonitor::new()),
            permission_reported: AtomicBool::new(false),
        })
    }

    fn settings(&self) -> Arc<Settings> {
        match self.settings.read() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn config(&self) -> Arc<Config> {
        self.settings().config.clone()
    }

    pub fn cache(&self) -> &Arc<InfoCache> {
        &self.cache
    }

    pub fn client(&self) -> &Arc<dyn AxClient> {
        &self.client
    }

    pub fn overlay(&self) -> &Arc<dyn Overlay> {
        &self.overlay
    }

    pub fn metrics(&self) -> &FlowMetrics {
        &self.metrics
    }

    /// Swaps in a new configuration. The clickable-role set and exclusion
    /// list change atomically; in-flight walks keep their snapshot.
    pub fn apply_config(&self, config: Config) -> Result<()> {
        let roles = config.clickable_roles();
        let settings = Arc::new(Settings::build(config, self.client.clone())?);
        self.roles.replace(roles);
        match self.settings.write() {
            Ok(mut s) => *s = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
        self.cache.invalidate_all();
        info!("[Navigator] Configuration applied");
        Ok(())
    }

    fn finish<T>(&self, timer: FlowTimer, result: Result<T>) -> Result<T> {
        self.metrics.record(&timer, &result);
        match &result {
            Ok(_) => debug!(flow = timer.flow, id = %timer.flow_id, ms = timer.elapsed_ms(), "[Navigator] done"),
            Err(e) if e.is_cancellation() => debug!(flow = timer.flow, "[Navigator] canceled"),
            Err(e) if e.is_user_error() => warn!(flow = timer.flow, "[Navigator] {}", e),
            Err(e) => error!(flow = timer.flow, id = %timer.flow_id, "[Navigator] {}", e),
        }
        result
    }

    fn ensure_permissions(&self) -> Result<()> {
        if self.client.check_permissions() {
            self.permission_reported.store(false, Ordering::SeqCst);
            return Ok(());
        }
        if !self.permission_reported.swap(true, Ordering::SeqCst) {
            warn!("[Navigator] Accessibility permission denied; {}", PERMISSION_HINT);
        }
        Err(Error::new(ErrorCode::AccessibilityDenied, "accessibility permission denied")
            .with_context("hint", PERMISSION_HINT))
    }

    fn check_canceled(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::canceled());
        }
        Ok(())
    }

    /// Runs a draw call, retrying once after a forced resize.
    fn draw(&self, what: &str, call: impl Fn(&dyn Overlay) -> Result<()>) -> Result<()> {
        let first = match call(self.overlay.as_ref()) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!("[Navigator] Overlay {} failed, resizing and retrying: {}", what, first);

        let (done_tx, done_rx) = mpsc::channel();
        self.overlay.resize_to_active_screen(Box::new(move || {
            let _ = done_tx.send(());
        }));
        if done_rx.recv_timeout(RESIZE_WAIT).is_err() {
            debug!("[Navigator] Overlay resize did not confirm in time");
        }

        call(self.overlay.as_ref()).map_err(|e| {
            Error::wrap(e, ErrorCode::OverlayFailed, format!("overlay {} failed after retry", what))
        })
    }

    /// Bundle id of the focused application, if it can be read.
    pub fn focused_bundle_id(&self) -> Option<String> {
        let app = self.client.focused_application().ok()?;
        self.client.attributes_of(&app).ok()?.bundle_id
    }

    pub fn is_focused_app_excluded(&self) -> bool {
        let settings = self.settings();
        if settings.excluded.is_empty() {
            return false;
        }
        match self.focused_bundle_id() {
            Some(bundle) if settings.excluded.matches(&bundle) => {
                info!(bundle = %bundle, "[Navigator] Focused app is excluded");
                true
            }
            _ => false,
        }
    }

    /// The filter built from the current configuration.
    pub fn default_filter(&self) -> ElementFilter {
        self.settings().filter.clone()
    }

    /// Collects elements and labels them without drawing. Returns an empty
    /// collection, without walking, when the focused app is excluded.
    pub fn build_hints(&self, filter: &ElementFilter, cancel: &CancellationToken) -> Result<Arc<HintCollection>> {
        let timer = FlowTimer::start("build_hints");
        let result = self.build_hints_inner(filter, cancel);
        self.finish(timer, result)
    }

    fn build_hints_inner(&self, filter: &ElementFilter, cancel: &CancellationToken) -> Result<Arc<HintCollection>> {
        self.ensure_permissions()?;
        if self.is_focused_app_excluded() {
            return Ok(Arc::new(HintCollection::default()));
        }
        Self::check_canceled(cancel)?;

        let settings = self.settings();
        let elements = ClickableCollector::new(self.client.as_ref(), &self.cache, &self.roles)
            .max_depth(settings.config.hints.max_depth)
            .collect(filter, cancel)?;
        Self::check_canceled(cancel)?;

        let hints = settings.labels.generate(elements, cancel)?;
        Self::check_canceled(cancel)?;
        let collection = HintCollection::new(hints)?;
        info!(count = collection.count(), "[Navigator] Hints ready");
        Ok(Arc::new(collection))
    }

    /// Draws `hints` with the configured hint style.
    pub fn draw_hints(&self, hints: &[Hint]) -> Result<()> {
        let style = self.settings().config.hints.style.clone();
        self.draw("show_hints", |o| o.show_hints(hints, &style))
    }

    pub fn show_hints(&self, filter: &ElementFilter, cancel: &CancellationToken) -> Result<Arc<HintCollection>> {
        let collection = self.build_hints(filter, cancel)?;
        if collection.is_empty() {
            return Ok(collection);
        }
        let timer = FlowTimer::start("show_hints");
        let result = Self::check_canceled(cancel).and_then(|_| self.draw_hints(collection.all()));
        self.finish(timer, result)?;
        Ok(collection)
    }

    pub fn hide_hints(&self) -> Result<()> {
        let timer = FlowTimer::start("hide_hints");
        let result = self.overlay.hide();
        self.finish(timer, result)
    }

    /// Drops cached attributes and rebuilds the hints.
    pub fn refresh_hints(&self, filter: &ElementFilter, cancel: &CancellationToken) -> Result<Arc<HintCollection>> {
        self.cache.invalidate_all();
        self.show_hints(filter, cancel)
    }

    /// Performs a named action at `point`. `scroll` is rejected.
    pub fn perform_action(&self, action: &str, point: Point) -> Result<()> {
        let timer = FlowTimer::start("perform_action");
        let result = action
            .parse::<ActionKind>()
            .and_then(|kind| self.execute(kind, point));
        self.finish(timer, result)
    }

    pub fn perform_action_on_element(&self, element: &Element, kind: ActionKind) -> Result<()> {
        let timer = FlowTimer::start("perform_action_on_element");
        let result = self
            .execute(kind, element.center())
            .map_err(|e| e.with_context("element", element.id()));
        self.finish(timer, result)
    }

    fn execute(&self, kind: ActionKind, point: Point) -> Result<()> {
        self.ensure_permissions()?;
        self.settings().executor.execute(kind, point)
    }

    /// Lays the grid over the active screen and draws every cell. Row and
    /// column counts follow the screen's aspect ratio.
    pub fn show_grid(&self) -> Result<GridSelector> {
        let timer = FlowTimer::start("show_grid");
        let result = self.show_grid_inner(None);
        self.finish(timer, result)
    }

    /// [`Navigator::show_grid`] with explicit row and column counts.
    pub fn show_grid_sized(&self, rows: usize, cols: usize) -> Result<GridSelector> {
        let timer = FlowTimer::start("show_grid");
        let result = self.show_grid_inner(Some((rows, cols)));
        self.finish(timer, result)
    }

    fn show_grid_inner(&self, size: Option<(usize, usize)>) -> Result<GridSelector> {
        self.ensure_permissions()?;
        if self.is_focused_app_excluded() {
            return Err(Error::new(ErrorCode::InvalidInput, "focused application is excluded"));
        }
        let settings = self.settings();
        let alphabet = &settings.config.grid.alphabet;
        let screen = self.client.active_screen_bounds();
        let grid = match size {
            Some((rows, cols)) => Grid::with_dimensions(alphabet, screen, rows, cols)?,
            None => Grid::new(alphabet, screen)?,
        };
        info!(rows = grid.rows(), cols = grid.cols(), "[Navigator] Grid ready");
        let selector = GridSelector::new(grid);
        self.draw_grid(&selector.visible_cells())?;
        Ok(selector)
    }

    pub fn draw_grid(&self, cells: &[GridCell]) -> Result<()> {
        let style = self.settings().config.grid.style.clone();
        self.draw("show_grid", |o| o.show_grid(cells, &style))
    }

    /// Starts a recursive grid over the active screen with the pointer at
    /// its center.
    pub fn show_recursive_grid(&self) -> Result<RecursiveSelector> {
        let timer = FlowTimer::start("show_recursive_grid");
        let result = self.show_recursive_grid_inner();
        self.finish(timer, result)
    }

    fn show_recursive_grid_inner(&self) -> Result<RecursiveSelector> {
        self.ensure_permissions()?;
        if self.is_focused_app_excluded() {
            return Err(Error::new(ErrorCode::InvalidInput, "focused application is excluded"));
        }
        let config = self.config();
        let section = &config.recursive_grid;
        let grid = RecursiveGrid::new(self.client.active_screen_bounds(), section.layout())?;
        let selector = RecursiveSelector::new(grid, &section.keys, section.reset())?;
        info!(bounds = ?selector.grid().initial(), "[Navigator] Recursive grid ready");
        self.preview_recursive_grid(&selector)?;
        Ok(selector)
    }

    /// Moves the pointer to the selector's current center and redraws it.
    pub fn preview_recursive_grid(&self, selector: &RecursiveSelector) -> Result<()> {
        self.execute(ActionKind::MoveMouse, selector.grid().center())?;
        let style = self.config().recursive_grid.style.clone();
        let cells = selector.visible_cells();
        self.draw("show_grid", |o| o.show_grid(&cells, &style))
    }

    pub fn hide_grid(&self) -> Result<()> {
        let timer = FlowTimer::start("hide_grid");
        let result = self.overlay.hide();
        self.finish(timer, result)
    }

    /// Scrolls at the cursor and returns the injected deltas.
    pub fn scroll(&self, direction: ScrollDirection, amount: ScrollAmount) -> Result<(i32, i32)> {
        let timer = FlowTimer::start("scroll");
        let result = self
            .ensure_permissions()
            .and_then(|_| self.settings().executor.scroll(direction, amount));
        self.finish(timer, result)
    }

    /// Outlines the area that scroll keys will affect.
    pub fn show_scroll_overlay(&self) -> Result<()> {
        let timer = FlowTimer::start("show_scroll_overlay");
        let result = self.ensure_permissions().and_then(|_| {
            let config = self.config();
            let area = self.scroll_area();
            self.draw("scroll_highlight", |o| {
                o.draw_scroll_highlight(area, &config.scroll.highlight_color, config.scroll.highlight_width)
            })
        });
        self.finish(timer, result)
    }

    fn scroll_area(&self) -> Rect {
        let screen = self.client.active_screen_bounds();
        self.client
            .frontmost_window()
            .and_then(|w| self.client.attributes_of(&w))
            .map(|attrs| attrs.bounds())
            .ok()
            .filter(|b| !b.is_empty() && b.intersects(&screen))
            .unwrap_or(screen)
    }

    pub fn hide_scroll_overlay(&self) -> Result<()> {
        let timer = FlowTimer::start("hide_scroll_overlay");
        let result = self.overlay.hide();
        self.finish(timer, result)
    }

    /// Outlines the active screen and marks the cursor for action mode.
    pub fn show_action_overlay(&self) -> Result<()> {
        let timer = FlowTimer::start("show_action_overlay");
        let result = self.ensure_permissions().and_then(|_| {
            let config = self.config();
            let screen = self.client.active_screen_bounds();
            let cursor = self.client.cursor_position();
            self.draw("action_highlight", |o| {
                o.draw_action_highlight(screen, &config.action.highlight_color, config.action.highlight_width)?;
                o.draw_cursor_dot(cursor, config.action.cursor_dot_radius, &config.action.cursor_dot)
            })
        });
        self.finish(timer, result)
    }

    /// Moves the pointer by a relative offset and redraws the cursor dot.
    pub fn nudge_cursor(&self, dx: i32, dy: i32) -> Result<Point> {
        let timer = FlowTimer::start("move_mouse");
        let result = self.ensure_permissions().and_then(|_| {
            let to = self.settings().executor.nudge(dx, dy)?;
            let config = self.config();
            self.draw("cursor_dot", |o| {
                o.draw_cursor_dot(to, config.action.cursor_dot_radius, &config.action.cursor_dot)
            })?;
            Ok(to)
        });
        self.finish(timer, result)
    }

    /// Clicks at the current cursor position.
    pub fn act_at_cursor(&self, kind: ActionKind) -> Result<Point> {
        let point = self.client.cursor_position();
        self.perform_action(kind.as_str(), point)?;
        Ok(point)
    }

    pub fn health(&self) -> HealthReport {
        let accessibility = self.client.check_permissions();
        let overlay = self.overlay.is_healthy();
        let cache_entries = self.cache.len();
        match self.health.lock() {
            Ok(mut monitor) => monitor.report(accessibility, overlay, cache_entries),
            Err(poisoned) => poisoned.into_inner().report(accessibility, overlay, cache_entries),
        }
    }
}
