//! End-to-end navigator flows against the in-memory desktop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hintpilot::a11y::fake::{self, FakeDesktop};
use hintpilot::a11y::{ClickableCollector, ClickableRoles, ElementFilter, InfoCache, Role};
use hintpilot::hints::HintManager;
use hintpilot::input::Key;
use hintpilot::overlay::RecordingOverlay;
use hintpilot::{ActionKind, AxClient, Config, ErrorCode, Navigator, Point, Rect, ScrollAmount, ScrollDirection};

fn navigator(desktop: Arc<FakeDesktop>, config: Config) -> (Arc<RecordingOverlay>, Navigator) {
    let overlay = Arc::new(RecordingOverlay::new());
    let nav = Navigator::new(config, desktop, overlay.clone(), Arc::new(InfoCache::default())).unwrap();
    (overlay, nav)
}

/// Focused app `bundle` with a window holding one button.
fn single_app_desktop(bundle: &str) -> Arc<FakeDesktop> {
    let desktop = FakeDesktop::new(Rect::new(0, 0, 1000, 800));
    let mut app = fake::attributes(Role::Application, Rect::new(0, 0, 1000, 800));
    app.bundle_id = Some(bundle.to_string());
    app.pid = Some(77);
    let app = desktop.add_node(app);
    desktop.set_focused_application(app);
    let window = desktop.add_node(fake::attributes(Role::Window, Rect::new(0, 0, 1000, 800)));
    desktop.set_frontmost_window(Some(window));
    let mut button = fake::attributes(Role::Button, Rect::new(20, 20, 80, 30));
    button.title = "Old".into();
    desktop.add_child(window, button);
    Arc::new(desktop)
}

#[test]
fn typing_a_label_clicks_its_element() {
    let desktop = Arc::new(FakeDesktop::demo());
    let (overlay, nav) = navigator(desktop.clone(), Config::default());
    let collection = nav.show_hints(&nav.default_filter(), &CancellationToken::new()).unwrap();
    assert_eq!(overlay.labels(), ["A", "S", "D", "F", "G", "H", "J", "K"]);

    let mut manager = HintManager::new();
    manager.set_collection(collection);
    let result = manager.handle_input(&Key::char('d'));
    let hint = result.matched.expect("single-letter label matches");
    nav.hide_hints().unwrap();
    nav.perform_action_on_element(hint.element(), ActionKind::LeftClick).unwrap();

    let action = desktop.actions()[0];
    assert_eq!(action.point, hint.element().center());
    assert_eq!(desktop.outstanding_handles(), 0);
}

#[test]
fn excluded_app_short_circuits_without_walking() {
    let desktop = single_app_desktop("com.excluded.app");
    let mut config = Config::default();
    config.general.excluded_bundles = vec!["com.excluded.app".into()];
    let (overlay, nav) = navigator(desktop.clone(), config);

    let hints = nav.show_hints(&nav.default_filter(), &CancellationToken::new()).unwrap();
    assert_eq!(hints.count(), 0);
    assert!(overlay.commands().is_empty());
    // Only the focused application was touched to read its bundle id.
    assert_eq!(desktop.acquired_handles(), 1);
    assert_eq!(desktop.attribute_reads(), 1);
    assert!(nav.is_focused_app_excluded());
}

#[test]
fn wildcard_exclusion_is_case_insensitive() {
    let desktop = single_app_desktop("com.Excluded.Editor");
    let mut config = Config::default();
    config.general.excluded_bundles = vec!["com.excluded.*".into()];
    let (_, nav) = navigator(desktop, config);
    assert!(nav.is_focused_app_excluded());
}

#[test]
fn scroll_goes_through_its_own_entry_point() {
    let desktop = Arc::new(FakeDesktop::demo());
    let mut config = Config::default();
    config.scroll.scroll_step = 10;
    let (_, nav) = navigator(desktop.clone(), config);

    let err = nav.perform_action("scroll", Point::new(10, 10)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInput);
    assert_eq!(nav.scroll(ScrollDirection::Down, ScrollAmount::Char).unwrap(), (0, -10));
    assert_eq!(desktop.scrolls(), vec![(0, -10)]);
    assert!(desktop.actions().is_empty());
}

#[test]
fn cache_tolerates_staleness_until_ttl() {
    let desktop = single_app_desktop("com.example.app");
    let cache = InfoCache::new(Duration::from_millis(100));
    let roles = ClickableRoles::new(hintpilot::a11y::roles::default_clickable_roles());
    let filter = ElementFilter::default();
    let titles = || {
        ClickableCollector::new(desktop.as_ref(), &cache, &roles)
            .collect(&filter, &CancellationToken::new())
            .unwrap()
            .iter()
            .map(|e| e.title().to_string())
            .collect::<Vec<_>>()
    };

    assert_eq!(titles(), ["Old"]);
    desktop.update_attributes(2, |a| a.title = "New".into());
    assert_eq!(titles(), ["Old"]);
    thread::sleep(Duration::from_millis(150));
    assert_eq!(titles(), ["New"]);
}

#[test]
fn restore_cursor_returns_pointer_after_click() {
    let desktop = Arc::new(FakeDesktop::demo());
    let mut config = Config::default();
    config.general.restore_cursor_position = true;
    let (_, nav) = navigator(desktop.clone(), config);
    desktop.set_cursor(Point::new(5, 5));
    for kind in [ActionKind::LeftClick, ActionKind::RightClick, ActionKind::MiddleClick] {
        nav.perform_action(kind.as_str(), Point::new(400, 300)).unwrap();
        assert_eq!(desktop.cursor_position(), Point::new(5, 5));
    }
}

#[test]
fn grid_two_char_selection_targets_cell_center() {
    let desktop = Arc::new(FakeDesktop::new(Rect::new(0, 0, 300, 300)));
    let mut config = Config::default();
    config.grid.alphabet = "asd".into();
    let (_, nav) = navigator(desktop, config);

    let mut selector = nav.show_grid().unwrap();
    assert_eq!((selector.grid().rows(), selector.grid().cols()), (3, 3));
    selector.handle_input(&Key::char('a'));
    match selector.handle_input(&Key::char('a')) {
        hintpilot::grid::GridEvent::CellSelected { point, .. } => assert_eq!(point, Point::new(50, 50)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn far_offscreen_elements_keep_saturated_centers() {
    let desktop = FakeDesktop::new(Rect::new(0, 0, 1000, 800));
    let app = desktop.add_node(fake::attributes(Role::Application, Rect::new(0, 0, 1000, 800)));
    desktop.set_focused_application(app);
    let window = desktop.add_node(fake::attributes(Role::Window, Rect::new(0, 0, 1000, 800)));
    desktop.set_frontmost_window(Some(window));
    desktop.add_child(window, fake::attributes(Role::Button, Rect::new(20, 20, 80, 30)));
    desktop.add_child(window, fake::attributes(Role::Button, Rect::new(i32::MAX - 5, 10, 20, 20)));
    let desktop = Arc::new(desktop);

    let mut config = Config::default();
    config.hints.include_offscreen = true;
    let (_, nav) = navigator(desktop, config);
    let collection = nav.build_hints(&nav.default_filter(), &CancellationToken::new()).unwrap();

    assert_eq!(collection.count(), 2);
    let far = collection
        .all()
        .iter()
        .find(|h| h.element().bounds().x == i32::MAX - 5)
        .expect("far element is kept");
    assert_eq!(far.element().center(), Point::new(i32::MAX, 20));
}
