/*!
 * Tree Walker
 *
 * Depth-first traversal of a live AX tree. Attribute reads go through the
 * shared info cache; the walk builds an owned `TreeNode` tree, copies every
 * clickable node into an `Element`, then drops the tree, which releases
 * every handle it acquired. Early returns (errors, cancellation) drop the
 * partial tree the same way.
 */

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AxAttributes, AxClient, AxHandle, AxRoot, Element, ElementId, InfoCache, Role};
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::Rect;

/// Default traversal depth limit.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Pixels added around the active screen before pruning offscreen nodes.
pub const OFFSCREEN_MARGIN: i32 = 8;

/// Children examined between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 100;

/// Options for a single walk.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub include_offscreen: bool,
    pub max_depth: usize,
    /// Clickable-role snapshot taken when the walk was requested.
    pub roles: Arc<HashSet<Role>>,
    /// Active screen used for offscreen pruning.
    pub screen: Rect,
}

impl WalkOptions {
    pub fn new(roles: Arc<HashSet<Role>>, screen: Rect) -> Self {
        Self {
            include_offscreen: false,
            max_depth: DEFAULT_MAX_DEPTH,
            roles,
            screen,
        }
    }

    pub fn include_offscreen(mut self, include: bool) -> Self {
        self.include_offscreen = include;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Extends the role set for this walk only. The shared set is untouched,
    /// so nothing needs restoring afterwards.
    pub fn with_extra_role(mut self, role: Role) -> Self {
        if !self.roles.contains(&role) {
            let mut roles = (*self.roles).clone();
            roles.insert(role);
            self.roles = Arc::new(roles);
        }
        self
    }

    fn is_clickable(&self, info: &AxAttributes) -> bool {
        self.roles.contains(&info.role) || info.has_press_action()
    }
}

/// Internal walk result. Owns its handle and all descendants.
#[derive(Debug)]
pub(crate) struct TreeNode {
    handle: AxHandle,
    info: Arc<AxAttributes>,
    path: Vec<usize>,
    children: Vec<TreeNode>,
}

#[derive(Debug, Default)]
struct WalkStats {
    examined: usize,
    visited: usize,
    pruned: usize,
    attribute_errors: usize,
    depth_limited: usize,
}

/// Walks AX trees through an [`AxClient`] and an [`InfoCache`].
pub struct TreeWalker<'a> {
    client: &'a dyn AxClient,
    cache: &'a InfoCache,
}

impl<'a> TreeWalker<'a> {
    pub fn new(client: &'a dyn AxClient, cache: &'a InfoCache) -> Self {
        Self { client, cache }
    }

    /// Returns every clickable element reachable from `root`.
    ///
    /// Fails with `AccessibilityFailed` when the root itself cannot be read
    /// and with `ContextCanceled` when `cancel` fires mid-walk. All handles
    /// acquired here are released before returning.
    pub fn clickable_elements(
        &self,
        root: AxRoot,
        options: &WalkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Element>> {
        if cancel.is_cancelled() {
            return Err(Error::canceled());
        }

        let handle = match root {
            AxRoot::Window(h) | AxRoot::Application(h) => h,
        };
        let info = self.info_for(&handle).map_err(|e| {
            Error::wrap(e, ErrorCode::AccessibilityFailed, "failed to read walk root")
        })?;

        let mut stats = WalkStats::default();
        let mut tree = TreeNode {
            handle,
            info,
            path: Vec::new(),
            children: Vec::new(),
        };
        self.descend(&mut tree, 1, options, &mut stats, cancel)?;

        let mut elements = Vec::new();
        flatten(&tree, options, &mut elements);
        drop(tree);

        debug!(
            examined = stats.examined,
            visited = stats.visited,
            pruned = stats.pruned,
            attribute_errors = stats.attribute_errors,
            depth_limited = stats.depth_limited,
            clickable = elements.len(),
            "[Walker] Walk complete"
        );
        Ok(elements)
    }

    fn info_for(&self, handle: &AxHandle) -> Result<Arc<AxAttributes>> {
        if let Some(info) = self.cache.get(handle.key()) {
            return Ok(info);
        }
        let attributes = self.client.attributes_of(handle)?;
        Ok(self.cache.insert(handle.key(), attributes))
    }

    fn descend(
        &self,
        node: &mut TreeNode,
        depth: usize,
        options: &WalkOptions,
        stats: &mut WalkStats,
        cancel: &CancellationToken,
    ) -> Result<()> {
        stats.visited += 1;
        if depth >= options.max_depth {
            stats.depth_limited += 1;
            return Ok(());
        }
        let role = &node.info.role;
        if role.is_interactive_leaf() {
            return Ok(());
        }
        if role.is_non_interactive_container() && !node.info.has_press_action() {
            return Ok(());
        }

        let children = match self.client.children_of(&node.handle) {
            Ok(children) => children,
            Err(e) => {
                debug!("[Walker] Children unavailable, skipping subtree: {}", e);
                stats.attribute_errors += 1;
                return Ok(());
            }
        };

        for (index, child) in children.into_iter().enumerate() {
            stats.examined += 1;
            if stats.examined % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(Error::canceled());
            }
            let info = match self.info_for(&child) {
                Ok(info) => info,
                Err(e) => {
                    debug!("[Walker] Attribute read failed, skipping subtree: {}", e);
                    stats.attribute_errors += 1;
                    continue;
                }
            };
            if !options.include_offscreen && is_offscreen(&info, &options.screen) {
                stats.pruned += 1;
                continue;
            }
            let mut path = node.path.clone();
            path.push(index);
            let mut child = TreeNode {
                handle: child,
                info,
                path,
                children: Vec::new(),
            };
            self.descend(&mut child, depth + 1, options, stats, cancel)?;
            node.children.push(child);
        }
        Ok(())
    }
}

fn is_offscreen(info: &AxAttributes, screen: &Rect) -> bool {
    let bounds = info.bounds();
    if bounds.is_empty() {
        return info.role.is_interactive_leaf();
    }
    !bounds.intersects(&screen.expand(OFFSCREEN_MARGIN))
}

fn flatten(node: &TreeNode, options: &WalkOptions, out: &mut Vec<Element>) {
    if options.is_clickable(&node.info) {
        let info = &node.info;
        let bounds = info.bounds();
        let id = ElementId::derive(&info.role, bounds, &info.title, &node.path);
        match Element::new(
            id,
            bounds,
            info.role.clone(),
            true,
            info.title.clone(),
            info.description.clone(),
        ) {
            Ok(element) => out.push(element),
            Err(e) => debug!("[Walker] Dropping clickable node: {}", e),
        }
    }
    for child in &node.children {
        flatten(child, options, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::fake::{attributes, pressable, FakeDesktop};
    use crate::a11y::roles::default_clickable_roles;
    use std::time::Duration;

    fn options(desktop: &FakeDesktop) -> WalkOptions {
        WalkOptions::new(
            Arc::new(default_clickable_roles().into_iter().collect()),
            desktop.active_screen_bounds(),
        )
    }

    fn walk(desktop: &FakeDesktop, cache: &InfoCache, options: &WalkOptions) -> Result<Vec<Element>> {
        let root = AxRoot::Window(desktop.frontmost_window()?);
        TreeWalker::new(desktop, cache).clickable_elements(root, options, &CancellationToken::new())
    }

    #[test]
    fn collects_clickables_and_releases_every_handle() {
        let desktop = FakeDesktop::demo();
        let cache = InfoCache::default();
        let elements = walk(&desktop, &cache, &options(&desktop)).unwrap();
        let titles: Vec<_> = elements.iter().map(|e| e.title().to_string()).collect();
        assert_eq!(
            titles,
            ["Back", "Forward", "Reload", "Share", "Item 1", "Item 2", "Item 3", "Search"]
        );
        assert!(desktop.acquired_handles() > 0);
        assert_eq!(desktop.outstanding_handles(), 0);
    }

    #[test]
    fn press_action_makes_any_role_clickable() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        desktop.add_child(window, pressable(attributes(Role::Group, Rect::new(10, 10, 40, 40))));
        desktop.add_child(window, attributes(Role::Group, Rect::new(60, 10, 40, 40)));

        let elements = walk(&desktop, &InfoCache::default(), &options(&desktop)).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].bounds(), Rect::new(10, 10, 40, 40));
    }

    #[test]
    fn offscreen_subtrees_are_pruned_unless_requested() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        desktop.add_child(window, attributes(Role::Button, Rect::new(10, 10, 20, 20)));
        desktop.add_child(window, attributes(Role::Button, Rect::new(900, 900, 20, 20)));
        desktop.add_child(window, attributes(Role::Button, Rect::new(503, 10, 20, 20)));

        let cache = InfoCache::default();
        assert_eq!(walk(&desktop, &cache, &options(&desktop)).unwrap().len(), 2);
        let all = walk(&desktop, &cache, &options(&desktop).include_offscreen(true)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(desktop.outstanding_handles(), 0);
    }

    #[test]
    fn attribute_failure_skips_only_that_subtree() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        let broken = desktop.add_child(window, attributes(Role::Group, Rect::new(0, 0, 200, 200)));
        desktop.add_child(broken, attributes(Role::Button, Rect::new(10, 10, 20, 20)));
        desktop.add_child(window, attributes(Role::Link, Rect::new(300, 10, 20, 20)));
        desktop.fail_attributes(broken);

        let elements = walk(&desktop, &InfoCache::default(), &options(&desktop)).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].role(), &Role::Link);
        assert_eq!(desktop.outstanding_handles(), 0);
    }

    #[test]
    fn unreadable_root_is_accessibility_failure() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        desktop.fail_attributes(window);

        let err = walk(&desktop, &InfoCache::default(), &options(&desktop)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessibilityFailed);
        assert_eq!(desktop.outstanding_handles(), 0);
    }

    #[test]
    fn interactive_leaves_and_text_are_not_descended() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        let button = desktop.add_child(window, attributes(Role::Button, Rect::new(0, 0, 100, 40)));
        desktop.add_child(button, attributes(Role::Link, Rect::new(5, 5, 10, 10)));
        let text = desktop.add_child(window, attributes(Role::StaticText, Rect::new(0, 50, 100, 20)));
        desktop.add_child(text, attributes(Role::Link, Rect::new(5, 55, 10, 10)));

        let elements = walk(&desktop, &InfoCache::default(), &options(&desktop)).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].role(), &Role::Button);
    }

    #[test]
    fn depth_limit_stops_descent() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        let group = desktop.add_child(window, attributes(Role::Group, Rect::new(0, 0, 500, 500)));
        desktop.add_child(group, attributes(Role::Button, Rect::new(10, 10, 20, 20)));

        let cache = InfoCache::default();
        assert!(walk(&desktop, &cache, &options(&desktop).max_depth(2)).unwrap().is_empty());
        assert_eq!(walk(&desktop, &cache, &options(&desktop).max_depth(3)).unwrap().len(), 1);
    }

    #[test]
    fn cancellation_mid_walk_releases_handles() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 2000, 2000));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 2000, 2000)));
        desktop.set_frontmost_window(Some(window));
        for i in 0..250 {
            let group = desktop.add_child(window, attributes(Role::Group, Rect::new(i, 0, 10, 10)));
            desktop.add_child(group, attributes(Role::Button, Rect::new(i, 0, 5, 5)));
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        desktop.on_attribute_read(move |reads| {
            if reads == 150 {
                trigger.cancel();
            }
        });
        let root = AxRoot::Window(desktop.frontmost_window().unwrap());
        let cache = InfoCache::default();
        let err = TreeWalker::new(&desktop, &cache)
            .clickable_elements(root, &options(&desktop), &cancel)
            .unwrap_err();
        assert!(err.is_cancellation());
        assert!(desktop.attribute_reads() < 400);
        assert_eq!(desktop.outstanding_handles(), 0);
    }

    #[test]
    fn cancellation_is_seen_among_pruned_siblings() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        for i in 0..1000 {
            desktop.add_child(window, attributes(Role::Button, Rect::new(5000 + i, 0, 10, 10)));
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        desktop.on_attribute_read(move |reads| {
            if reads == 50 {
                trigger.cancel();
            }
        });
        let root = AxRoot::Window(desktop.frontmost_window().unwrap());
        let cache = InfoCache::default();
        let err = TreeWalker::new(&desktop, &cache)
            .clickable_elements(root, &options(&desktop), &cancel)
            .unwrap_err();
        assert!(err.is_cancellation());
        assert!(desktop.attribute_reads() <= 100);
        assert_eq!(desktop.outstanding_handles(), 0);
    }

    #[test]
    fn cancelled_before_start_reads_nothing() {
        let desktop = FakeDesktop::demo();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let root = AxRoot::Window(desktop.frontmost_window().unwrap());
        let cache = InfoCache::default();
        let err = TreeWalker::new(&desktop, &cache)
            .clickable_elements(root, &options(&desktop), &cancel)
            .unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(desktop.attribute_reads(), 0);
        assert_eq!(desktop.outstanding_handles(), 0);
    }

    #[test]
    fn cached_attributes_tolerate_staleness_until_ttl() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        let mut save = attributes(Role::Button, Rect::new(10, 10, 40, 20));
        save.title = "Save".into();
        let button = desktop.add_child(window, save);

        let cache = InfoCache::new(Duration::from_millis(200));
        let first = walk(&desktop, &cache, &options(&desktop)).unwrap();
        desktop.update_attributes(button, |a| a.title = "Saved".into());
        let second = walk(&desktop, &cache, &options(&desktop)).unwrap();
        assert_eq!(first[0].title(), "Save");
        assert_eq!(second[0].title(), "Save");

        std::thread::sleep(Duration::from_millis(250));
        let third = walk(&desktop, &cache, &options(&desktop)).unwrap();
        assert_eq!(third[0].title(), "Saved");
    }

    #[test]
    fn extra_role_applies_to_a_single_walk() {
        let desktop = FakeDesktop::new(Rect::new(0, 0, 500, 500));
        let window = desktop.add_node(attributes(Role::Window, Rect::new(0, 0, 500, 500)));
        desktop.set_frontmost_window(Some(window));
        desktop.add_child(window, attributes(Role::MenuBarItem, Rect::new(0, 0, 40, 20)));

        let cache = InfoCache::default();
        let base = options(&desktop);
        let extended = base.clone().with_extra_role(Role::MenuBarItem);
        assert_eq!(walk(&desktop, &cache, &extended).unwrap().len(), 1);
        assert!(walk(&desktop, &cache, &base).unwrap().is_empty());
    }
}
