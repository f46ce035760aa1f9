/*!
 * Clickable Collector
 *
 * Gathers clickable elements from the frontmost window plus the optional
 * supplementary roots (menubar, extra menubar targets, dock, notification
 * center, Stage Manager) and applies the element filter to the union.
 */

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::walker::DEFAULT_MAX_DEPTH;
use super::{
    AxClient, AxHandle, AxRoot, ClickableRoles, Element, ElementFilter, InfoCache, Role,
    TreeWalker, WalkOptions,
};
use crate::error::{Error, ErrorCode, Result};

pub const DOCK_BUNDLE_ID: &str = "com.apple.dock";
pub const NOTIFICATION_CENTER_BUNDLE_ID: &str = "com.apple.notificationcenterui";
pub const STAGE_MANAGER_BUNDLE_ID: &str = "com.apple.WindowManager";

/// One-shot collector bound to a role snapshot.
pub struct ClickableCollector<'a> {
    walker: TreeWalker<'a>,
    client: &'a dyn AxClient,
    roles: Arc<HashSet<Role>>,
    max_depth: usize,
}

impl<'a> ClickableCollector<'a> {
    /// Snapshots `roles` so a concurrent replacement cannot change the
    /// rules halfway through the collection.
    pub fn new(client: &'a dyn AxClient, cache: &'a InfoCache, roles: &ClickableRoles) -> Self {
        Self {
            walker: TreeWalker::new(client, cache),
            client,
            roles: roles.snapshot(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Collects, filters and de-duplicates clickable elements.
    pub fn collect(&self, filter: &ElementFilter, cancel: &CancellationToken) -> Result<Vec<Element>> {
        let screen = self.client.active_screen_bounds();
        let overview = self.client.is_system_overview_active();
        let base = WalkOptions::new(self.roles.clone(), screen)
            .include_offscreen(filter.include_offscreen)
            .max_depth(self.max_depth);

        let mut elements = Vec::new();

        if overview {
            debug!("[Collector] System overview active, skipping frontmost window");
        } else {
            let window = self.client.frontmost_window().map_err(|e| {
                Error::wrap(e, ErrorCode::AccessibilityFailed, "no frontmost window")
            })?;
            elements.extend(self.walker.clickable_elements(AxRoot::Window(window), &base, cancel)?);
        }

        if filter.include_menubar && !overview {
            let found = self.supplementary("menubar", cancel, || {
                let app = self.client.focused_application()?;
                let menubar = self.client.menu_bar(&app)?;
                let options = base.clone().with_extra_role(Role::MenuBarItem);
                self.walker
                    .clickable_elements(AxRoot::Application(menubar), &options, cancel)
            })?;
            elements.extend(found);
        }

        for bundle_id in &filter.additional_menubar_targets {
            let found = self.supplementary(bundle_id, cancel, || {
                let app = self.client.application_by_bundle(bundle_id)?;
                let menubar = self.client.menu_bar(&app)?;
                let options = base
                    .clone()
                    .include_offscreen(true)
                    .with_extra_role(Role::MenuBarItem);
                self.walker
                    .clickable_elements(AxRoot::Application(menubar), &options, cancel)
            })?;
            elements.extend(found);
        }

        if filter.include_dock {
            let found = self.supplementary("dock", cancel, || {
                let dock = self.application(DOCK_BUNDLE_ID)?;
                let options = base.clone().include_offscreen(true).with_extra_role(Role::DockItem);
                self.walker
                    .clickable_elements(AxRoot::Application(dock), &options, cancel)
            })?;
            elements.extend(found);
        }

        if filter.include_notification_center && overview {
            let found = self.supplementary("notification center", cancel, || {
                let center = self.client.application_by_bundle(NOTIFICATION_CENTER_BUNDLE_ID)?;
                let options = base.clone().include_offscreen(true);
                self.walker
                    .clickable_elements(AxRoot::Application(center), &options, cancel)
            })?;
            elements.extend(found);
        }

        if filter.include_stage_manager {
            let found = self.supplementary("stage manager", cancel, || {
                let manager = self.application(STAGE_MANAGER_BUNDLE_ID)?;
                let options = base.clone().include_offscreen(true);
                self.walker
                    .clickable_elements(AxRoot::Application(manager), &options, cancel)
            })?;
            elements.extend(found);
        }

        if cancel.is_cancelled() {
            return Err(Error::canceled());
        }

        let walked = elements.len();
        let mut seen = HashSet::new();
        let mut by_role: BTreeMap<String, usize> = BTreeMap::new();
        elements.retain(|element| {
            let keep = filter.matches(element) && seen.insert(element.id().clone());
            if keep {
                *by_role.entry(element.role().to_string()).or_default() += 1;
            }
            keep
        });

        info!(
            walked = walked,
            kept = elements.len(),
            overview = overview,
            "[Collector] Collected clickable elements"
        );
        debug!("[Collector] Roles: {:?}", by_role);
        Ok(elements)
    }

    /// Looks up a system application and rejects anything that is not an
    /// application element (a stale menu child, for instance).
    fn application(&self, bundle_id: &str) -> Result<AxHandle> {
        let app = self.client.application_by_bundle(bundle_id)?;
        let attributes = self.client.attributes_of(&app)?;
        if attributes.role != Role::Application {
            return Err(Error::new(
                ErrorCode::AccessibilityFailed,
                format!("expected an application element, got {}", attributes.role),
            )
            .with_context("bundle_id", bundle_id));
        }
        Ok(app)
    }

    /// Runs one supplementary walk. Failures are logged and yield nothing;
    /// cancellation still propagates.
    fn supplementary<F>(&self, name: &str, cancel: &CancellationToken, walk: F) -> Result<Vec<Element>>
    where
        F: FnOnce() -> Result<Vec<Element>>,
    {
        match walk() {
            Ok(found) => {
                debug!("[Collector] {} contributed {} elements", name, found.len());
                Ok(found)
            }
            Err(e) if e.is_cancellation() || cancel.is_cancelled() => Err(Error::canceled()),
            Err(e) => {
                warn!("[Collector] Skipping {}: {}", name, e);
                Ok(Vec::new())
            }
        }
    }
}
