//! Reactions to application and display lifecycle notifications.

use std::sync::Arc;

use tracing::{debug, info};

use super::enhanced::{EnhancedAccessibility, EnhancedBundles};
use crate::a11y::InfoCache;

/// Notification delivered by the platform's application watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Launched { name: String, bundle_id: String },
    Terminated { name: String, bundle_id: String, pid: Option<i32> },
    Activated { name: String, bundle_id: String },
    Deactivated { name: String, bundle_id: String },
    ScreenParametersChanged,
}

impl AppEvent {
    /// Whether an active hint or grid session must end.
    pub fn ends_session(&self) -> bool {
        matches!(self, AppEvent::Activated { .. } | AppEvent::ScreenParametersChanged)
    }
}

pub struct LifecycleHandler {
    cache: Arc<InfoCache>,
    enhanced: Arc<EnhancedAccessibility>,
}

impl LifecycleHandler {
    pub fn new(cache: Arc<InfoCache>, enhanced: Arc<EnhancedAccessibility>) -> Self {
        Self { cache, enhanced }
    }

    pub fn handle(&self, event: &AppEvent) {
        match event {
            AppEvent::Launched { name, bundle_id } => self.on_launch(name, bundle_id),
            AppEvent::Terminated { name, bundle_id, pid } => self.on_terminate(name, bundle_id, *pid),
            AppEvent::Activated { name, bundle_id } => self.on_activate(name, bundle_id),
            AppEvent::Deactivated { name, bundle_id } => self.on_deactivate(name, bundle_id),
            AppEvent::ScreenParametersChanged => self.on_screen_parameters_changed(),
        }
    }

    /// Picks up reloaded enhanced-accessibility patterns.
    pub fn apply_config(&self, bundles: &EnhancedBundles) {
        self.enhanced.set_extra_bundles(bundles);
    }

    pub fn on_launch(&self, name: &str, bundle_id: &str) {
        debug!(bundle = bundle_id, "[Lifecycle] {} launched", name);
    }

    pub fn on_terminate(&self, name: &str, bundle_id: &str, pid: Option<i32>) {
        debug!(bundle = bundle_id, "[Lifecycle] {} terminated", name);
        if let Some(pid) = pid {
            self.enhanced.forget(pid);
        }
    }

    pub fn on_activate(&self, name: &str, bundle_id: &str) {
        info!(bundle = bundle_id, "[Lifecycle] {} activated", name);
        self.cache.invalidate_all();
        self.enhanced.ensure(bundle_id);
    }

    pub fn on_deactivate(&self, name: &str, bundle_id: &str) {
        debug!(bundle = bundle_id, "[Lifecycle] {} deactivated", name);
    }

    pub fn on_screen_parameters_changed(&self) {
        info!("[Lifecycle] Screen parameters changed");
        self.cache.invalidate_all();
    }
}
