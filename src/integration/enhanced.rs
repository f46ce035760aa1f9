/*!
 * Enhanced Accessibility
 *
 * Electron apps only expose a full AX tree once `AXManualAccessibility` is
 * set on the application; Chromium and Firefox browsers need
 * `AXEnhancedUserInterface`. Each attribute is applied once per process id.
 */

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::exclusion::BundleMatcher;
use crate::a11y::AxClient;

pub const MANUAL_ACCESSIBILITY: &str = "AXManualAccessibility";
pub const ENHANCED_USER_INTERFACE: &str = "AXEnhancedUserInterface";

pub const ELECTRON_BUNDLES: &[&str] = &[
    "com.microsoft.VSCode",
    "com.exafunction.windsurf",
    "com.tinyspeck.slackmacgap",
    "com.spotify.client",
    "md.obsidian",
];

pub const CHROMIUM_BUNDLES: &[&str] = &[
    "net.imput.helium",
    "com.google.Chrome",
    "com.brave.Browser",
    "company.thebrowser.Browser",
];

pub const FIREFOX_BUNDLES: &[&str] = &["org.mozilla.firefox", "app.zen-browser.zen"];

/// Extra bundle patterns on top of the built-in lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedBundles {
    pub electron: Vec<String>,
    pub chromium: Vec<String>,
    pub firefox: Vec<String>,
}

/// Engine family of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppFamily {
    Electron,
    Chromium,
    Firefox,
}

impl AppFamily {
    pub fn attribute(&self) -> &'static str {
        match self {
            AppFamily::Electron => MANUAL_ACCESSIBILITY,
            AppFamily::Chromium | AppFamily::Firefox => ENHANCED_USER_INTERFACE,
        }
    }
}

struct Family {
    kind: AppFamily,
    builtin: &'static [&'static str],
    matcher: RwLock<BundleMatcher>,
    enabled: Mutex<HashSet<i32>>,
}

impl Family {
    fn new(kind: AppFamily, builtin: &'static [&'static str], extra: &[String]) -> Self {
        Self {
            kind,
            builtin,
            matcher: RwLock::new(Self::matcher(builtin, extra)),
            enabled: Mutex::new(HashSet::new()),
        }
    }

    fn matcher(builtin: &[&str], extra: &[String]) -> BundleMatcher {
        BundleMatcher::new(builtin.iter().copied().chain(extra.iter().map(String::as_str)))
    }

    fn matches(&self, bundle_id: &str) -> bool {
        match self.matcher.read() {
            Ok(matcher) => matcher.matches(bundle_id),
            Err(poisoned) => poisoned.into_inner().matches(bundle_id),
        }
    }

    fn set_extra(&self, extra: &[String]) {
        let matcher = Self::matcher(self.builtin, extra);
        match self.matcher.write() {
            Ok(mut current) => *current = matcher,
            Err(poisoned) => *poisoned.into_inner() = matcher,
        }
    }
}

pub struct EnhancedAccessibility {
    client: Arc<dyn AxClient>,
    families: Vec<Family>,
}

impl EnhancedAccessibility {
    pub fn new(client: Arc<dyn AxClient>, extra: &EnhancedBundles) -> Self {
        Self {
            client,
            families: vec![
                Family::new(AppFamily::Electron, ELECTRON_BUNDLES, &extra.electron),
                Family::new(AppFamily::Chromium, CHROMIUM_BUNDLES, &extra.chromium),
                Family::new(AppFamily::Firefox, FIREFOX_BUNDLES, &extra.firefox),
            ],
        }
    }

    /// Replaces the configured extra patterns. Pids already configured stay
    /// configured.
    pub fn set_extra_bundles(&self, extra: &EnhancedBundles) {
        for family in &self.families {
            let patterns = match family.kind {
                AppFamily::Electron => &extra.electron,
                AppFamily::Chromium => &extra.chromium,
                AppFamily::Firefox => &extra.firefox,
            };
            family.set_extra(patterns);
        }
        debug!("[Enhanced] Bundle patterns updated");
    }

    /// Families whose lists contain `bundle_id`.
    pub fn classify(&self, bundle_id: &str) -> Vec<AppFamily> {
        self.families
            .iter()
            .filter(|f| f.matches(bundle_id))
            .map(|f| f.kind)
            .collect()
    }

    /// Applies the family attributes to the running application. Returns
    /// the families that are enabled for its pid afterwards.
    pub fn ensure(&self, bundle_id: &str) -> Vec<AppFamily> {
        let wanted: Vec<&Family> = self
            .families
            .iter()
            .filter(|f| f.matches(bundle_id))
            .collect();
        if wanted.is_empty() {
            return Vec::new();
        }

        let pid = match self
            .client
            .application_by_bundle(bundle_id)
            .and_then(|app| self.client.attributes_of(&app))
        {
            Ok(attrs) => attrs.pid.filter(|pid| *pid > 0),
            Err(e) => {
                debug!("[Enhanced] Cannot inspect {}: {}", bundle_id, e);
                None
            }
        };
        let Some(pid) = pid else {
            return Vec::new();
        };

        let mut enabled = Vec::new();
        for family in wanted {
            let mut pids = match family.enabled.lock() {
                Ok(pids) => pids,
                Err(e) => {
                    warn!("[Enhanced] pid set poisoned: {}", e);
                    continue;
                }
            };
            if pids.contains(&pid) {
                enabled.push(family.kind);
                continue;
            }
            if self.client.set_app_attribute(pid, family.kind.attribute(), true) {
                info!(pid, bundle = bundle_id, "[Enhanced] Enabled {}", family.kind.attribute());
                pids.insert(pid);
                enabled.push(family.kind);
            } else {
                warn!(pid, bundle = bundle_id, "[Enhanced] Failed to set {}", family.kind.attribute());
            }
        }
        enabled
    }

    /// Forgets a terminated process so a reused pid is configured again.
    pub fn forget(&self, pid: i32) {
        for family in &self.families {
            if let Ok(mut pids) = family.enabled.lock() {
                pids.remove(&pid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::fake::{attributes, FakeDesktop};
    use crate::a11y::Role;
    use crate::geometry::Rect;

    fn desktop_with(bundle: &str, pid: i32) -> Arc<FakeDesktop> {
        let desktop = Arc::new(FakeDesktop::new(Rect::new(0, 0, 800, 600)));
        let mut app = attributes(Role::Application, Rect::default());
        app.pid = Some(pid);
        app.bundle_id = Some(bundle.to_string());
        let id = desktop.add_node(app);
        desktop.register_application(bundle, id);
        desktop
    }

    #[test]
    fn electron_attribute_is_set_once_per_pid() {
        let desktop = desktop_with("com.microsoft.VSCode", 77);
        let enhanced = EnhancedAccessibility::new(desktop.clone(), &EnhancedBundles::default());
        assert_eq!(enhanced.classify("COM.MICROSOFT.VSCODE"), vec![AppFamily::Electron]);
        assert_eq!(enhanced.ensure("com.microsoft.VSCode"), vec![AppFamily::Electron]);
        assert_eq!(enhanced.ensure("com.microsoft.VSCode"), vec![AppFamily::Electron]);
        assert_eq!(
            desktop.app_attributes(),
            vec![(77, MANUAL_ACCESSIBILITY.to_string(), true)]
        );
    }

    #[test]
    fn configured_prefix_enables_chromium_mode() {
        let desktop = desktop_with("com.vivaldi.Vivaldi", 12);
        let extra = EnhancedBundles {
            chromium: vec!["com.vivaldi.*".into()],
            ..Default::default()
        };
        let enhanced = EnhancedAccessibility::new(desktop.clone(), &extra);
        assert_eq!(enhanced.ensure("com.vivaldi.Vivaldi"), vec![AppFamily::Chromium]);
        assert_eq!(desktop.app_attributes()[0].1, ENHANCED_USER_INTERFACE);
    }

    #[test]
    fn replaced_patterns_apply_to_later_activations() {
        let desktop = desktop_with("com.vivaldi.Vivaldi", 12);
        let enhanced = EnhancedAccessibility::new(desktop.clone(), &EnhancedBundles::default());
        assert!(enhanced.ensure("com.vivaldi.Vivaldi").is_empty());

        enhanced.set_extra_bundles(&EnhancedBundles {
            chromium: vec!["com.vivaldi.*".into()],
            ..Default::default()
        });
        assert_eq!(enhanced.ensure("com.vivaldi.Vivaldi"), vec![AppFamily::Chromium]);
        assert!(enhanced.classify("com.microsoft.VSCode").contains(&AppFamily::Electron));

        enhanced.set_extra_bundles(&EnhancedBundles::default());
        assert!(enhanced.classify("com.vivaldi.Vivaldi").is_empty());
        assert_eq!(desktop.app_attributes().len(), 1);
    }

    #[test]
    fn unknown_bundles_are_left_alone() {
        let desktop = desktop_with("com.apple.finder", 5);
        let enhanced = EnhancedAccessibility::new(desktop.clone(), &EnhancedBundles::default());
        assert!(enhanced.ensure("com.apple.finder").is_empty());
        assert!(enhanced.classify("org.mozilla.firefox").contains(&AppFamily::Firefox));
        assert!(desktop.app_attributes().is_empty());
    }

    #[test]
    fn forgotten_pid_is_configured_again() {
        let desktop = desktop_with("md.obsidian", 9);
        let enhanced = EnhancedAccessibility::new(desktop.clone(), &EnhancedBundles::default());
        enhanced.ensure("md.obsidian");
        enhanced.forget(9);
        enhanced.ensure("md.obsidian");
        assert_eq!(desktop.app_attributes().len(), 2);
    }
}
