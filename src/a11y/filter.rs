//! Post-walk element filter and the supplementary-root switches.

use std::collections::HashSet;

use super::{Element, Role};
use crate::geometry::Size;

/// Which elements survive a walk and which extra roots are walked.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementFilter {
    pub min_size: Size,
    /// Empty means "any role".
    pub roles: HashSet<Role>,
    pub exclude_roles: HashSet<Role>,
    pub include_offscreen: bool,
    pub include_menubar: bool,
    pub additional_menubar_targets: Vec<String>,
    pub include_dock: bool,
    pub include_notification_center: bool,
    pub include_stage_manager: bool,
}

impl Default for ElementFilter {
    fn default() -> Self {
        Self {
            min_size: Size::new(1, 1),
            roles: HashSet::new(),
            exclude_roles: HashSet::new(),
            include_offscreen: false,
            include_menubar: false,
            additional_menubar_targets: Vec::new(),
            include_dock: false,
            include_notification_center: false,
            include_stage_manager: false,
        }
    }
}

impl ElementFilter {
    pub fn matches(&self, element: &Element) -> bool {
        let bounds = element.bounds();
        bounds.width >= self.min_size.width
            && bounds.height >= self.min_size.height
            && (self.roles.is_empty() || self.roles.contains(element.role()))
            && !self.exclude_roles.contains(element.role())
    }

    /// True when any root besides the frontmost window must be walked.
    pub fn wants_supplementary(&self) -> bool {
        self.include_menubar
            || self.include_dock
            || self.include_notification_center
            || self.include_stage_manager
            || !self.additional_menubar_targets.is_empty()
    }
}
