//! AX role tags and the process-wide clickable-role set.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Role tag of an accessibility element.
///
/// Known roles get their own variant; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Application,
    Window,
    MenuBar,
    MenuBarItem,
    DockItem,
    Button,
    Link,
    TextField,
    StaticText,
    Image,
    CheckBox,
    RadioButton,
    MenuItem,
    MenuButton,
    PopUpButton,
    TabButton,
    Slider,
    Switch,
    DisclosureTriangle,
    TextArea,
    ComboBox,
    Cell,
    Row,
    Heading,
    Group,
    Other(String),
}

const KNOWN: &[(&str, Role)] = &[
    ("AXApplication", Role::Application),
    ("AXWindow", Role::Window),
    ("AXMenuBar", Role::MenuBar),
    ("AXMenuBarItem", Role::MenuBarItem),
    ("AXDockItem", Role::DockItem),
    ("AXButton", Role::Button),
    ("AXLink", Role::Link),
    ("AXTextField", Role::TextField),
    ("AXStaticText", Role::StaticText),
    ("AXImage", Role::Image),
    ("AXCheckBox", Role::CheckBox),
    ("AXRadioButton", Role::RadioButton),
    ("AXMenuItem", Role::MenuItem),
    ("AXMenuButton", Role::MenuButton),
    ("AXPopUpButton", Role::PopUpButton),
    ("AXTabButton", Role::TabButton),
    ("AXSlider", Role::Slider),
    ("AXSwitch", Role::Switch),
    ("AXDisclosureTriangle", Role::DisclosureTriangle),
    ("AXTextArea", Role::TextArea),
    ("AXComboBox", Role::ComboBox),
    ("AXCell", Role::Cell),
    ("AXRow", Role::Row),
    ("AXHeading", Role::Heading),
    ("AXGroup", Role::Group),
];

impl Role {
    /// Parses a host role string. The `AX` prefix is optional.
    pub fn parse(raw: &str) -> Role {
        let trimmed = raw.trim();
        let prefixed;
        let lookup = if trimmed.starts_with("AX") {
            trimmed
        } else {
            prefixed = format!("AX{}", trimmed);
            prefixed.as_str()
        };
        KNOWN
            .iter()
            .find(|(name, _)| *name == lookup)
            .map(|(_, role)| role.clone())
            .unwrap_or_else(|| Role::Other(trimmed.to_string()))
    }

    /// Host spelling of the role, e.g. `AXButton`.
    pub fn as_ax_str(&self) -> &str {
        if let Role::Other(raw) = self {
            return raw;
        }
        KNOWN
            .iter()
            .find(|(_, role)| role == self)
            .map(|(name, _)| *name)
            .unwrap_or("AXUnknown")
    }

    /// Roles whose subtrees never hold interactive descendants.
    pub fn is_non_interactive_container(&self) -> bool {
        matches!(self, Role::StaticText | Role::Image | Role::Heading)
    }

    /// Roles that are interactive themselves; the walker stops below them.
    pub fn is_interactive_leaf(&self) -> bool {
        matches!(
            self,
            Role::Button
                | Role::ComboBox
                | Role::CheckBox
                | Role::RadioButton
                | Role::Link
                | Role::PopUpButton
                | Role::TextField
                | Role::Slider
                | Role::TabButton
                | Role::Switch
                | Role::DisclosureTriangle
                | Role::TextArea
                | Role::MenuButton
                | Role::MenuItem
        )
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Other(String::new())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ax_str())
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Role::parse(&raw)
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::parse(raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_ax_str().to_string()
    }
}

/// Default set of roles treated as clickable.
pub fn default_clickable_roles() -> Vec<Role> {
    vec![
        Role::Button,
        Role::ComboBox,
        Role::CheckBox,
        Role::RadioButton,
        Role::Link,
        Role::PopUpButton,
        Role::TextField,
        Role::Slider,
        Role::TabButton,
        Role::Switch,
        Role::DisclosureTriangle,
        Role::TextArea,
        Role::MenuButton,
        Role::MenuItem,
        Role::Cell,
        Role::Row,
    ]
}

/// Process-wide clickable-role set, replaced atomically.
///
/// Walks copy a snapshot on entry so a concurrent replacement never changes
/// the rules halfway through a tree.
#[derive(Debug)]
pub struct ClickableRoles {
    current: RwLock<Arc<HashSet<Role>>>,
}

impl ClickableRoles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            current: RwLock::new(Arc::new(roles.into_iter().collect())),
        }
    }

    pub fn snapshot(&self) -> Arc<HashSet<Role>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, roles: impl IntoIterator<Item = Role>) {
        let next: HashSet<Role> = roles.into_iter().collect();
        info!("[Roles] Replacing clickable roles: count={}", next.len());
        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for ClickableRoles {
    fn default() -> Self {
        Self::new(default_clickable_roles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_and_without_prefix() {
        assert_eq!(Role::parse("AXButton"), Role::Button);
        assert_eq!(Role::parse("Button"), Role::Button);
        assert_eq!(Role::parse("AXSplitter"), Role::Other("AXSplitter".into()));
    }

    #[test]
    fn ax_spelling_round_trips() {
        for (name, role) in KNOWN {
            assert_eq!(role.as_ax_str(), *name);
            assert_eq!(Role::parse(name), *role);
        }
    }

    #[test]
    fn serde_uses_host_spelling() {
        let json = serde_json::to_string(&Role::MenuBarItem).unwrap();
        assert_eq!(json, "\"AXMenuBarItem\"");
        let role: Role = serde_json::from_str("\"AXLink\"").unwrap();
        assert_eq!(role, Role::Link);
    }

    #[test]
    fn snapshot_is_isolated_from_replacement() {
        let roles = ClickableRoles::new([Role::Button]);
        let before = roles.snapshot();
        roles.replace([Role::Link]);
        assert!(before.contains(&Role::Button));
        assert!(roles.snapshot().contains(&Role::Link));
        assert!(!roles.snapshot().contains(&Role::Button));
    }
}
