//! Immutable element value copied out of a live AX handle.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Role;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{Point, Rect};

/// Opaque element identifier, stable across walks of an unchanged UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derives an id from role, bounds, title and the parent path.
    ///
    /// `path` is the chain of child indices from the walk root, so two
    /// identical buttons in different containers still get distinct ids.
    pub fn derive(role: &Role, bounds: Rect, title: &str, path: &[usize]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(role.as_ax_str().as_bytes());
        hasher.update(&[0]);
        for value in [bounds.x, bounds.y, bounds.width, bounds.height] {
            hasher.update(&value.to_le_bytes());
        }
        hasher.update(title.as_bytes());
        hasher.update(&[0]);
        for index in path {
            hasher.update(&(*index as u64).to_le_bytes());
        }
        let hex = hasher.finalize().to_hex();
        Self(format!("el-{}", &hex.as_str()[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A clickable UI element. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    id: ElementId,
    bounds: Rect,
    role: Role,
    is_clickable: bool,
    title: String,
    description: String,
}

impl Element {
    /// Builds an element, rejecting an empty id or empty bounds.
    pub fn new(
        id: ElementId,
        bounds: Rect,
        role: Role,
        is_clickable: bool,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        if id.as_str().is_empty() {
            return Err(Error::new(ErrorCode::InvalidInput, "element id cannot be empty"));
        }
        if bounds.is_empty() {
            return Err(Error::new(
                ErrorCode::InvalidInput,
                format!("element bounds are empty: {}x{}", bounds.width, bounds.height),
            )
            .with_context("element_id", &id));
        }
        Ok(Self {
            id,
            bounds,
            role,
            is_clickable,
            title: title.into(),
            description: description.into(),
        })
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn is_clickable(&self) -> bool {
        self.is_clickable
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    pub fn is_visible(&self, screen: &Rect) -> bool {
        self.bounds.intersects(screen)
    }
}
