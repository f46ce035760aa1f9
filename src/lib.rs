/*!
 * Hintpilot Library
 *
 * Keyboard-driven navigation over the accessibility tree: hint labels for
 * clickable elements, a two-level coordinate grid, scroll and action modes.
 */

pub mod a11y;
pub mod action;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod health;
pub mod hints;
pub mod input;
pub mod integration;
pub mod metrics;
pub mod overlay;
pub mod router;
pub mod scroll;
pub mod service;
pub mod validation;

// Re-export commonly used types
pub use a11y::{AxClient, Element, ElementFilter, InfoCache};
pub use action::{ActionKind, ScrollAmount, ScrollDirection};
pub use config::Config;
pub use error::{Error, ErrorCode, Result};
pub use geometry::{Point, Rect, Size};
pub use hints::{Hint, HintCollection, LabelGenerator};
pub use overlay::Overlay;
pub use router::{Coordinator, Mode, ModeRequest, ModeRouter, RouterEvent};
pub use service::Navigator;
