/*!
 * Integration Module
 *
 * Glue between the navigator and the host: app exclusion, enhanced
 * accessibility for Electron and browser engines, and lifecycle reactions.
 */

pub mod enhanced;
pub mod exclusion;
pub mod lifecycle;

pub use enhanced::{AppFamily, EnhancedAccessibility, EnhancedBundles};
pub use exclusion::BundleMatcher;
pub use lifecycle::{AppEvent, LifecycleHandler};
