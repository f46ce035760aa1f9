/*!
 * Hints Module
 *
 * Label generation, the indexed hint collection and the typed-prefix
 * manager that drives hint mode.
 */

pub mod collection;
pub mod generator;
pub mod manager;

pub use collection::{Hint, HintCollection};
pub use generator::LabelGenerator;
pub use manager::{HintManager, InputResult};
