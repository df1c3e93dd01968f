//! `.gitignore`-style pattern matching and composable three-valued filters.

pub mod filter;
pub mod glob;

pub use filter::{FilterDecision, PathFilter};
pub use glob::is_match;
