//! Output formatters for scan results and action reports.
//!
//! - [`text`]: human-readable report for the terminal
//! - [`json`]: machine-readable report for scripting
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::duplicates::{apply_strategy, DuplicateFinder, SelectionStrategy};
//! use dupekeep::output::json::JsonOutput;
//! use std::path::Path;
//!
//! let result = DuplicateFinder::with_defaults()
//!     .find_duplicates(Path::new("."))
//!     .unwrap();
//! let decisions = apply_strategy(&result.groups, SelectionStrategy::KeepOldest);
//!
//! let output = JsonOutput::new(&result, SelectionStrategy::KeepOldest, &decisions);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::TextOutput;
