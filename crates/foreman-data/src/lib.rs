//! Foreman Data -- file formats and catalog loading for the planner.
//!
//! Data files may be RON, JSON or TOML; the format follows the extension.
//! A catalog directory holds `items`, `recipes`, `assemblers` and,
//! optionally, `modules`, `beacons` and `technologies`. Loading can run on
//! a background thread via [`CatalogLoader`], with cancellation and a
//! fallback directory.

pub mod background;
pub mod catalog;
pub mod files;
pub mod format;
pub mod schema;

#[cfg(test)]
mod test_support;

pub use background::{CatalogLoader, LoadError, LoadHandle, LoadOutcome, LoadSource};
pub use catalog::{load_catalog, load_catalog_cancellable};
pub use format::DataLoadError;
