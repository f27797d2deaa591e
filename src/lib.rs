//! Settings core for the Specterra analysis workbench.
/// Application directory discovery and overrides.
pub mod app_dirs;
/// Import descriptor traits implemented by the host.
pub mod descriptor;
/// Settings document reading and writing.
pub mod document;
/// Layered settings store, persistence, and the recent-files ledger.
pub mod settings;
