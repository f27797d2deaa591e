//! Well-known setting keys shared between the core and its consumers.

/// Default directory offered by import dialogs.
pub const IMPORT_PATH: &str = "FileLocations/ImportPath";
/// Default directory offered by export dialogs.
pub const EXPORT_PATH: &str = "FileLocations/ExportPath";
/// Directory scanned for plug-in modules at startup.
pub const PLUG_IN_PATH: &str = "FileLocations/PlugInPath";
/// Scratch directory handed to importers and plug-ins.
pub const TEMP_PATH: &str = "FileLocations/TempPath";
/// Upper bound on the recently-used-files ledger.
pub const MRU_FILE_COUNT: &str = "General/MruFileCount";
/// Retired spelling of [`IMPORT_PATH`]; redirected before every operation so
/// callers built against old releases keep working.
pub const LEGACY_IMPORT_EXPORT_PATH: &str = "FileLocations/ImportExportPath";
