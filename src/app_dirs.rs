//! Application directory helpers anchored to a single `.specterra` folder.
//!
//! The helpers centralize where settings files live across platforms,
//! defaulting to the OS config directory (e.g., `%APPDATA%` on Windows) and
//! allowing a `SPECTERRA_CONFIG_HOME` override for tests or portable setups.
//! The installation root and per-user documents folder are resolved here as
//! well so the settings store never reads the environment itself.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex, MutexGuard},
};

use directories::{BaseDirs, UserDirs};
use thiserror::Error;
use tracing::debug;

/// Name of the application directory that lives under the OS config root.
pub const APP_DIR_NAME: &str = ".specterra";
/// Name of the product folder created under the user's documents directory.
pub const DOCS_DIR_NAME: &str = "Specterra";
/// Directory under the installation root holding shipped default settings.
pub const DEFAULT_SETTINGS_DIR_NAME: &str = "DefaultSettings";
/// Names the installation root for developer setups that run from a build tree.
pub const HOME_ENV_VAR: &str = "SPECTERRA_HOME";
/// Overrides the OS config root for tests or portable setups.
pub const CONFIG_HOME_ENV_VAR: &str = "SPECTERRA_CONFIG_HOME";

static CONFIG_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));
static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Errors that can occur while resolving or preparing application directories.
#[derive(Debug, Error)]
pub enum AppDirError {
    /// No suitable base config directory could be resolved.
    #[error("No suitable base config directory available for settings files")]
    NoBaseDir,
    /// A directory named by an override or the platform does not exist.
    #[error("Configuration directory {path} does not exist")]
    MissingConfigDir { path: PathBuf },
    /// Failed to create the application directory.
    #[error("Failed to create settings directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Host-supplied path overrides, normally parsed from the command line.
#[derive(Clone, Debug, Default)]
pub struct PathOverrides {
    /// Store the user settings file in this existing directory instead of the
    /// per-platform default.
    pub config_dir: Option<PathBuf>,
    /// Additional directory scanned for default-settings documents.
    pub default_settings_dir: Option<PathBuf>,
}

/// Resolved application directories plus the overrides they were built with.
#[derive(Clone, Debug)]
pub struct AppPaths {
    /// Installation root; parent of the shipped `DefaultSettings` directory.
    pub home_dir: PathBuf,
    /// Per-user documents directory, when one could be resolved.
    pub user_docs_dir: Option<PathBuf>,
    pub overrides: PathOverrides,
}

impl AppPaths {
    /// Resolve directories from the environment and platform conventions.
    pub fn discover(overrides: PathOverrides) -> Self {
        Self {
            home_dir: locate_home(),
            user_docs_dir: locate_user_docs(),
            overrides,
        }
    }

    /// The shipped default-settings directory under the installation root.
    pub fn default_settings_dir(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_SETTINGS_DIR_NAME)
    }

    /// Extra default-settings directory supplied by the host, if any.
    pub fn extra_default_settings_dir(&self) -> Option<&Path> {
        self.overrides.default_settings_dir.as_deref()
    }

    /// Full path of the per-user settings file for `version`.
    ///
    /// With a config-dir override the directory must already exist. Without
    /// one the platform chain is used and the application directory is
    /// created only when `create_dir` is set, so read-only callers never
    /// leave empty directories behind.
    pub fn user_settings_file(
        &self,
        version: &str,
        create_dir: bool,
    ) -> Result<PathBuf, AppDirError> {
        let dir = match &self.overrides.config_dir {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(AppDirError::MissingConfigDir { path: dir.clone() });
                }
                dir.clone()
            }
            None => {
                let base = config_base_dir().ok_or(AppDirError::NoBaseDir)?;
                if !base.is_dir() {
                    return Err(AppDirError::MissingConfigDir { path: base });
                }
                let dir = base.join(APP_DIR_NAME);
                if create_dir {
                    std::fs::create_dir_all(&dir).map_err(|source| AppDirError::CreateDir {
                        path: dir.clone(),
                        source,
                    })?;
                }
                dir
            }
        };
        Ok(dir.join(settings_file_name(version)))
    }
}

/// Name of the settings file for `version` on the current platform.
///
/// Debug and release builds use separate files so a developer session never
/// rewrites the preferences of an installed copy.
pub fn settings_file_name(version: &str) -> String {
    format!(
        "UserSettings-{version}-{os}-{arch}{variant}.cfg",
        os = os_name(),
        arch = architecture_name(),
        variant = build_variant(),
    )
}

/// Platform label embedded in settings filenames.
pub fn os_name() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "macos" => "MacOS",
        "linux" => "Linux",
        "freebsd" => "FreeBSD",
        "solaris" => "Solaris",
        other => other,
    }
}

/// Processor label embedded in settings filenames.
pub fn architecture_name() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x86-64",
        "x86" => "x86-32",
        "sparc64" => "sparcv9",
        other => other,
    }
}

pub fn build_variant() -> &'static str {
    if cfg!(debug_assertions) { "Debug" } else { "" }
}

fn config_base_dir() -> Option<PathBuf> {
    if let Some(path) = CONFIG_BASE_OVERRIDE
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
    {
        return Some(path);
    }
    if let Ok(path) = std::env::var(CONFIG_HOME_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Installation root: `SPECTERRA_HOME` when it names an existing directory,
/// otherwise the parent of the running binary's directory.
fn locate_home() -> PathBuf {
    if let Ok(raw) = std::env::var(HOME_ENV_VAR) {
        if !raw.is_empty() {
            let path = PathBuf::from(raw);
            if path.is_dir() {
                return path.canonicalize().unwrap_or(path);
            }
            debug!(
                "{HOME_ENV_VAR} ignored: {} is not a directory",
                path.display()
            );
        }
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// The product's folder under the user's documents directory.
///
/// The folder is created on first use; if creation fails the path is still
/// reported so callers can show it in diagnostics.
fn locate_user_docs() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    let base = dirs
        .document_dir()
        .unwrap_or_else(|| dirs.home_dir())
        .to_path_buf();
    if !base.is_dir() {
        return None;
    }
    let docs = base.join(DOCS_DIR_NAME);
    if !docs.is_dir() {
        if let Err(error) = std::fs::create_dir(&docs) {
            debug!("Could not create {}: {error}", docs.display());
        }
    }
    Some(docs)
}

/// Redirects the config root to a fixed directory for the guard's lifetime.
///
/// Holds a process-wide lock so concurrent tests cannot observe each other's
/// override. Dropping the guard restores the previous state.
pub struct ConfigBaseGuard {
    previous: Option<PathBuf>,
    _lock: MutexGuard<'static, ()>,
}

impl ConfigBaseGuard {
    pub fn set(path: PathBuf) -> Self {
        let lock = TEST_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = CONFIG_BASE_OVERRIDE
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(path);
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for ConfigBaseGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = CONFIG_BASE_OVERRIDE.lock() {
            *slot = self.previous.take();
        }
    }
}
