//! The layered settings store and its persistence.
//!
//! Three trees back every lookup: session values set for the running process,
//! user values persisted between runs, and defaults shipped with the
//! installation. Reads walk the tiers in that order and return the first
//! hit. Writes target the user tier and clear any session shadow so the new
//! value is immediately visible.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::Date;
use time::macros::format_description;
use tracing::{debug, warn};

use crate::app_dirs::{AppDirError, AppPaths};
use crate::descriptor::DescriptorFactory;
use crate::document::{self, DocumentError, Element};

use super::events::{ObserverList, SettingsEvent};
use super::keys;
use super::mru::{self, MruCache, MruFile};
use super::tree::SettingsTree;
use super::value::{SettingValue, ValueComparison};

/// Root element of every settings document.
const DOCUMENT_ROOT: &str = "ConfigurationSettings";
/// Group element holding the serialized settings tree.
const SETTINGS_GROUP_NAME: &str = "settings";
/// Required filename of the first default-settings document.
pub const APPLICATION_DEFAULTS_FILE: &str = "1-ApplicationDefaults.cfg";
/// Extension default-settings documents must carry to be scanned.
const DEFAULTS_EXTENSION: &str = "cfg";
/// Ledger bound applied when `General/MruFileCount` is absent or unusable.
const DEFAULT_MRU_CAPACITY: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tier {
    Session,
    User,
    Default,
}

const TIER_COUNT: usize = 3;
/// Lookup order applied to every read.
const PRECEDENCE: [Tier; TIER_COUNT] = [Tier::Session, Tier::User, Tier::Default];

/// Product identity stamped into documents and settings filenames.
#[derive(Clone, Debug)]
pub struct ProductInfo {
    pub name: String,
    pub version: String,
    pub build_revision: String,
    pub release_date: Date,
}

impl ProductInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        build_revision: impl Into<String>,
        release_date: Date,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            build_revision: build_revision.into(),
            release_date,
        }
    }

    /// Release date in the document's attribute form, e.g. `23 June 2026`.
    fn formatted_release_date(&self) -> String {
        let format = format_description!("[day] [month repr:long] [year]");
        self.release_date.format(&format).unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    /// The mandatory first defaults document is missing, misnamed, or not
    /// alone at order 1.
    #[error("Application defaults not found; expected exactly one {path}")]
    ApplicationDefaultsMissing { path: PathBuf },
    #[error("No per-user settings location available: {0}")]
    SettingsPath(#[from] AppDirError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Owned settings store for one product instance.
///
/// The host composes one of these at startup, hands out references through
/// its service layer, and calls [`save`](Self::save) before dropping it.
pub struct SettingsStore {
    product: ProductInfo,
    paths: AppPaths,
    factory: Box<dyn DescriptorFactory>,
    trees: [SettingsTree; TIER_COUNT],
    mru: MruCache,
    observers: ObserverList,
    init_error: Option<String>,
}

impl SettingsStore {
    /// Build a store and load defaults plus user settings from disk.
    ///
    /// A failed load leaves the store usable on empty trees; the failure is
    /// kept in [`initialization_error`](Self::initialization_error) so the
    /// host can warn and keep running, or bail out.
    pub fn new(product: ProductInfo, paths: AppPaths, factory: Box<dyn DescriptorFactory>) -> Self {
        let mut store = Self {
            product,
            paths,
            factory,
            trees: Default::default(),
            mru: MruCache::default(),
            observers: ObserverList::new(),
            init_error: None,
        };
        if let Err(error) = store.reload() {
            warn!("Settings store starts unconfigured: {error}");
        }
        store
    }

    pub fn product(&self) -> &ProductInfo {
        &self.product
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn is_initialized(&self) -> bool {
        self.init_error.is_none()
    }

    /// Description of the load failure, when the last reload did not succeed.
    pub fn initialization_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    /// Register an observer for settings events. Observers stay registered
    /// for the life of the store and run synchronously.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&SettingsEvent) + 'static,
    {
        self.observers.subscribe(Box::new(observer));
    }

    fn tree(&self, tier: Tier) -> &SettingsTree {
        &self.trees[tier as usize]
    }

    fn tree_mut(&mut self, tier: Tier) -> &mut SettingsTree {
        &mut self.trees[tier as usize]
    }

    /// Map retired key spellings onto their current form.
    fn translate_key(key: &str) -> &str {
        if key == keys::LEGACY_IMPORT_EXPORT_PATH {
            keys::IMPORT_PATH
        } else {
            key
        }
    }

    /// Resolve a setting: session wins over user, user wins over defaults.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        let key = Self::translate_key(key);
        PRECEDENCE
            .iter()
            .find_map(|tier| self.tree(*tier).get_path(key))
    }

    /// Persistently set a user-tier value.
    ///
    /// Clears any session shadow of the same key so the write takes effect
    /// immediately. Returns false when the key cannot hold a value.
    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) -> bool {
        let key = Self::translate_key(key).to_string();
        self.write_user(key, value.into())
    }

    /// Like [`set`](Self::set), but skips the write when the resolved value
    /// already compares equal. Values that cannot be compared are written
    /// unconditionally rather than assumed unchanged.
    pub fn set_if_changed(&mut self, key: &str, value: impl Into<SettingValue>) -> bool {
        let key = Self::translate_key(key).to_string();
        let value = value.into();
        if let Some(current) = self.get(&key) {
            if value.compare(current) == ValueComparison::Equal {
                return true;
            }
        }
        self.write_user(key, value)
    }

    fn write_user(&mut self, key: String, value: SettingValue) -> bool {
        let accepted = self.tree_mut(Tier::User).set_path(&key, value);
        if accepted {
            self.remove_setting(Tier::Session, &key);
            self.observers.notify(&SettingsEvent::SettingModified(key));
        }
        accepted
    }

    /// Set a value for this process only; it is never persisted and it hides
    /// the user and default values until deleted.
    pub fn set_session(&mut self, key: &str, value: impl Into<SettingValue>) -> bool {
        let key = Self::translate_key(key).to_string();
        let accepted = self.tree_mut(Tier::Session).set_path(&key, value.into());
        if accepted {
            self.observers.notify(&SettingsEvent::SettingModified(key));
        }
        accepted
    }

    /// True when the resolved value would come from the user tier.
    pub fn is_user_setting(&self, key: &str) -> bool {
        let key = Self::translate_key(key);
        self.tree(Tier::Session).get_path(key).is_none()
            && self.tree(Tier::User).get_path(key).is_some()
    }

    pub fn delete_user_setting(&mut self, key: &str) {
        self.remove_setting(Tier::User, Self::translate_key(key));
    }

    pub fn delete_session_setting(&mut self, key: &str) {
        self.remove_setting(Tier::Session, Self::translate_key(key));
    }

    fn remove_setting(&mut self, tier: Tier, key: &str) {
        if self.tree_mut(tier).remove_path(key) {
            self.observers.notify(&SettingsEvent::Modified);
        }
    }

    /// Copy the resolved value of `key` into an external tree, typically a
    /// per-window snapshot. Does nothing when the key resolves to nothing.
    pub fn copy_setting(&self, key: &str, target: &mut SettingsTree) -> bool {
        let key = Self::translate_key(key);
        match self.get(key) {
            Some(value) => target.set_path(key, value.clone()),
            None => false,
        }
    }

    /// Installation root directory.
    pub fn home_dir(&self) -> &Path {
        &self.paths.home_dir
    }

    /// Product folder under the user's documents directory, when resolved.
    pub fn user_docs_dir(&self) -> Option<&Path> {
        self.paths.user_docs_dir.as_deref()
    }

    fn path_setting(&self, key: &str) -> Option<PathBuf> {
        self.get(key)
            .and_then(SettingValue::as_path)
            .map(Path::to_path_buf)
    }

    pub fn plug_in_path(&self) -> Option<PathBuf> {
        self.path_setting(keys::PLUG_IN_PATH)
    }

    pub fn temp_path(&self) -> Option<PathBuf> {
        self.path_setting(keys::TEMP_PATH)
    }

    pub fn import_path(&self) -> Option<PathBuf> {
        self.path_setting(keys::IMPORT_PATH)
    }

    pub fn export_path(&self) -> Option<PathBuf> {
        self.path_setting(keys::EXPORT_PATH)
    }

    /// The recently-used-file ledger, newest first.
    ///
    /// The first call restores entries from the user settings document; later
    /// calls reuse the cached list until [`reload`](Self::reload) resets it.
    pub fn mru_files(&mut self) -> &[MruFile] {
        self.ensure_mru_loaded();
        match &self.mru {
            MruCache::Loaded(entries) => entries,
            MruCache::NotLoaded => &[],
        }
    }

    /// Replace the ledger wholesale with a host-supplied list.
    ///
    /// The cache counts as loaded afterwards, so a later save persists
    /// exactly this list instead of re-reading the document over it.
    pub fn set_mru_files(&mut self, entries: Vec<MruFile>) {
        if let MruCache::Loaded(previous) = std::mem::replace(&mut self.mru, MruCache::Loaded(entries))
        {
            for entry in previous {
                self.release_entry(entry);
            }
        }
    }

    /// Put `entry` at the front of the ledger.
    ///
    /// An existing entry for the same file is released first, and the ledger
    /// is trimmed to the configured bound from the back.
    pub fn add_mru_file(&mut self, entry: MruFile) {
        self.ensure_mru_loaded();
        self.remove_matching_mru(entry.name());
        let capacity = self.mru_capacity();
        let mut trimmed = Vec::new();
        if let MruCache::Loaded(entries) = &mut self.mru {
            entries.insert(0, entry);
            while entries.len() > capacity {
                if let Some(last) = entries.pop() {
                    trimmed.push(last);
                }
            }
        }
        for entry in trimmed {
            self.release_entry(entry);
        }
    }

    /// Remove the ledger entry for `path`, releasing its descriptors.
    ///
    /// Matching ignores case and slash style; an empty path does nothing.
    pub fn remove_mru_file(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        self.ensure_mru_loaded();
        self.remove_matching_mru(path);
    }

    fn remove_matching_mru(&mut self, path: &str) {
        let mut removed = None;
        if let MruCache::Loaded(entries) = &mut self.mru {
            if let Some(index) = entries.iter().position(|entry| entry.matches_path(path)) {
                removed = Some(entries.remove(index));
            }
        }
        if let Some(entry) = removed {
            self.release_entry(entry);
        }
    }

    fn release_entry(&self, mut entry: MruFile) {
        for record in entry.take_descriptors() {
            self.factory.destroy(record);
        }
    }

    fn mru_capacity(&self) -> usize {
        self.get(keys::MRU_FILE_COUNT)
            .and_then(SettingValue::as_int)
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(DEFAULT_MRU_CAPACITY)
    }

    fn ensure_mru_loaded(&mut self) {
        if self.mru.is_loaded() {
            return;
        }
        let entries = self.read_mru_entries();
        self.mru.fill(entries);
    }

    fn read_mru_entries(&self) -> Vec<MruFile> {
        let path = match self.paths.user_settings_file(&self.product.version, false) {
            Ok(path) => path,
            Err(error) => {
                debug!("Recent-file entries unavailable: {error}");
                return Vec::new();
            }
        };
        if !path.is_file() {
            return Vec::new();
        }
        match read_configuration_document(&path) {
            Ok(root) => mru::entries_from_document(&root, self.factory.as_ref()),
            Err(error) => {
                debug!("No recent-file entries restored: {error}");
                Vec::new()
            }
        }
    }

    /// Throw away all in-memory state and load settings from disk again.
    ///
    /// Defaults documents merge in ascending order of their numeric filename
    /// prefix; the user document is applied last. An unreadable individual
    /// document is skipped, but a missing defaults anchor fails the reload
    /// before anything is cleared, leaving the in-memory settings untouched.
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        match self.try_reload() {
            Ok(()) => {
                self.init_error = None;
                Ok(())
            }
            Err(error) => {
                self.init_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn try_reload(&mut self) -> Result<(), SettingsError> {
        let candidates = self.collect_default_documents();
        self.verify_application_defaults(&candidates)?;

        for tree in &mut self.trees {
            tree.clear();
        }
        let stale = self.mru.reset();
        for entry in stale {
            self.release_entry(entry);
        }

        for (_, path) in &candidates {
            match parse_settings_tree(path) {
                Ok(defaults) => self.tree_mut(Tier::Default).merge(defaults),
                Err(error) => warn!("Skipping default settings document: {error}"),
            }
        }

        match self.paths.user_settings_file(&self.product.version, false) {
            Ok(path) if path.is_file() => match parse_settings_tree(&path) {
                Ok(user) => self.tree_mut(Tier::User).merge(user),
                Err(error) => warn!("Ignoring unreadable user settings: {error}"),
            },
            Ok(_) => {}
            Err(error) => debug!("User settings not loaded: {error}"),
        }

        self.observers.notify(&SettingsEvent::Modified);
        Ok(())
    }

    /// Scan the defaults directories for `<order>-<label>.cfg` documents.
    ///
    /// The shipped directory is scanned before the host-supplied one; the
    /// final sort is stable, so equal orders keep that scan order and the
    /// host document wins the merge.
    fn collect_default_documents(&self) -> Vec<(u32, PathBuf)> {
        let mut directories = vec![self.paths.default_settings_dir()];
        if let Some(extra) = self.paths.extra_default_settings_dir() {
            directories.push(extra.to_path_buf());
        }

        let mut documents: Vec<(u32, PathBuf)> = Vec::new();
        for dir in directories {
            let reader = match std::fs::read_dir(&dir) {
                Ok(reader) => reader,
                Err(error) => {
                    debug!("No default settings in {}: {error}", dir.display());
                    continue;
                }
            };
            let mut files: Vec<PathBuf> = reader
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path.extension().and_then(|ext| ext.to_str()) == Some(DEFAULTS_EXTENSION)
                })
                .collect();
            files.sort();
            for path in files {
                match load_order(&path) {
                    Some(order) => documents.push((order, path)),
                    None => debug!("Ignoring {}: no numeric load order", path.display()),
                }
            }
        }
        documents.sort_by_key(|(order, _)| *order);
        documents
    }

    /// The anchor document must be present exactly once across all scanned
    /// directories and carry its well-known name; anything else means the
    /// installation is broken or two profiles are fighting over order 1.
    fn verify_application_defaults(
        &self,
        documents: &[(u32, PathBuf)],
    ) -> Result<(), SettingsError> {
        let mut order_one = documents.iter().filter(|(order, _)| *order == 1);
        let well_named = order_one.next().is_some_and(|(_, path)| {
            path.file_name().and_then(|name| name.to_str()) == Some(APPLICATION_DEFAULTS_FILE)
        });
        if !well_named || order_one.next().is_some() {
            return Err(SettingsError::ApplicationDefaultsMissing {
                path: self.paths.default_settings_dir().join(APPLICATION_DEFAULTS_FILE),
            });
        }
        Ok(())
    }

    /// Write user settings and the ledger to the per-user settings file.
    ///
    /// The ledger is loaded first when necessary; otherwise saving from a
    /// session that never displayed recent files would wipe them.
    pub fn save(&mut self) -> Result<(), SettingsError> {
        let path = self
            .paths
            .user_settings_file(&self.product.version, true)?;
        self.observers.notify(&SettingsEvent::AboutToSave);
        self.ensure_mru_loaded();
        let entries = match &self.mru {
            MruCache::Loaded(entries) => entries.as_slice(),
            MruCache::NotLoaded => &[],
        };
        let root = build_document(
            &self.product,
            self.tree(Tier::User),
            Some(entries),
        );
        document::write_document(&path, &root)?;
        debug!("Saved user settings to {}", path.display());
        Ok(())
    }

    /// Write an arbitrary tree as a defaults document at `path`.
    ///
    /// Used by site administrators to capture a configuration for the
    /// defaults directory; the ledger is never part of these documents.
    pub fn save_as_defaults(&self, path: &Path, tree: &SettingsTree) -> Result<(), SettingsError> {
        self.observers.notify(&SettingsEvent::AboutToSave);
        let root = build_document(&self.product, tree, None);
        document::write_document(path, &root)?;
        Ok(())
    }
}

impl Drop for SettingsStore {
    fn drop(&mut self) {
        self.observers.notify(&SettingsEvent::Destroyed);
    }
}

/// Numeric load order from a `<order>-<label>.cfg` filename.
fn load_order(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let (order, _) = name.split_once('-')?;
    order.parse().ok()
}

fn read_configuration_document(path: &Path) -> Result<Element, DocumentError> {
    let root = document::read_document(path)?;
    if root.name != DOCUMENT_ROOT {
        return Err(DocumentError::Malformed {
            path: path.to_path_buf(),
        });
    }
    Ok(root)
}

/// Extract the settings tree from the document at `path`.
fn parse_settings_tree(path: &Path) -> Result<SettingsTree, DocumentError> {
    let root = read_configuration_document(path)?;
    let mut tree = SettingsTree::new();
    for group in root.children_named("group") {
        if group.attr("name") == Some(SETTINGS_GROUP_NAME) {
            tree.merge(SettingsTree::from_element(group));
        }
    }
    Ok(tree)
}

fn build_document(
    product: &ProductInfo,
    settings: &SettingsTree,
    mru_entries: Option<&[MruFile]>,
) -> Element {
    let mut root = Element::new(DOCUMENT_ROOT);
    root.set_attr("version", product.version.as_str());
    root.set_attr("build_revision", product.build_revision.as_str());
    root.set_attr("release_date", product.formatted_release_date());
    root.children.push(settings.to_element(SETTINGS_GROUP_NAME));
    if let Some(entries) = mru_entries {
        if !entries.is_empty() {
            root.children.push(mru::entries_to_element(entries));
        }
    }
    root
}
