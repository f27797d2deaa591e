//! Recently-used-file entries and their document form.
//!
//! Entries live in the user settings document under a `MRUFiles` group next
//! to the settings group. Each entry carries the import descriptors needed to
//! reopen the file; descriptors belong to the host's factory and are handed
//! back to it whenever an entry leaves the ledger.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::descriptor::{DescriptorFactory, DescriptorRecord};
use crate::document::Element;

pub(crate) const MRU_GROUP_NAME: &str = "MRUFiles";
const ENTRY_ELEMENT: &str = "attribute";
const DESCRIPTOR_ELEMENT: &str = "DataDescriptor";

/// One recently used file with everything needed to re-import it.
#[derive(Debug)]
pub struct MruFile {
    name: String,
    importer_name: String,
    descriptors: Vec<Box<dyn DescriptorRecord>>,
    modification_time: OffsetDateTime,
}

impl MruFile {
    pub fn new(
        name: impl Into<String>,
        importer_name: impl Into<String>,
        descriptors: Vec<Box<dyn DescriptorRecord>>,
        modification_time: OffsetDateTime,
    ) -> Self {
        Self {
            name: name.into(),
            importer_name: importer_name.into(),
            descriptors,
            modification_time,
        }
    }

    /// Full path of the file as it was imported.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Importer used for the original load.
    pub fn importer_name(&self) -> &str {
        &self.importer_name
    }

    pub fn descriptors(&self) -> &[Box<dyn DescriptorRecord>] {
        &self.descriptors
    }

    /// File modification time recorded at import, used to detect stale
    /// entries before re-import.
    pub fn modification_time(&self) -> OffsetDateTime {
        self.modification_time
    }

    /// Case-insensitive path comparison that treats both slash styles alike,
    /// so entries written on Windows match paths typed with forward slashes.
    pub fn matches_path(&self, path: &str) -> bool {
        normalized_path(&self.name) == normalized_path(path)
    }

    pub(crate) fn take_descriptors(&mut self) -> Vec<Box<dyn DescriptorRecord>> {
        std::mem::take(&mut self.descriptors)
    }
}

fn normalized_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Ledger contents, populated on first use.
///
/// Loading is deferred until something asks for the entries because restoring
/// descriptors needs the host's factory, which may register types well after
/// the settings files were read.
#[derive(Debug, Default)]
pub(crate) enum MruCache {
    #[default]
    NotLoaded,
    Loaded(Vec<MruFile>),
}

impl MruCache {
    pub(crate) fn is_loaded(&self) -> bool {
        matches!(self, MruCache::Loaded(_))
    }

    pub(crate) fn fill(&mut self, entries: Vec<MruFile>) {
        *self = MruCache::Loaded(entries);
    }

    /// Forget everything and return to the unloaded state, so the next read
    /// restores entries from the current document.
    pub(crate) fn reset(&mut self) -> Vec<MruFile> {
        match std::mem::take(self) {
            MruCache::Loaded(entries) => entries,
            MruCache::NotLoaded => Vec::new(),
        }
    }
}

/// Collect ledger entries from a parsed settings document.
pub(crate) fn entries_from_document(
    root: &Element,
    factory: &dyn DescriptorFactory,
) -> Vec<MruFile> {
    let mut entries = Vec::new();
    for group in root.children_named("group") {
        if group.attr("name") != Some(MRU_GROUP_NAME) {
            continue;
        }
        for entry in group.children_named(ENTRY_ELEMENT) {
            if let Some(file) = entry_from_element(entry, factory) {
                entries.push(file);
            }
        }
    }
    entries
}

/// Restore one entry, or `None` when it is too incomplete to keep.
///
/// A broken descriptor only loses that descriptor; missing entry metadata
/// discards the whole entry.
fn entry_from_element(element: &Element, factory: &dyn DescriptorFactory) -> Option<MruFile> {
    element.attr("name")?;

    let mut descriptors = Vec::new();
    for descriptor in element.children_named(DESCRIPTOR_ELEMENT) {
        let (Some(type_name), Some(version)) = (descriptor.attr("type"), descriptor.attr("version"))
        else {
            debug!("Skipping recent-file descriptor without type/version attributes");
            continue;
        };
        let Ok(version) = version.parse::<u32>() else {
            debug!("Skipping recent-file descriptor with version {version:?}");
            continue;
        };
        let name = descriptor.attr("name").unwrap_or_default();
        let Some(mut record) = factory.create(name, type_name) else {
            debug!("Skipping recent-file descriptor of unregistered type {type_name:?}");
            continue;
        };
        if record.restore(descriptor, version) {
            descriptors.push(record);
        } else {
            debug!("Dropping recent-file descriptor {name:?}: restore failed");
            factory.destroy(record);
        }
    }

    let name = element.attr("name").unwrap_or_default();
    let importer = element.attr("importer").unwrap_or_default();
    let modified = element.attr("modification_time").unwrap_or_default();
    if name.is_empty() || importer.is_empty() || modified.is_empty() {
        debug!("Discarding incomplete recent-file entry {name:?}");
        for record in descriptors {
            factory.destroy(record);
        }
        return None;
    }
    let Ok(modification_time) = OffsetDateTime::parse(modified, &Rfc3339) else {
        debug!("Discarding recent-file entry {name:?}: bad modification time {modified:?}");
        for record in descriptors {
            factory.destroy(record);
        }
        return None;
    };
    Some(MruFile::new(name, importer, descriptors, modification_time))
}

/// Render ledger entries as the document's `MRUFiles` group.
///
/// Entries that could not be re-imported anyway, such as those without
/// descriptors, are left out of the document.
pub(crate) fn entries_to_element(entries: &[MruFile]) -> Element {
    let mut group = Element::new("group");
    group.set_attr("name", MRU_GROUP_NAME);
    for entry in entries {
        if entry.name().is_empty()
            || entry.importer_name().is_empty()
            || entry.descriptors().is_empty()
        {
            debug!("Not persisting incomplete recent-file entry {:?}", entry.name());
            continue;
        }
        let Ok(stamp) = entry.modification_time().format(&Rfc3339) else {
            debug!("Not persisting recent-file entry {:?}: unformattable time", entry.name());
            continue;
        };
        let mut item = Element::new(ENTRY_ELEMENT);
        item.set_attr("name", entry.name());
        item.set_attr("importer", entry.importer_name());
        item.set_attr("modification_time", stamp);
        for record in entry.descriptors() {
            let mut descriptor = Element::new(DESCRIPTOR_ELEMENT);
            descriptor.set_attr("type", record.type_name());
            descriptor.set_attr("version", record.version().to_string());
            descriptor.set_attr("name", record.name());
            record.save_body(&mut descriptor);
            item.children.push(descriptor);
        }
        group.children.push(item);
    }
    group
}
