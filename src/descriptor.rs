//! Import descriptor records attached to recently used files.
//!
//! The settings core does not know any concrete descriptor type. Hosts
//! register a factory that creates records by type tag; the core only saves
//! them into settings documents, restores them on load, and hands them back
//! to the factory when entries are dropped.

use crate::document::Element;

/// One versioned, serializable description of how to re-import a file.
pub trait DescriptorRecord: std::fmt::Debug {
    /// Name the record was created under, usually a dataset name.
    fn name(&self) -> &str;
    /// Registered type tag used to re-create the record on load.
    fn type_name(&self) -> &str;
    /// Serialization version written alongside the record.
    fn version(&self) -> u32;
    /// Add the record's payload to an already-attributed descriptor element.
    fn save_body(&self, element: &mut Element);
    /// Restore the payload from a descriptor element written as `version`.
    ///
    /// Returns false when the element cannot be understood; the record is
    /// then released instead of being attached to an entry.
    fn restore(&mut self, element: &Element, version: u32) -> bool;
}

/// Creates and releases descriptor records on behalf of the settings core.
pub trait DescriptorFactory {
    /// Create an empty record for the given name and type tag, or `None`
    /// when the type is not registered in this build.
    fn create(&self, name: &str, type_name: &str) -> Option<Box<dyn DescriptorRecord>>;

    /// Release a record removed from the ledger. Factories that track live
    /// records override this to run their own cleanup.
    fn destroy(&self, record: Box<dyn DescriptorRecord>) {
        drop(record);
    }
}

/// Factory for hosts that never restore descriptors, such as headless tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDescriptors;

impl DescriptorFactory for NoDescriptors {
    fn create(&self, _name: &str, _type_name: &str) -> Option<Box<dyn DescriptorRecord>> {
        None
    }
}
