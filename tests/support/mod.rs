use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use tempfile::TempDir;
use time::macros::date;

use specterra_settings::app_dirs::{AppPaths, DEFAULT_SETTINGS_DIR_NAME, PathOverrides};
use specterra_settings::descriptor::{DescriptorFactory, DescriptorRecord};
use specterra_settings::document::Element;
use specterra_settings::settings::{
    APPLICATION_DEFAULTS_FILE, ProductInfo, SettingsEvent, SettingsStore,
};

pub fn product() -> ProductInfo {
    ProductInfo::new("Specterra", "0.6.0", "r2841", date!(2026 - 06 - 23))
}

/// Wrap a settings body in the standard document envelope.
pub fn settings_document(settings_body: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<ConfigurationSettings version=\"0.6.0\" build_revision=\"r2841\" ",
            "release_date=\"23 June 2026\">\n",
            "  <group name=\"settings\">\n{}\n  </group>\n",
            "</ConfigurationSettings>\n"
        ),
        settings_body
    )
}

/// Descriptor used across lifecycle tests; round-trips one payload string.
#[derive(Debug)]
pub struct StubRecord {
    pub name: String,
    pub type_name: String,
    pub payload: String,
}

impl StubRecord {
    pub fn boxed(name: &str, payload: &str) -> Box<dyn DescriptorRecord> {
        Box::new(Self {
            name: name.to_string(),
            type_name: "Raster".to_string(),
            payload: payload.to_string(),
        })
    }
}

impl DescriptorRecord for StubRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn version(&self) -> u32 {
        2
    }

    fn save_body(&self, element: &mut Element) {
        element.text = self.payload.clone();
    }

    fn restore(&mut self, element: &Element, version: u32) -> bool {
        if version != 2 {
            return false;
        }
        self.payload = element.text.clone();
        true
    }
}

/// Factory that builds [`StubRecord`]s and counts released records.
pub struct StubFactory {
    pub destroyed: Rc<Cell<usize>>,
}

impl DescriptorFactory for StubFactory {
    fn create(&self, name: &str, type_name: &str) -> Option<Box<dyn DescriptorRecord>> {
        if type_name != "Raster" {
            return None;
        }
        Some(Box::new(StubRecord {
            name: name.to_string(),
            type_name: type_name.to_string(),
            payload: String::new(),
        }))
    }

    fn destroy(&self, record: Box<dyn DescriptorRecord>) {
        self.destroyed.set(self.destroyed.get() + 1);
        drop(record);
    }
}

/// Temp installation with shipped defaults and an isolated config directory.
pub struct SettingsHarness {
    pub home: TempDir,
    pub config: TempDir,
    pub destroyed: Rc<Cell<usize>>,
}

impl SettingsHarness {
    pub fn new() -> Self {
        let harness = Self {
            home: tempfile::tempdir().expect("create home dir"),
            config: tempfile::tempdir().expect("create config dir"),
            destroyed: Rc::default(),
        };
        harness.write_defaults_file(
            APPLICATION_DEFAULTS_FILE,
            concat!(
                "    <group name=\"General\">\n",
                "      <attribute name=\"MruFileCount\" type=\"int\">4</attribute>\n",
                "      <attribute name=\"AppName\" type=\"text\">Specterra</attribute>\n",
                "    </group>\n",
                "    <group name=\"FileLocations\">\n",
                "      <attribute name=\"TempPath\" type=\"path\">/scratch</attribute>\n",
                "    </group>"
            ),
        );
        harness
    }

    /// Drop a defaults document with the given settings body into the
    /// shipped `DefaultSettings` directory.
    pub fn write_defaults_file(&self, file_name: &str, settings_body: &str) {
        let dir = self.home.path().join(DEFAULT_SETTINGS_DIR_NAME);
        std::fs::create_dir_all(&dir).expect("create defaults dir");
        std::fs::write(dir.join(file_name), settings_document(settings_body))
            .expect("write defaults file");
    }

    pub fn paths(&self) -> AppPaths {
        AppPaths {
            home_dir: self.home.path().to_path_buf(),
            user_docs_dir: None,
            overrides: PathOverrides {
                config_dir: Some(self.config.path().to_path_buf()),
                default_settings_dir: None,
            },
        }
    }

    pub fn paths_with_extra_defaults(&self, dir: PathBuf) -> AppPaths {
        let mut paths = self.paths();
        paths.overrides.default_settings_dir = Some(dir);
        paths
    }

    pub fn store(&self) -> SettingsStore {
        self.store_with_paths(self.paths())
    }

    pub fn store_with_paths(&self, paths: AppPaths) -> SettingsStore {
        let factory = StubFactory {
            destroyed: Rc::clone(&self.destroyed),
        };
        SettingsStore::new(product(), paths, Box::new(factory))
    }

    /// The settings file the store reads and writes in this harness.
    pub fn user_settings_path(&self) -> PathBuf {
        self.paths()
            .user_settings_file("0.6.0", false)
            .expect("settings path resolves")
    }
}

/// Record every event a store emits for later assertions.
pub fn record_events(store: &mut SettingsStore) -> Rc<RefCell<Vec<SettingsEvent>>> {
    let seen: Rc<RefCell<Vec<SettingsEvent>>> = Rc::default();
    let sink = Rc::clone(&seen);
    store.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    seen
}
