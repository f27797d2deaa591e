//! Change notifications emitted by the settings store.

/// Event delivered synchronously to registered observers.
///
/// Observers run while the store is borrowed, so they cannot call back into
/// it; anything that must write settings ahead of a save does so before
/// [`SettingsStore::save`](super::SettingsStore::save) is invoked and treats
/// `AboutToSave` as a pure ordering signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingsEvent {
    /// The store is about to serialize user settings.
    AboutToSave,
    /// A single setting changed; carries the resolved key.
    SettingModified(String),
    /// A tree changed structurally, e.g. a delete or a full reload.
    Modified,
    /// The store is being dropped.
    Destroyed,
}

pub(crate) struct ObserverList {
    observers: Vec<Box<dyn Fn(&SettingsEvent)>>,
}

impl ObserverList {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, observer: Box<dyn Fn(&SettingsEvent)>) {
        self.observers.push(observer);
    }

    pub(crate) fn notify(&self, event: &SettingsEvent) {
        for observer in &self.observers {
            observer(event);
        }
    }
}
