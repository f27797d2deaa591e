//! Layered application settings.
//!
//! One [`SettingsStore`] owns the session, user, and default tiers, the
//! persisted user document, and the recently-used-files ledger. Hosts build
//! it once at startup from [`AppPaths`](crate::app_dirs::AppPaths) and a
//! descriptor factory, then route all settings access through it.

pub mod events;
pub mod keys;
mod mru;
mod store;
mod tree;
mod value;

pub use events::SettingsEvent;
pub use mru::MruFile;
pub use store::{APPLICATION_DEFAULTS_FILE, ProductInfo, SettingsError, SettingsStore};
pub use tree::SettingsTree;
pub use value::{SettingValue, ValueComparison};
