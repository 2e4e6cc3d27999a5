//! Persisted user preferences.
//!
//! [`UserPreferences`] is read from and written to any [`SettingsStore`];
//! [`MemoryStore`] and [`TomlFileStore`] are provided.

mod store;
mod types;

pub use store::{MemoryStore, PreferencesError, SettingsStore, TomlFileStore};
pub use types::UserPreferences;
