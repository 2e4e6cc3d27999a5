//! Typed user preferences over a [`SettingsStore`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use super::store::{PreferencesError, SettingsStore};
use crate::planner::Quality;

const KEY_OUTPUT_DIR: &str = "output_dir";
const KEY_USE_DEFAULT_OUTPUT_DIR: &str = "use_default_output_dir";
const KEY_USE_GPU: &str = "use_gpu";
const KEY_QUALITY: &str = "quality_percent";

/// Settings the user expects to survive a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Last chosen output folder.
    pub output_dir: Option<PathBuf>,
    /// Ignore `output_dir` and use the application's default folder.
    pub use_default_output_dir: bool,
    pub use_gpu: bool,
    pub quality_percent: Quality,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            output_dir: None,
            use_default_output_dir: true,
            use_gpu: false,
            quality_percent: Quality::default(),
        }
    }
}

impl UserPreferences {
    /// Reads preferences from `store`. Missing keys take defaults; values
    /// that do not parse take defaults with a warning.
    pub fn load(store: &dyn SettingsStore) -> Result<Self, PreferencesError> {
        let defaults = Self::default();

        let output_dir = store
            .get(KEY_OUTPUT_DIR)?
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let use_default_output_dir = parsed(
            store,
            KEY_USE_DEFAULT_OUTPUT_DIR,
            defaults.use_default_output_dir,
        )?;
        let use_gpu = parsed(store, KEY_USE_GPU, defaults.use_gpu)?;
        let quality = parsed::<u8>(store, KEY_QUALITY, defaults.quality_percent.percent())?;
        let quality_percent = Quality::try_from(quality).unwrap_or_else(|e| {
            warn!("Ignoring stored {}: {}", KEY_QUALITY, e);
            defaults.quality_percent
        });

        Ok(Self {
            output_dir,
            use_default_output_dir,
            use_gpu,
            quality_percent,
        })
    }

    pub fn save(&self, store: &dyn SettingsStore) -> Result<(), PreferencesError> {
        let output_dir = self
            .output_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        store.set(KEY_OUTPUT_DIR, &output_dir)?;
        store.set(
            KEY_USE_DEFAULT_OUTPUT_DIR,
            &self.use_default_output_dir.to_string(),
        )?;
        store.set(KEY_USE_GPU, &self.use_gpu.to_string())?;
        store.set(KEY_QUALITY, &self.quality_percent.percent().to_string())
    }

    /// Output folder to use, given the application's default folder.
    pub fn effective_output_dir(&self, default_dir: &std::path::Path) -> PathBuf {
        match (&self.output_dir, self.use_default_output_dir) {
            (Some(dir), false) => dir.clone(),
            _ => default_dir.to_path_buf(),
        }
    }
}

fn parsed<T>(store: &dyn SettingsStore, key: &str, default: T) -> Result<T, PreferencesError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(match store.get(key)? {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Ignoring stored {} {:?}: {}", key, raw, e);
            default
        }),
        None => default,
    })
}
