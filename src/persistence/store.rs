//! Profile Store - named profiles, the active selection and the config file
//!
//! The active profile exists twice: as the persisted entry in `profiles` and as
//! the `live` copy every edit goes to. `save` folds the live copy back into the
//! map before writing. Selecting another profile replaces the live copy without
//! folding it back, so unsaved edits of the previous profile are discarded.

use super::profile::{AxisConfig, FfbStrengths, NetworkTarget, Profile, ProfileError};
use crate::device::EffectKind;
use color_eyre::{eyre::eyre, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const DEFAULT_PROFILE: &str = "Default";

/// On-disk encoding, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }

    fn encode(&self, record: &StoreRecord<'_>) -> Result<String> {
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(record)
                .map_err(|e| eyre!("Failed to serialize profiles as JSON: {}", e)),
            ConfigFormat::Toml => toml::to_string_pretty(record)
                .map_err(|e| eyre!("Failed to serialize profiles as TOML: {}", e)),
        }
    }

    /// Decodes either the profile store document or a legacy single-profile document
    fn decode(&self, content: &str) -> Result<StoreDocument> {
        match self {
            ConfigFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(content)
                    .map_err(|e| eyre!("Failed to parse JSON config: {}", e))?;
                if !value.is_object() {
                    return Err(eyre!("Config root is not an object"));
                }
                if value.get("profiles").is_some() {
                    serde_json::from_value(value)
                        .map_err(|e| eyre!("Failed to read profile store: {}", e))
                } else {
                    let legacy: Profile = serde_json::from_value(value)
                        .map_err(|e| eyre!("Failed to read legacy profile: {}", e))?;
                    Ok(StoreDocument::migrate(legacy))
                }
            }
            ConfigFormat::Toml => {
                let value: toml::Table = content
                    .parse()
                    .map_err(|e| eyre!("Failed to parse TOML config: {}", e))?;
                if value.contains_key("profiles") {
                    toml::Value::Table(value)
                        .try_into()
                        .map_err(|e| eyre!("Failed to read profile store: {}", e))
                } else {
                    let legacy: Profile = toml::Value::Table(value)
                        .try_into()
                        .map_err(|e| eyre!("Failed to read legacy profile: {}", e))?;
                    Ok(StoreDocument::migrate(legacy))
                }
            }
        }
    }
}

#[derive(Serialize)]
struct StoreRecord<'a> {
    active_profile: &'a str,
    profiles: &'a BTreeMap<String, Profile>,
}

#[derive(Debug, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    active_profile: Option<String>,
    // document order decides the fallback when the active name is missing
    profiles: IndexMap<String, Profile>,
}

impl StoreDocument {
    fn migrate(legacy: Profile) -> Self {
        info!("Migrating legacy single-profile config into '{}'", DEFAULT_PROFILE);
        Self {
            active_profile: Some(DEFAULT_PROFILE.to_string()),
            profiles: IndexMap::from([(DEFAULT_PROFILE.to_string(), legacy)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    format: ConfigFormat,
    active: String,
    profiles: BTreeMap<String, Profile>,
    live: Profile,
}

impl ProfileStore {
    /// Fresh store holding only an empty "Default"
    pub fn new(path: PathBuf) -> Self {
        let format = ConfigFormat::from_path(&path);
        Self {
            path,
            format,
            active: DEFAULT_PROFILE.to_string(),
            profiles: BTreeMap::from([(DEFAULT_PROFILE.to_string(), Profile::default())]),
            live: Profile::default(),
        }
    }

    /// Loads the store from `path`
    ///
    /// A missing file gives a fresh store. An unreadable or corrupt file is
    /// logged and also gives a fresh store; it is only overwritten on the next save.
    pub async fn load(path: PathBuf) -> Self {
        let exists = match tokio::fs::try_exists(&path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Failed to check config file {}: {}", path.display(), e);
                false
            }
        };
        if !exists {
            info!("No config at {}, starting with defaults", path.display());
            return Self::new(path);
        }

        match Self::read_document(&path).await {
            Ok(document) => Self::from_document(path, document),
            Err(e) => {
                error!(
                    "Config {} is corrupt, resetting to an empty '{}' profile: {}",
                    path.display(),
                    DEFAULT_PROFILE,
                    e
                );
                Self::new(path)
            }
        }
    }

    async fn read_document(path: &Path) -> Result<StoreDocument> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        ConfigFormat::from_path(path).decode(&content)
    }

    fn from_document(path: PathBuf, document: StoreDocument) -> Self {
        let declared = document
            .active_profile
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        let active = if document.profiles.contains_key(&declared) {
            declared
        } else {
            let fallback = document
                .profiles
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
            warn!(
                "Active profile '{}' not found, falling back to '{}'",
                declared, fallback
            );
            fallback
        };

        let mut profiles: BTreeMap<String, Profile> = document.profiles.into_iter().collect();
        profiles.entry(DEFAULT_PROFILE.to_string()).or_default();
        let live = profiles.get(&active).cloned().unwrap_or_default();

        info!(
            "Loaded {} profile(s) from {}, active: '{}'",
            profiles.len(),
            path.display(),
            active
        );

        Self {
            format: ConfigFormat::from_path(&path),
            path,
            active,
            profiles,
            live,
        }
    }

    /// Folds the live configuration into the active profile and writes the whole store
    pub async fn save(&mut self) -> Result<()> {
        self.profiles.insert(self.active.clone(), self.live.clone());

        let content = self.format.encode(&StoreRecord {
            active_profile: &self.active,
            profiles: &self.profiles,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
            }
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;

        info!(
            "Saved {} profile(s) to {}",
            self.profiles.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Creates an empty profile and makes it active, keeping the live edits of the current one
    pub fn create(&mut self, name: &str) -> Result<(), ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::InvalidName(name.to_string()));
        }
        if self.profiles.contains_key(name) {
            return Err(ProfileError::ProfileExists(name.to_string()));
        }

        self.profiles.insert(self.active.clone(), self.live.clone());
        self.profiles.insert(name.to_string(), Profile::default());
        self.active = name.to_string();
        self.live = Profile::default();
        info!("Created profile '{}'", name);
        Ok(())
    }

    pub fn select(&mut self, name: &str) -> Result<(), ProfileError> {
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| ProfileError::ProfileNotFound(name.to_string()))?;
        self.live = profile.clone();
        self.active = name.to_string();
        info!("Selected profile '{}'", name);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<(), ProfileError> {
        if name == DEFAULT_PROFILE {
            return Err(ProfileError::ReservedProfile(name.to_string()));
        }
        if self.profiles.remove(name).is_none() {
            return Err(ProfileError::ProfileNotFound(name.to_string()));
        }
        info!("Deleted profile '{}'", name);

        if self.active == name {
            self.active = DEFAULT_PROFILE.to_string();
            self.live = self.profiles.get(DEFAULT_PROFILE).cloned().unwrap_or_default();
            debug!("Active profile fell back to '{}'", DEFAULT_PROFILE);
        }
        Ok(())
    }

    /// Live configuration of the active profile
    pub fn live(&self) -> &Profile {
        &self.live
    }

    pub fn set_network(&mut self, target: NetworkTarget) {
        debug!("Network target set to {:?}", target);
        self.live.network = target;
    }

    pub fn set_axis(&mut self, index: usize, config: AxisConfig) -> Result<(), ProfileError> {
        config.validate()?;
        debug!("Axis {} set to {:?}", index, config);
        self.live.axes.insert(index, config);
        Ok(())
    }

    pub fn set_button(&mut self, index: usize, id: String) {
        debug!("Button {} mapped to {:?}", index, id);
        self.live.buttons.insert(index, id);
    }

    pub fn set_hat(&mut self, index: usize, id: String) {
        debug!("Hat {} mapped to {:?}", index, id);
        self.live.hats.insert(index, id);
    }

    /// Stores a clamped strength and returns the value actually kept
    pub fn set_ffb(&mut self, kind: EffectKind, percent: f64) -> f64 {
        self.live.ffb.set(kind, percent);
        self.live.ffb.get(kind)
    }

    pub fn ffb(&self) -> FfbStrengths {
        self.live.ffb
    }

    pub fn ensure_indices(&mut self, axes: usize, buttons: usize, hats: usize) {
        self.live.ensure_indices(axes, buttons, hats);
    }

    pub fn reset_mappings(&mut self) {
        self.live.reset_mappings();
        info!("Reset all mappings of profile '{}'", self.active);
    }
}
