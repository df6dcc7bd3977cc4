//! Generator settings
//!
//! Settings are loaded once per render and handed to the render context.
//! Box defaults replace per-kind global flags: every box constructed through
//! a `configured` constructor picks up the defaults for its kind here.

use crate::{MasterLocaleMode, ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Defaults applied to a box kind at construction time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoxDefaults {
    /// Whether new boxes are localized
    pub localized: bool,
    /// How localized boxes reuse master locale geometry
    pub use_master_locale_dimension: Option<MasterLocaleMode>,
}

/// Settings for a single generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorSettings {
    /// Prefix of generated box identifiers
    pub box_ident_prefix: String,
    /// Defaults for box kinds without their own entry
    pub default_box: BoxDefaults,
    /// Per-kind box defaults, keyed by wire kind (`tbox`, `pbox`, ...)
    pub box_defaults: BTreeMap<String, BoxDefaults>,
    /// Locale of the active project
    pub locale: Option<String>,
    /// Whether the project renders per-locale variants
    pub locale_aware: bool,
    /// Emit a page message when a box ident is used twice
    pub report_duplicate_idents: bool,
    /// Element name for images created by the HTML importer
    pub inline_image_element: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            box_ident_prefix: "Q".to_string(),
            default_box: BoxDefaults::default(),
            box_defaults: BTreeMap::new(),
            locale: None,
            locale_aware: false,
            report_duplicate_idents: true,
            inline_image_element: "image".to_string(),
        }
    }
}

impl GeneratorSettings {
    /// Parse settings from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: GeneratorSettings = serde_json::from_str(json)?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from a file, falling back to defaults if the file is
    /// missing or cannot be parsed
    pub fn load_sync(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match Self::from_json_str(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!("Failed to parse generator settings, using defaults: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Defaults for the given box kind
    pub fn box_defaults_for(&self, kind: &str) -> &BoxDefaults {
        self.box_defaults.get(kind).unwrap_or(&self.default_box)
    }

    /// Set the defaults of one box kind
    pub fn set_box_defaults(&mut self, kind: impl Into<String>, defaults: BoxDefaults) {
        self.box_defaults.insert(kind.into(), defaults);
    }

    fn check(&self) -> Result<()> {
        if self.box_ident_prefix.is_empty() {
            return Err(ModelError::Settings("boxIdentPrefix must not be empty".into()));
        }
        if self.locale_aware && self.locale.is_none() {
            return Err(ModelError::Settings("localeAware requires a locale".into()));
        }
        Ok(())
    }
}
