//! Image frames and asset bookkeeping
//!
//! Asset-backed images resolve their download URL through an [`AssetProvider`]
//! and remember every asset they use, so the queue can hand the plugin a list
//! of files to fetch. Unresolvable assets are soft failures.

use crate::boxes::BoxCore;
use crate::{Command, CommandCore, GeneratorSettings, ModelError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata of an asset the plugin has to download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl AssetInfo {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            mtime: None,
            file_size: None,
        }
    }

    pub fn with_mtime(mut self, mtime: i64) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }
}

/// Assets keyed by asset id
pub type ImageRegistry = BTreeMap<String, AssetInfo>;

/// Resolves logical asset references to downloadable files
pub trait AssetProvider {
    fn resolve(&self, asset_id: &str) -> Option<AssetInfo>;
}

impl AssetProvider for ImageRegistry {
    fn resolve(&self, asset_id: &str) -> Option<AssetInfo> {
        self.get(asset_id).cloned()
    }
}

/// How content is fitted into an image frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fit {
    None,
    Proportionally,
    FillProportionally,
    FrameToContent,
    ContentToFrame,
    CenterContent,
}

impl Fit {
    pub fn as_str(self) -> &'static str {
        match self {
            Fit::None => "none",
            Fit::Proportionally => "proportionally",
            Fit::FillProportionally => "fillproportionally",
            Fit::FrameToContent => "frametocontent",
            Fit::ContentToFrame => "contenttoframe",
            Fit::CenterContent => "centercontent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            Fit::None,
            Fit::Proportionally,
            Fit::FillProportionally,
            Fit::FrameToContent,
            Fit::ContentToFrame,
            Fit::CenterContent,
        ]
        .into_iter()
        .find(|fit| fit.as_str() == value)
    }
}

fn validate_fit(value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::String(s) if Fit::parse(s).is_some() => Ok(()),
        other => Err(ModelError::invalid("fit", format!("{} is not a fit mode", other))),
    }
}

fn image_base(base: &mut BoxCore) {
    let core = base.core_mut();
    core.define("src", Value::Null);
    core.define("fit", Value::Null);
    core.validate_with("fit", validate_fit);
}

// =============================================================================
// ImageBox
// =============================================================================

/// Image frame filled from a managed asset
#[derive(Debug)]
pub struct ImageBox {
    base: BoxCore,
    images: ImageRegistry,
    missing: Vec<String>,
}

impl ImageBox {
    pub const KIND: &'static str = "pbox";

    pub fn new(element_name: impl Into<String>) -> Self {
        Self::from_base(BoxCore::new(Self::KIND, element_name))
    }

    pub fn configured(element_name: impl Into<String>, settings: &GeneratorSettings) -> Self {
        Self::from_base(BoxCore::configured(Self::KIND, element_name, settings))
    }

    fn from_base(mut base: BoxCore) -> Self {
        image_base(&mut base);
        let core = base.core_mut();
        core.define("assetId", Value::Null);
        core.define("mtime", Value::Null);
        core.define("filesize", Value::Null);
        core.define("download", Value::Null);
        Self {
            base,
            images: ImageRegistry::new(),
            missing: Vec::new(),
        }
    }

    pub fn base(&self) -> &BoxCore {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut BoxCore {
        &mut self.base
    }

    /// Point the frame at an asset. Returns false and records the asset as
    /// missing when the provider cannot resolve it.
    pub fn set_asset(&mut self, asset_id: &str, provider: &dyn AssetProvider) -> Result<bool> {
        let core = self.base.core_mut();
        core.set_param("assetId", asset_id)?;
        match provider.resolve(asset_id) {
            Some(asset) => {
                core.set_param("src", asset.url.clone())?;
                core.set_param("mtime", asset.mtime)?;
                core.set_param("filesize", asset.file_size)?;
                core.set_param("download", true)?;
                self.images.insert(asset.id.clone(), asset);
                Ok(true)
            }
            None => {
                tracing::warn!(asset_id, "asset could not be resolved");
                core.set_param("src", Value::Null)?;
                self.missing.push(asset_id.to_string());
                Ok(false)
            }
        }
    }

    /// Point the frame at a URL outside the asset store
    pub fn set_source(&mut self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(ModelError::invalid("src", "image source must not be empty"));
        }
        let core = self.base.core_mut();
        core.clear_param("assetId");
        core.set_param("src", url)?;
        core.set_param("download", true)
    }

    pub fn set_fit(&mut self, fit: Fit) -> Result<()> {
        self.base.core_mut().set_param("fit", fit.as_str())
    }

    pub fn fit(&self) -> Option<Fit> {
        self.base.core().str_param("fit").and_then(Fit::parse)
    }

    pub fn images(&self) -> &ImageRegistry {
        &self.images
    }
}

impl Command for ImageBox {
    fn core(&self) -> &CommandCore {
        self.base.core()
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        self.base.core_mut()
    }

    fn validate(&mut self) -> Result<()> {
        self.base.validate()
    }

    fn as_box(&self) -> Option<&BoxCore> {
        Some(&self.base)
    }

    fn as_box_mut(&mut self) -> Option<&mut BoxCore> {
        Some(&mut self.base)
    }

    fn dependencies(&self) -> Vec<String> {
        self.base.dependencies()
    }

    fn collected_images(&self) -> Option<&ImageRegistry> {
        Some(&self.images)
    }

    fn missing_assets(&self) -> Vec<String> {
        self.missing.clone()
    }
}

// =============================================================================
// FileBox
// =============================================================================

/// Image frame filled from a path the plugin can reach directly
#[derive(Debug)]
pub struct FileBox {
    base: BoxCore,
}

impl FileBox {
    pub const KIND: &'static str = "pbox";

    pub fn new(element_name: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        Self::from_base(BoxCore::new(Self::KIND, element_name), path)
    }

    pub fn configured(
        element_name: impl Into<String>,
        path: impl Into<String>,
        settings: &GeneratorSettings,
    ) -> Result<Self> {
        Self::from_base(BoxCore::configured(Self::KIND, element_name, settings), path)
    }

    fn from_base(mut base: BoxCore, path: impl Into<String>) -> Result<Self> {
        image_base(&mut base);
        base.core_mut().set_param("src", path.into())?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &BoxCore {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut BoxCore {
        &mut self.base
    }

    pub fn set_fit(&mut self, fit: Fit) -> Result<()> {
        self.base.core_mut().set_param("fit", fit.as_str())
    }

    pub fn path(&self) -> Option<&str> {
        self.base.core().str_param("src")
    }
}

impl Command for FileBox {
    fn core(&self) -> &CommandCore {
        self.base.core()
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        self.base.core_mut()
    }

    fn validate(&mut self) -> Result<()> {
        if !self.base.core().has_value("src") {
            return Err(ModelError::MissingParameter {
                command: Self::KIND.to_string(),
                param: "src".to_string(),
            });
        }
        self.base.validate()
    }

    fn as_box(&self) -> Option<&BoxCore> {
        Some(&self.base)
    }

    fn as_box_mut(&mut self) -> Option<&mut BoxCore> {
        Some(&mut self.base)
    }

    fn dependencies(&self) -> Vec<String> {
        self.base.dependencies()
    }
}
