//! Placed boxes - text, copy, image and table frames
//!
//! A box references a named element of the template document, carries a
//! position, an optional size and the localization settings. All box kinds
//! embed a [`BoxCore`] and expose it through [`Command::as_box`].

use crate::command::{optional_non_negative, require_string};
use crate::{
    Command, CommandCore, GeneratorSettings, ImageRegistry, ModelError, Paragraph,
    RenderContext, Result, Text,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARAM_NAME: &str = "name";
pub const PARAM_TID: &str = "tid";
pub const PARAM_LAYER: &str = "layer";
pub const PARAM_LEFT: &str = "x";
pub const PARAM_TOP: &str = "y";
pub const PARAM_WIDTH: &str = "w";
pub const PARAM_HEIGHT: &str = "h";
pub const PARAM_RESIZE: &str = "resize";
pub const PARAM_LOCALIZED: &str = "localized";
pub const PARAM_LOCALE: &str = "locale";
pub const PARAM_MASTER_LOCALE: &str = "useMasterLocaleDimension";

// =============================================================================
// Enums
// =============================================================================

/// How InDesign resizes the frame after placing content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resize {
    #[default]
    NoResize,
    WidthHeight,
    Width,
    Height,
}

impl Resize {
    pub fn code(self) -> i64 {
        match self {
            Resize::NoResize => 0,
            Resize::WidthHeight => 1,
            Resize::Width => 2,
            Resize::Height => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Resize::NoResize),
            1 => Some(Resize::WidthHeight),
            2 => Some(Resize::Width),
            3 => Some(Resize::Height),
            _ => None,
        }
    }
}

/// Which master-locale geometry a localized box reuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasterLocaleMode {
    Position,
    Width,
    Height,
    All,
}

impl MasterLocaleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MasterLocaleMode::Position => "position",
            MasterLocaleMode::Width => "width",
            MasterLocaleMode::Height => "height",
            MasterLocaleMode::All => "all",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "position" => Some(MasterLocaleMode::Position),
            "width" => Some(MasterLocaleMode::Width),
            "height" => Some(MasterLocaleMode::Height),
            "all" => Some(MasterLocaleMode::All),
            _ => None,
        }
    }
}

/// Horizontal or vertical placement of a box
#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    /// Absolute coordinate in document units
    Absolute(f64),
    /// Offset from an InDesign variable defined earlier in the run
    Relative { variable: String, margin: f64 },
}

impl Position {
    pub fn relative(variable: impl Into<String>, margin: f64) -> Self {
        Position::Relative {
            variable: variable.into(),
            margin,
        }
    }

    /// Variable this position depends on
    pub fn variable(&self) -> Option<&str> {
        match self {
            Position::Absolute(_) => None,
            Position::Relative { variable, .. } => Some(variable),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Position::Absolute(v) => Value::from(*v),
            Position::Relative { variable, margin } if *margin < 0.0 => {
                Value::String(format!("{}-{}", variable, -margin))
            }
            Position::Relative { variable, margin } => {
                Value::String(format!("{}+{}", variable, margin))
            }
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::Absolute(0.0)
    }
}

impl From<f64> for Position {
    fn from(value: f64) -> Self {
        Position::Absolute(value)
    }
}

fn validate_position(param: &str, value: &Value) -> Result<()> {
    match value {
        Value::Number(_) => Ok(()),
        Value::String(s) if !s.is_empty() => Ok(()),
        other => Err(ModelError::invalid(
            param,
            format!("expected a number or a variable formula, got {}", other),
        )),
    }
}

fn validate_resize(value: &Value) -> Result<()> {
    match value.as_i64().and_then(Resize::from_code) {
        Some(_) => Ok(()),
        None => Err(ModelError::invalid(
            PARAM_RESIZE,
            format!("{} is not a resize mode", value),
        )),
    }
}

fn validate_master_locale(value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::String(s) if MasterLocaleMode::parse(s).is_some() => Ok(()),
        other => Err(ModelError::invalid(
            PARAM_MASTER_LOCALE,
            format!("{} is not one of position, width, height, all", other),
        )),
    }
}

fn optional_string(param: &str, value: &Value) -> Result<()> {
    if value.is_null() {
        Ok(())
    } else {
        require_string(param, value)
    }
}

// =============================================================================
// BoxCore
// =============================================================================

/// Parameters and rules shared by every placed box
#[derive(Debug)]
pub struct BoxCore {
    core: CommandCore,
    left: Position,
    top: Position,
}

impl BoxCore {
    pub fn new(kind: &'static str, element_name: impl Into<String>) -> Self {
        let mut core = CommandCore::new(kind);
        core.define(PARAM_NAME, element_name.into());
        core.define(PARAM_TID, Value::Null);
        core.define(PARAM_LAYER, Value::Null);
        core.define(PARAM_LEFT, 0);
        core.define(PARAM_TOP, 0);
        core.define(PARAM_WIDTH, Value::Null);
        core.define(PARAM_HEIGHT, Value::Null);
        core.define(PARAM_RESIZE, Resize::NoResize.code());
        core.define(PARAM_LOCALIZED, false);
        core.define(PARAM_LOCALE, Value::Null);
        core.define(PARAM_MASTER_LOCALE, Value::Null);

        core.validate_with(PARAM_NAME, |v| require_string(PARAM_NAME, v));
        core.validate_with(PARAM_TID, |v| optional_string(PARAM_TID, v));
        core.validate_with(PARAM_LAYER, |v| optional_string(PARAM_LAYER, v));
        core.validate_with(PARAM_LEFT, |v| validate_position(PARAM_LEFT, v));
        core.validate_with(PARAM_TOP, |v| validate_position(PARAM_TOP, v));
        core.validate_with(PARAM_WIDTH, |v| optional_non_negative(PARAM_WIDTH, v));
        core.validate_with(PARAM_HEIGHT, |v| optional_non_negative(PARAM_HEIGHT, v));
        core.validate_with(PARAM_RESIZE, validate_resize);
        core.validate_with(PARAM_LOCALE, |v| optional_string(PARAM_LOCALE, v));
        core.validate_with(PARAM_MASTER_LOCALE, validate_master_locale);

        Self {
            core,
            left: Position::default(),
            top: Position::default(),
        }
    }

    /// Create a box with the configured defaults of its kind
    pub fn configured(
        kind: &'static str,
        element_name: impl Into<String>,
        settings: &GeneratorSettings,
    ) -> Self {
        let mut base = Self::new(kind, element_name);
        let defaults = settings.box_defaults_for(kind);
        base.core.define(PARAM_LOCALIZED, defaults.localized);
        if let Some(mode) = defaults.use_master_locale_dimension {
            base.core.define(PARAM_MASTER_LOCALE, mode.as_str());
        }
        base
    }

    pub fn core(&self) -> &CommandCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    pub fn element_name(&self) -> Option<&str> {
        self.core.str_param(PARAM_NAME)
    }

    pub fn set_element_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.core.set_param(PARAM_NAME, name.into())
    }

    pub fn box_ident(&self) -> Option<&str> {
        self.core.str_param(PARAM_TID)
    }

    pub fn set_box_ident(&mut self, ident: impl Into<String>) -> Result<()> {
        self.core.set_param(PARAM_TID, ident.into())
    }

    pub fn clear_box_ident(&mut self) {
        self.core.clear_param(PARAM_TID);
    }

    /// Content-keyed ident: `ID-` + active reference + suffix, stable across runs
    pub fn set_box_ident_referenced(&mut self, suffix: &str, ctx: &RenderContext) -> Result<()> {
        let ident = match ctx.box_ident_reference() {
            Some(reference) => format!("ID-{}{}", reference, suffix),
            None => {
                tracing::debug!(suffix, "no box ident reference active");
                format!("ID-{}", suffix)
            }
        };
        self.set_box_ident(ident)
    }

    pub fn set_layer(&mut self, layer: impl Into<String>) -> Result<()> {
        self.core.set_param(PARAM_LAYER, layer.into())
    }

    pub fn set_left(&mut self, left: impl Into<Position>) -> Result<()> {
        let left = left.into();
        self.core.set_param(PARAM_LEFT, left.to_value())?;
        self.left = left;
        Ok(())
    }

    pub fn set_top(&mut self, top: impl Into<Position>) -> Result<()> {
        let top = top.into();
        self.core.set_param(PARAM_TOP, top.to_value())?;
        self.top = top;
        Ok(())
    }

    pub fn set_position(&mut self, left: impl Into<Position>, top: impl Into<Position>) -> Result<()> {
        self.set_left(left)?;
        self.set_top(top)
    }

    pub fn left(&self) -> &Position {
        &self.left
    }

    pub fn top(&self) -> &Position {
        &self.top
    }

    pub fn set_width(&mut self, width: Option<f64>) -> Result<()> {
        self.core.set_param(PARAM_WIDTH, width)
    }

    pub fn set_height(&mut self, height: Option<f64>) -> Result<()> {
        self.core.set_param(PARAM_HEIGHT, height)
    }

    pub fn set_size(&mut self, width: Option<f64>, height: Option<f64>) -> Result<()> {
        self.set_width(width)?;
        self.set_height(height)
    }

    pub fn set_resize(&mut self, resize: Resize) -> Result<()> {
        self.core.set_param(PARAM_RESIZE, resize.code())
    }

    pub fn resize(&self) -> Resize {
        self.core
            .param(PARAM_RESIZE)
            .ok()
            .and_then(Value::as_i64)
            .and_then(Resize::from_code)
            .unwrap_or_default()
    }

    pub fn set_localized(&mut self, localized: bool) -> Result<()> {
        self.core.set_param(PARAM_LOCALIZED, localized)
    }

    pub fn is_localized(&self) -> bool {
        self.core.bool_param(PARAM_LOCALIZED).unwrap_or(false)
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) -> Result<()> {
        self.core.set_param(PARAM_LOCALE, locale.into())
    }

    pub fn locale(&self) -> Option<&str> {
        self.core.str_param(PARAM_LOCALE)
    }

    pub fn set_use_master_locale_dimension(&mut self, mode: &str) -> Result<()> {
        self.core.set_param(PARAM_MASTER_LOCALE, mode)
    }

    pub fn use_master_locale_dimension(&self) -> Option<MasterLocaleMode> {
        self.core
            .str_param(PARAM_MASTER_LOCALE)
            .and_then(MasterLocaleMode::parse)
    }

    /// Variables referenced by relative positions
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps: Vec<String> = [self.left.variable(), self.top.variable()]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        deps.dedup();
        deps
    }

    /// Requires an element name, then applies the auto-resize policy
    pub fn validate(&mut self) -> Result<()> {
        let named = self
            .element_name()
            .is_some_and(|name| !name.trim().is_empty());
        if !named {
            return Err(ModelError::MissingParameter {
                command: self.core.kind().to_string(),
                param: PARAM_NAME.to_string(),
            });
        }

        let sized = self.core.has_value(PARAM_WIDTH) || self.core.has_value(PARAM_HEIGHT);
        if self.resize() == Resize::NoResize && sized {
            self.set_resize(Resize::WidthHeight)?;
        }
        Ok(())
    }
}

// =============================================================================
// CopyBox
// =============================================================================

/// Copies a template element onto the page as-is
#[derive(Debug)]
pub struct CopyBox {
    base: BoxCore,
}

impl CopyBox {
    pub const KIND: &'static str = "cbox";

    pub fn new(element_name: impl Into<String>) -> Self {
        Self {
            base: BoxCore::new(Self::KIND, element_name),
        }
    }

    pub fn configured(element_name: impl Into<String>, settings: &GeneratorSettings) -> Self {
        Self {
            base: BoxCore::configured(Self::KIND, element_name, settings),
        }
    }

    pub fn base(&self) -> &BoxCore {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut BoxCore {
        &mut self.base
    }
}

impl Command for CopyBox {
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
}

// =============================================================================
// TextBox
// =============================================================================

/// Text frame filled with styled paragraphs
#[derive(Debug)]
pub struct TextBox {
    base: BoxCore,
    text: Text,
    images: ImageRegistry,
}

impl TextBox {
    pub const KIND: &'static str = "tbox";

    pub fn new(element_name: impl Into<String>) -> Self {
        Self::from_base(BoxCore::new(Self::KIND, element_name))
    }

    pub fn configured(element_name: impl Into<String>, settings: &GeneratorSettings) -> Self {
        Self::from_base(BoxCore::configured(Self::KIND, element_name, settings))
    }

    fn from_base(mut base: BoxCore) -> Self {
        base.core_mut().define("values", Value::Null);
        Self {
            base,
            text: Text::new(),
            images: ImageRegistry::new(),
        }
    }

    pub fn base(&self) -> &BoxCore {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut BoxCore {
        &mut self.base
    }

    pub fn text(&self) -> &Text {
        &self.text
    }

    /// Append plain text; blank lines start new paragraphs
    pub fn add_string(&mut self, value: &str) -> &mut Self {
        self.text.append(Text::from_plain(value));
        self
    }

    pub fn add_paragraph(&mut self, paragraph: Paragraph) -> &mut Self {
        self.images.extend(paragraph.images());
        self.text.add_paragraph(paragraph);
        self
    }

    pub fn add_text(&mut self, text: Text) -> &mut Self {
        self.images.extend(text.images());
        self.text.append(text);
        self
    }
}

impl Command for TextBox {
    fn core(&self) -> &CommandCore {
        self.base.core()
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        self.base.core_mut()
    }

    fn assemble(&mut self, ctx: &mut RenderContext) -> Result<()> {
        let values = self.text.build(ctx)?;
        self.base.core_mut().set_param("values", values)
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
        self.text.missing_assets()
    }
}
