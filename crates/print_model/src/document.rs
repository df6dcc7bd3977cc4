//! Document properties - page size, margins, bleed and columns
//!
//! All lengths are millimetres. Values outside the ranges InDesign accepts
//! are rejected when they are set.

use crate::{Command, CommandCore, ModelError, Result};
use serde_json::{json, Value};

/// Smallest page edge InDesign accepts (1pt)
pub const MIN_DIMENSION: f64 = 0.353;
/// Largest page edge InDesign accepts (216in)
pub const MAX_DIMENSION: f64 = 5486.4;
pub const MIN_MARGIN: f64 = 0.0;
pub const MAX_MARGIN: f64 = 5486.4;
pub const MIN_BLEED: f64 = 0.0;
/// Largest bleed InDesign accepts (6in)
pub const MAX_BLEED: f64 = 152.4;

fn check_range(param: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value < min || value > max || value.is_nan() {
        return Err(ModelError::invalid(
            param,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(())
}

/// Page margins; `inside`/`outside` become left/right without facing pages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub inside: f64,
    pub outside: f64,
}

impl Margins {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            bottom: value,
            inside: value,
            outside: value,
        }
    }
}

/// Sets up the document geometry (`documentProperties`)
#[derive(Debug)]
pub struct DocumentSetup {
    core: CommandCore,
}

impl DocumentSetup {
    pub const KIND: &'static str = "documentProperties";

    pub fn new() -> Self {
        let mut core = CommandCore::new(Self::KIND);
        for param in ["width", "height", "margins", "bleed", "facingPages", "columns", "gutter"] {
            core.define(param, Value::Null);
        }
        Self { core }
    }

    pub fn set_page_dimensions(&mut self, width: f64, height: f64) -> Result<()> {
        check_range("width", width, MIN_DIMENSION, MAX_DIMENSION)?;
        check_range("height", height, MIN_DIMENSION, MAX_DIMENSION)?;
        self.core.set_param("width", width)?;
        self.core.set_param("height", height)
    }

    pub fn set_margins(&mut self, margins: Margins) -> Result<()> {
        check_range("margins.top", margins.top, MIN_MARGIN, MAX_MARGIN)?;
        check_range("margins.bottom", margins.bottom, MIN_MARGIN, MAX_MARGIN)?;
        check_range("margins.inside", margins.inside, MIN_MARGIN, MAX_MARGIN)?;
        check_range("margins.outside", margins.outside, MIN_MARGIN, MAX_MARGIN)?;
        self.core.set_param(
            "margins",
            json!({
                "top": margins.top,
                "bottom": margins.bottom,
                "inside": margins.inside,
                "outside": margins.outside,
            }),
        )
    }

    pub fn set_bleed(&mut self, bleed: f64) -> Result<()> {
        check_range("bleed", bleed, MIN_BLEED, MAX_BLEED)?;
        self.core.set_param("bleed", bleed)
    }

    pub fn set_facing_pages(&mut self, facing: bool) -> Result<()> {
        self.core.set_param("facingPages", facing)
    }

    pub fn set_columns(&mut self, count: u32, gutter: f64) -> Result<()> {
        if count == 0 {
            return Err(ModelError::invalid("columns", "at least one column is required"));
        }
        check_range("gutter", gutter, MIN_MARGIN, MAX_MARGIN)?;
        self.core.set_param("columns", count)?;
        self.core.set_param("gutter", gutter)
    }
}

impl Default for DocumentSetup {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for DocumentSetup {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }
}

/// Copies the document geometry from a template file
#[derive(Debug)]
pub struct DocumentSetupFromTemplate {
    core: CommandCore,
}

impl DocumentSetupFromTemplate {
    pub const KIND: &'static str = "documentPropertiesFromTemplate";

    pub fn new(template: impl Into<String>) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("template", template.into());
        Self { core }
    }
}

impl Command for DocumentSetupFromTemplate {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn validate(&mut self) -> Result<()> {
        if self.core.str_param("template").map_or(true, str::is_empty) {
            return Err(ModelError::MissingParameter {
                command: Self::KIND.to_string(),
                param: "template".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderContext;

    #[test]
    fn test_bleed_bounds() {
        let mut setup = DocumentSetup::new();
        assert!(setup.set_bleed(200.0).is_err());
        assert!(setup.set_bleed(-0.1).is_err());
        assert!(setup.set_bleed(152.4).is_ok());
        assert!(setup.set_bleed(3.0).is_ok());
    }

    #[test]
    fn test_dimension_bounds() {
        let mut setup = DocumentSetup::new();
        assert!(setup.set_page_dimensions(0.1, 100.0).is_err());
        assert!(setup.set_page_dimensions(210.0, 6000.0).is_err());
        assert!(setup.set_page_dimensions(210.0, 297.0).is_ok());
    }

    #[test]
    fn test_margin_bounds() {
        let mut setup = DocumentSetup::new();
        let mut margins = Margins::uniform(12.7);
        assert!(setup.set_margins(margins).is_ok());
        margins.outside = -1.0;
        assert!(setup.set_margins(margins).is_err());
    }

    #[test]
    fn test_serialized_setup() {
        let mut setup = DocumentSetup::new();
        setup.set_page_dimensions(210.0, 297.0).unwrap();
        setup.set_margins(Margins::uniform(10.0)).unwrap();
        setup.set_facing_pages(true).unwrap();
        setup.set_columns(2, 4.0).unwrap();
        assert!(setup.set_columns(0, 4.0).is_err());

        let mut ctx = RenderContext::default();
        let out = setup.build_command(&mut ctx, true).unwrap();
        assert_eq!(out["cmd"], "documentProperties");
        assert_eq!(out["margins"]["inside"], json!(10.0));
        assert_eq!(out["columns"], json!(2));
        assert!(out.get("bleed").is_none());
    }

    #[test]
    fn test_from_template() {
        let mut ctx = RenderContext::default();
        let mut setup = DocumentSetupFromTemplate::new("/templates/catalog.indd");
        assert_eq!(
            setup.build_command(&mut ctx, true).unwrap(),
            json!({"cmd": "documentPropertiesFromTemplate", "template": "/templates/catalog.indd"})
        );
        assert!(DocumentSetupFromTemplate::new("").build_command(&mut ctx, true).is_err());
    }
}
