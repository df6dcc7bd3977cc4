//! Layout breaks, groups and table splitting
//!
//! A layout break tells the plugin to start a new page or column when the
//! following content would not fit. Groups and table splits accept one kind
//! of break, never both.

use crate::command::optional_non_negative;
use crate::{Command, CommandCore, ComponentSlot, ModelError, Result};
use serde_json::Value;

const NEW_PAGE_SLOT: ComponentSlot = ComponentSlot::single("checknewpage");
const NEW_COLUMN_SLOT: ComponentSlot = ComponentSlot::single("checknewcolumn");

fn ensure_single_break(core: &CommandCore, owner: &str) -> Result<()> {
    if core.has_component(NEW_PAGE_SLOT.ident) && core.has_component(NEW_COLUMN_SLOT.ident) {
        return Err(ModelError::LayoutBreakConflict(owner.to_string()));
    }
    Ok(())
}

fn break_core(kind: &'static str, height: Option<f64>) -> Result<CommandCore> {
    let mut core = CommandCore::new(kind);
    core.define("height", Value::Null);
    core.validate_with("height", |v| optional_non_negative("height", v));
    core.set_param("height", height)?;
    Ok(core)
}

/// Start a new page if less than `height` remains on the current one
#[derive(Debug)]
pub struct CheckNewPage {
    core: CommandCore,
}

impl CheckNewPage {
    pub const KIND: &'static str = "checknewpage";

    pub fn new(height: Option<f64>) -> Result<Self> {
        let mut core = break_core(Self::KIND, height)?;
        core.define("master", Value::Null);
        Ok(Self { core })
    }

    /// Master spread for the page created by the break
    pub fn with_master(mut self, master: impl Into<String>) -> Result<Self> {
        self.core.set_param("master", master.into())?;
        Ok(self)
    }
}

impl Command for CheckNewPage {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn component_slot(&self) -> Option<ComponentSlot> {
        Some(NEW_PAGE_SLOT)
    }
}

/// Continue in the next column if less than `height` remains in this one
#[derive(Debug)]
pub struct CheckNewColumn {
    core: CommandCore,
}

impl CheckNewColumn {
    pub const KIND: &'static str = "checkNewColumn";

    pub fn new(height: Option<f64>) -> Result<Self> {
        Ok(Self {
            core: break_core(Self::KIND, height)?,
        })
    }
}

impl Command for CheckNewColumn {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn component_slot(&self) -> Option<ComponentSlot> {
        Some(NEW_COLUMN_SLOT)
    }
}

/// Opens a group of boxes that the plugin keeps together
#[derive(Debug)]
pub struct GroupStart {
    core: CommandCore,
}

impl GroupStart {
    pub const KIND: &'static str = "groupstart";

    pub fn new(name: impl Into<String>) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("name", name.into());
        Self { core }
    }

    pub fn set_check_new_page(&mut self, check: CheckNewPage) -> Result<()> {
        self.core.add_component(Box::new(check))
    }

    pub fn set_check_new_column(&mut self, check: CheckNewColumn) -> Result<()> {
        self.core.add_component(Box::new(check))
    }
}

impl Command for GroupStart {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn validate(&mut self) -> Result<()> {
        ensure_single_break(&self.core, Self::KIND)
    }
}

/// Closes the innermost open group
#[derive(Debug)]
pub struct GroupEnd {
    core: CommandCore,
}

impl GroupEnd {
    pub const KIND: &'static str = "groupend";

    pub fn new() -> Self {
        Self {
            core: CommandCore::new(Self::KIND),
        }
    }
}

impl Default for GroupEnd {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for GroupEnd {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }
}

/// Split a placed table into frames of at most `maxHeight`
#[derive(Debug)]
pub struct SplitTable {
    core: CommandCore,
}

impl SplitTable {
    pub const KIND: &'static str = "splittable";

    pub fn new(table_ident: impl Into<String>, max_height: Option<f64>) -> Result<Self> {
        let mut core = CommandCore::new(Self::KIND);
        core.define("table", table_ident.into());
        core.define("maxHeight", Value::Null);
        core.validate_with("maxHeight", |v| optional_non_negative("maxHeight", v));
        core.set_param("maxHeight", max_height)?;
        Ok(Self { core })
    }

    pub fn set_check_new_page(&mut self, check: CheckNewPage) -> Result<()> {
        self.core.add_component(Box::new(check))
    }

    pub fn set_check_new_column(&mut self, check: CheckNewColumn) -> Result<()> {
        self.core.add_component(Box::new(check))
    }
}

impl Command for SplitTable {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn validate(&mut self) -> Result<()> {
        if self.core.str_param("table").map_or(true, str::is_empty) {
            return Err(ModelError::MissingParameter {
                command: Self::KIND.to_string(),
                param: "table".to_string(),
            });
        }
        ensure_single_break(&self.core, Self::KIND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderContext;
    use serde_json::json;

    #[test]
    fn test_group_with_page_break() {
        let mut group = GroupStart::new("product");
        group
            .set_check_new_page(CheckNewPage::new(Some(80.0)).unwrap().with_master("B-Master").unwrap())
            .unwrap();
        let mut ctx = RenderContext::default();
        assert_eq!(
            group.build_command(&mut ctx, true).unwrap(),
            json!({
                "cmd": "groupstart",
                "name": "product",
                "checknewpage": {"cmd": "checknewpage", "height": 80.0, "master": "B-Master"}
            })
        );
    }

    #[test]
    fn test_group_break_conflict() {
        let mut group = GroupStart::new("product");
        group.set_check_new_page(CheckNewPage::new(None).unwrap()).unwrap();
        group.set_check_new_column(CheckNewColumn::new(None).unwrap()).unwrap();
        let mut ctx = RenderContext::default();
        assert!(matches!(
            group.build_command(&mut ctx, true),
            Err(ModelError::LayoutBreakConflict(owner)) if owner == "groupstart"
        ));
    }

    #[test]
    fn test_split_table() {
        let mut split = SplitTable::new("Q-1-table-1", Some(120.0)).unwrap();
        split.set_check_new_column(CheckNewColumn::new(Some(20.0)).unwrap()).unwrap();
        let mut ctx = RenderContext::default();
        let out = split.build_command(&mut ctx, true).unwrap();
        assert_eq!(out["cmd"], "splittable");
        assert_eq!(out["checknewcolumn"]["cmd"], "checkNewColumn");

        split.set_check_new_page(CheckNewPage::new(None).unwrap()).unwrap();
        assert!(split.build_command(&mut ctx, true).is_err());
        assert!(SplitTable::new("t", Some(-1.0)).is_err());
    }

    #[test]
    fn test_group_end() {
        let mut ctx = RenderContext::default();
        assert_eq!(
            GroupEnd::new().build_command(&mut ctx, true).unwrap(),
            json!({"cmd": "groupend"})
        );
    }
}
