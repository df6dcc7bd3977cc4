//! Document navigation and utility commands

use crate::command::{require_number, require_string};
use crate::{Command, CommandCore, ImageRegistry, ModelError, RenderContext, Result};
use serde_json::{json, Value};

fn missing(command: &str, param: &str) -> ModelError {
    ModelError::MissingParameter {
        command: command.to_string(),
        param: param.to_string(),
    }
}

// =============================================================================
// OpenDocument
// =============================================================================

/// Which document the plugin should work on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The document currently open in InDesign
    UseCurrent,
    /// A copy of a template document
    Template,
    /// A new, empty document
    New,
}

impl OpenMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::UseCurrent => "usecurrent",
            OpenMode::Template => "template",
            OpenMode::New => "new",
        }
    }
}

#[derive(Debug)]
pub struct OpenDocument {
    core: CommandCore,
}

impl OpenDocument {
    pub const KIND: &'static str = "opendoc";

    pub fn new(mode: OpenMode, path: impl Into<String>, file: impl Into<String>) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("type", mode.as_str());
        core.define("path", path.into());
        core.define("file", file.into());
        Self { core }
    }

    pub fn use_current() -> Self {
        let mut open = Self::new(OpenMode::UseCurrent, "", "");
        open.core.clear_param("path");
        open.core.clear_param("file");
        open
    }

    pub fn template(path: impl Into<String>, file: impl Into<String>) -> Self {
        Self::new(OpenMode::Template, path, file)
    }
}

impl Command for OpenDocument {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn validate(&mut self) -> Result<()> {
        let is_template = self.core.str_param("type") == Some(OpenMode::Template.as_str());
        let has_file = self.core.str_param("file").is_some_and(|f| !f.is_empty());
        if is_template && !has_file {
            return Err(missing(Self::KIND, "file"));
        }
        Ok(())
    }
}

// =============================================================================
// Page navigation
// =============================================================================

fn validate_page(value: &Value) -> Result<()> {
    match value.as_u64() {
        Some(page) if page >= 1 => Ok(()),
        _ => Err(ModelError::invalid("page", format!("{} is not a page number", value))),
    }
}

/// Jump to an absolute page; moves the render's page cursor
#[derive(Debug)]
pub struct GoToPage {
    core: CommandCore,
}

impl GoToPage {
    pub const KIND: &'static str = "gotopage";

    pub fn new(page: u32) -> Result<Self> {
        let mut core = CommandCore::new(Self::KIND);
        core.define("page", Value::Null);
        core.define("master", Value::Null);
        core.validate_with("page", validate_page);
        core.set_param("page", page)?;
        Ok(Self { core })
    }

    /// Master spread applied when the page has to be created
    pub fn with_master(mut self, master: impl Into<String>) -> Result<Self> {
        self.core.set_param("master", master.into())?;
        Ok(self)
    }

    pub fn page(&self) -> u32 {
        self.core
            .param("page")
            .ok()
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or(0)
    }
}

impl Command for GoToPage {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn assemble(&mut self, ctx: &mut RenderContext) -> Result<()> {
        ctx.set_page_number(self.page());
        Ok(())
    }
}

/// Continue on the next page; advances the render's page cursor
#[derive(Debug)]
pub struct NextPage {
    core: CommandCore,
}

impl NextPage {
    pub const KIND: &'static str = "nextpage";

    pub fn new() -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("master", Value::Null);
        Self { core }
    }

    pub fn with_master(mut self, master: impl Into<String>) -> Result<Self> {
        self.core.set_param("master", master.into())?;
        Ok(self)
    }
}

impl Default for NextPage {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for NextPage {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn assemble(&mut self, ctx: &mut RenderContext) -> Result<()> {
        ctx.increment_page_number();
        Ok(())
    }
}

// =============================================================================
// Layers
// =============================================================================

/// Make a layer the target of following placements
#[derive(Debug)]
pub struct SetLayer {
    core: CommandCore,
}

impl SetLayer {
    pub const KIND: &'static str = "setlayer";

    pub fn new(name: impl Into<String>) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("name", name.into());
        core.define("visible", Value::Null);
        core.define("locked", Value::Null);
        Self { core }
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.core.set_param("visible", visible)
    }

    pub fn set_locked(&mut self, locked: bool) -> Result<()> {
        self.core.set_param("locked", locked)
    }
}

impl Command for SetLayer {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn validate(&mut self) -> Result<()> {
        if self.core.str_param("name").map_or(true, str::is_empty) {
            return Err(missing(Self::KIND, "name"));
        }
        Ok(())
    }
}

/// Reorder layers, topmost first
#[derive(Debug)]
pub struct SortLayers {
    core: CommandCore,
}

impl SortLayers {
    pub const KIND: &'static str = "sortLayers";

    pub fn new(layers: &[&str]) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("layers", json!(layers));
        Self { core }
    }
}

impl Command for SortLayers {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn validate(&mut self) -> Result<()> {
        let empty = self
            .core
            .param("layers")?
            .as_array()
            .map_or(true, Vec::is_empty);
        if empty {
            return Err(missing(Self::KIND, "layers"));
        }
        Ok(())
    }
}

// =============================================================================
// Scripts and messages
// =============================================================================

/// Run an ExtendScript snippet inside InDesign
#[derive(Debug)]
pub struct ExecuteScript {
    core: CommandCore,
}

impl ExecuteScript {
    pub const KIND: &'static str = "eval";

    pub fn new(script: impl Into<String>) -> Result<Self> {
        let mut core = CommandCore::new(Self::KIND);
        core.define("script", Value::Null);
        core.validate_with("script", |v| require_string("script", v));
        core.set_param("script", script.into())?;
        Ok(Self { core })
    }
}

impl Command for ExecuteScript {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }
}

/// Diagnostic text placed on the current page
#[derive(Debug)]
pub struct PageMessage {
    core: CommandCore,
}

impl PageMessage {
    pub const KIND: &'static str = "pagemessage";

    pub fn new(message: impl Into<String>) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("message", message.into());
        core.define("page", Value::Null);
        core.validate_with("page", |v| {
            if v.is_null() {
                Ok(())
            } else {
                require_number("page", v)
            }
        });
        Self { core }
    }

    pub fn on_page(mut self, page: u32) -> Result<Self> {
        self.core.set_param("page", page)?;
        Ok(self)
    }
}

impl Command for PageMessage {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }
}

/// Tells the plugin which placed elements an update run regenerates
#[derive(Debug)]
pub struct UpdateElements {
    core: CommandCore,
}

impl UpdateElements {
    pub const KIND: &'static str = "updateitems";

    pub fn new(items: &[String]) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("items", json!(items));
        Self { core }
    }
}

impl Command for UpdateElements {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }
}

// =============================================================================
// AutoPageCommands
// =============================================================================

/// Commands the plugin replays on every page it creates automatically
/// (for example when a text frame overflows)
#[derive(Debug)]
pub struct AutoPageCommands {
    core: CommandCore,
    commands: Vec<Box<dyn Command>>,
    images: ImageRegistry,
}

impl AutoPageCommands {
    pub const KIND: &'static str = "autopagecmds";

    pub fn new() -> Self {
        Self {
            core: CommandCore::new(Self::KIND),
            commands: Vec::new(),
            images: ImageRegistry::new(),
        }
    }

    pub fn add(&mut self, command: Box<dyn Command>) -> &mut Self {
        if let Some(images) = command.collected_images() {
            self.images.extend(images.clone());
        }
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for AutoPageCommands {
    fn default() -> Self {
        Self::new()
    }
}

/// Generated idents are dropped again after the build, so every build of
/// the same commands yields the same idents
fn build_auto_command(command: &mut dyn Command, ctx: &mut RenderContext) -> Result<Value> {
    let generated = command.as_box().is_some_and(|b| b.box_ident().is_none());
    let built = ctx.ensure_box_ident(&mut *command, &["auto"]).and_then(|_| {
        ctx.ensure_unique_box_ident(&*command);
        command.build_command(ctx, true)
    });
    if generated {
        if let Some(placed) = command.as_box_mut() {
            placed.clear_box_ident();
        }
    }
    built
}

impl Command for AutoPageCommands {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    /// Serializes to nothing when no commands were registered
    fn build_command(&mut self, ctx: &mut RenderContext, include_kind: bool) -> Result<Value> {
        if self.commands.is_empty() {
            return Ok(Value::Null);
        }
        let mut built = Vec::with_capacity(self.commands.len());
        for command in &mut self.commands {
            built.push(build_auto_command(command.as_mut(), ctx)?);
        }
        let mut out = self.core.serialize_params(include_kind);
        out.insert("commands".into(), Value::Array(built));
        Ok(Value::Object(out))
    }

    fn nested_commands(&self) -> Vec<&dyn Command> {
        self.commands.iter().map(|c| c.as_ref()).collect()
    }

    fn collected_images(&self) -> Option<&ImageRegistry> {
        Some(&self.images)
    }

    fn missing_assets(&self) -> Vec<String> {
        self.commands.iter().flat_map(|c| c.missing_assets()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CopyBox;

    fn build(command: &mut dyn Command, ctx: &mut RenderContext) -> Result<Value> {
        command.build_command(ctx, true)
    }

    #[test]
    fn test_open_document_modes() {
        let mut ctx = RenderContext::default();
        assert_eq!(
            build(&mut OpenDocument::use_current(), &mut ctx).unwrap(),
            json!({"cmd": "opendoc", "type": "usecurrent"})
        );
        assert_eq!(
            build(&mut OpenDocument::template("", "file.indd"), &mut ctx).unwrap(),
            json!({"cmd": "opendoc", "type": "template", "path": "", "file": "file.indd"})
        );
        assert!(build(&mut OpenDocument::template("/tpl", ""), &mut ctx).is_err());
    }

    #[test]
    fn test_page_navigation_moves_cursor() {
        let mut ctx = RenderContext::default();
        let out = build(&mut GoToPage::new(3).unwrap(), &mut ctx).unwrap();
        assert_eq!(out, json!({"cmd": "gotopage", "page": 3}));
        assert_eq!(ctx.page_number(), 3);

        build(&mut NextPage::new(), &mut ctx).unwrap();
        assert_eq!(ctx.page_number(), 4);
        assert!(GoToPage::new(0).is_err());
    }

    #[test]
    fn test_sort_layers_requires_layers() {
        let mut ctx = RenderContext::default();
        assert!(build(&mut SortLayers::new(&[]), &mut ctx).is_err());
        assert_eq!(
            build(&mut SortLayers::new(&["Text", "Images"]), &mut ctx).unwrap(),
            json!({"cmd": "sortLayers", "layers": ["Text", "Images"]})
        );
    }

    #[test]
    fn test_set_layer() {
        let mut ctx = RenderContext::default();
        let mut layer = SetLayer::new("Prices");
        layer.set_locked(true).unwrap();
        assert_eq!(
            build(&mut layer, &mut ctx).unwrap(),
            json!({"cmd": "setlayer", "name": "Prices", "locked": true})
        );
        assert!(build(&mut SetLayer::new(""), &mut ctx).is_err());
    }

    #[test]
    fn test_auto_page_commands() {
        let mut ctx = RenderContext::default();
        let mut auto = AutoPageCommands::new();
        assert!(build(&mut auto, &mut ctx).unwrap().is_null());

        auto.add(Box::new(CopyBox::new("pageNumber")));
        let out = build(&mut auto, &mut ctx).unwrap();
        assert_eq!(out["cmd"], "autopagecmds");
        assert_eq!(out["commands"][0]["tid"], "Q-0-cbox_auto-1");
    }

    #[test]
    fn test_auto_page_children_checked_and_walked() {
        let mut auto = AutoPageCommands::new();
        for _ in 0..2 {
            let mut folio = CopyBox::new("folio");
            folio.base_mut().set_box_ident("ID-folio").unwrap();
            folio
                .base_mut()
                .core_mut()
                .add_component(Box::new(crate::Variable::from_position("folioTop", "top").unwrap()))
                .unwrap();
            auto.add(Box::new(folio));
        }
        auto.add(Box::new(CopyBox::new("pageNumber")));

        let mut ctx = RenderContext::default();
        let out = build(&mut auto, &mut ctx).unwrap();
        assert_eq!(
            ctx.take_page_messages(),
            vec!["Error: Duplicate BoxIdent found: folio#ID-folio".to_string()]
        );
        assert_eq!(out["commands"][2]["tid"], "Q-0-cbox_auto-1");
        assert_eq!(out["commands"][0]["variables"][0]["name"], "folioTop");

        let mut defined = Vec::new();
        crate::walk_commands(&auto, &mut |cmd| defined.extend(cmd.defined_variables()));
        assert_eq!(defined, vec!["folioTop", "folioTop"]);
    }

    #[test]
    fn test_page_message() {
        let mut ctx = RenderContext::default();
        let mut message = PageMessage::new("check prices").on_page(2).unwrap();
        assert_eq!(
            build(&mut message, &mut ctx).unwrap(),
            json!({"cmd": "pagemessage", "message": "check prices", "page": 2})
        );
    }
}
