//! The per-render command queue

use crate::filter::filter_selected_commands;
use crate::{PluginParams, QueueError, Result};
use print_model::{
    is_empty_output, walk_commands, AssetInfo, Command, GeneratorSettings, ImageRegistry,
    PageMessage, RenderContext, Variable,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Everything a render hands to the transport layer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationResult {
    pub commands: Vec<Value>,
    pub images: ImageRegistry,
    pub warnings: Vec<String>,
    pub messages: Vec<String>,
}

/// Ordered log of serialized commands for one generation run
#[derive(Debug, Default)]
pub struct CommandQueue {
    ctx: RenderContext,
    commands: Vec<Value>,
    variables: BTreeSet<String>,
    assets: ImageRegistry,
    missing_asset_count: usize,
    missing_assets: BTreeMap<String, usize>,
    y_pos: f64,
    messages: Vec<String>,
}

impl CommandQueue {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            ctx: RenderContext::new(settings),
            ..Self::default()
        }
    }

    /// Validate, serialize and append a command.
    ///
    /// Variables the command tree defines are registered before dependencies
    /// are checked, so a component may use a variable an earlier component
    /// defines. A command never satisfies its own dependencies. A failed add
    /// leaves the log, the variable registry and the render state untouched.
    pub fn add_command(&mut self, command: &mut dyn Command) -> Result<()> {
        let mut nodes: Vec<(Vec<String>, Vec<String>)> = Vec::new();
        walk_commands(&*command, &mut |cmd| {
            nodes.push((cmd.defined_variables(), cmd.dependencies()));
        });

        let introduced: BTreeSet<String> = nodes
            .iter()
            .flat_map(|(defined, _)| defined.iter())
            .filter(|name| !self.variables.contains(*name))
            .cloned()
            .collect();
        self.variables.extend(introduced.iter().cloned());

        let registered = &self.variables;
        let fresh = &introduced;
        let mut missing: Vec<String> = nodes
            .iter()
            .flat_map(|(defined, required)| {
                required.iter().filter(move |name| {
                    let self_reference = defined.contains(*name) && fresh.contains(*name);
                    self_reference || !registered.contains(*name)
                })
            })
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        if !missing.is_empty() {
            self.forget(&introduced);
            tracing::warn!(command = command.kind(), missing = ?missing, "undefined variables");
            return Err(QueueError::UndefinedVariables {
                command: command.kind().to_string(),
                missing,
            });
        }

        let had_ident = command.as_box().and_then(|b| b.box_ident()).is_some();
        let checkpoint = self.ctx.checkpoint();
        let built = match self.ensure_and_build(command) {
            Ok(value) => {
                self.ctx.commit();
                value
            }
            Err(e) => {
                self.ctx.rollback(checkpoint);
                if !had_ident {
                    if let Some(placed) = command.as_box_mut() {
                        placed.clear_box_ident();
                    }
                }
                self.forget(&introduced);
                tracing::warn!(command = command.kind(), error = %e, "command rejected");
                return Err(e);
            }
        };

        if is_empty_output(&built) {
            tracing::trace!(command = command.kind(), "command produced no output");
        } else {
            tracing::debug!(command = command.kind(), page = self.ctx.page_number(), "command added");
            self.commands.push(built);
        }

        self.register_asset(&*command);
        for asset_id in command.missing_assets() {
            self.increment_missing_asset_counter(&asset_id);
        }
        self.flush_page_messages()
    }

    fn forget(&mut self, introduced: &BTreeSet<String>) {
        for name in introduced {
            self.variables.remove(name);
        }
    }

    fn ensure_and_build(&mut self, command: &mut dyn Command) -> Result<Value> {
        self.ctx.ensure_box_ident(&mut *command, &[])?;
        self.ctx.ensure_unique_box_ident(&*command);
        Ok(command.build_command(&mut self.ctx, true)?)
    }

    fn flush_page_messages(&mut self) -> Result<()> {
        for message in self.ctx.take_page_messages() {
            let mut page_message = PageMessage::new(message);
            if self.ctx.page_number() > 0 {
                page_message = page_message.on_page(self.ctx.page_number())?;
            }
            let built = page_message.build_command(&mut self.ctx, true)?;
            self.commands.push(built);
        }
        Ok(())
    }

    /// The command log to send: the selection in update mode, everything
    /// otherwise
    pub fn get_commands(&self, params: &dyn PluginParams) -> Result<Vec<Value>> {
        if params.is_update_mode() {
            self.filter_selected_commands(&self.commands, params)
        } else {
            Ok(self.commands.clone())
        }
    }

    /// The unfiltered command log
    pub fn get_commands_raw(&self) -> &[Value] {
        &self.commands
    }

    pub fn filter_selected_commands(
        &self,
        raw_commands: &[Value],
        params: &dyn PluginParams,
    ) -> Result<Vec<Value>> {
        filter_selected_commands(raw_commands, params.selected_elements(), self.ctx.settings())
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    // -------------------------------------------------------------------------
    // Page and y cursor
    // -------------------------------------------------------------------------

    pub fn page_number(&self) -> u32 {
        self.ctx.page_number()
    }

    pub fn set_page_number(&mut self, page: u32) {
        self.ctx.set_page_number(page);
    }

    pub fn increment_page_number(&mut self) {
        self.ctx.increment_page_number();
    }

    pub fn y_pos(&self) -> f64 {
        self.y_pos
    }

    /// Move the y cursor, optionally mirroring it into an InDesign variable
    pub fn set_y_pos(&mut self, y_pos: f64, mirror: Option<&str>) -> Result<()> {
        if let Some(name) = mirror {
            self.add_command(&mut Variable::new(name, y_pos)?)?;
        }
        self.y_pos = y_pos;
        Ok(())
    }

    pub fn increment_y_pos(&mut self, delta: f64, mirror: Option<&str>) -> Result<()> {
        self.set_y_pos(self.y_pos + delta, mirror)
    }

    // -------------------------------------------------------------------------
    // Assets
    // -------------------------------------------------------------------------

    /// Fold the assets an image-carrying command collected into the registry
    pub fn register_asset(&mut self, command: &dyn Command) {
        let Some(images) = command.collected_images() else {
            return;
        };
        for (id, asset) in images {
            self.assets.insert(id.clone(), asset.clone());
        }
    }

    pub fn add_asset(&mut self, asset: AssetInfo) {
        self.assets.insert(asset.id.clone(), asset);
    }

    pub fn registered_assets(&self) -> &ImageRegistry {
        &self.assets
    }

    pub fn increment_missing_asset_counter(&mut self, asset_id: &str) {
        tracing::warn!(asset_id, "missing asset");
        self.missing_asset_count += 1;
        *self.missing_assets.entry(asset_id.to_string()).or_insert(0) += 1;
    }

    /// Missing asset ids with the number of times each was requested
    pub fn missing_assets(&self) -> &BTreeMap<String, usize> {
        &self.missing_assets
    }

    pub fn missing_asset_count(&self) -> usize {
        self.missing_asset_count
    }

    /// Aggregate warning for the response, `None` when nothing was missing
    pub fn missing_assets_message(&self) -> Option<String> {
        if self.missing_asset_count == 0 {
            return None;
        }
        let ids: Vec<String> = self
            .missing_assets
            .iter()
            .map(|(id, count)| match count {
                1 => id.clone(),
                n => format!("{} ({}x)", id, n),
            })
            .collect();
        Some(format!(
            "{} missing asset reference(s): {}",
            self.missing_asset_count,
            ids.join(", ")
        ))
    }

    // -------------------------------------------------------------------------
    // Messages and result
    // -------------------------------------------------------------------------

    /// Message shown to the user outside the document
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Finish the render and hand the log and bookkeeping over
    pub fn into_result(self, params: &dyn PluginParams) -> Result<GenerationResult> {
        let commands = self.get_commands(params)?;
        let warnings = self.missing_assets_message().into_iter().collect();
        Ok(GenerationResult {
            commands,
            images: self.assets,
            warnings,
            messages: self.messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UpdateSelection;
    use print_model::{CopyBox, GoToPage, NextPage, Position, TextBox};
    use serde_json::json;

    #[test]
    fn test_navigation_moves_page_cursor() {
        let mut queue = CommandQueue::new(GeneratorSettings::default());
        queue.add_command(&mut GoToPage::new(2).unwrap()).unwrap();
        assert_eq!(queue.page_number(), 2);
        queue.add_command(&mut NextPage::new()).unwrap();
        assert_eq!(queue.page_number(), 3);

        let mut copy = CopyBox::new("logo");
        queue.add_command(&mut copy).unwrap();
        assert_eq!(queue.get_commands_raw()[2]["tid"], "Q-3-cbox-1");
    }

    #[test]
    fn test_failed_add_leaves_state_untouched() {
        let mut queue = CommandQueue::new(GeneratorSettings::default());
        let mut text = TextBox::new("body");
        text.base_mut()
            .set_top(Position::relative("headlineBottom", 2.0))
            .unwrap();
        text.base_mut()
            .core_mut()
            .add_component(Box::new(Variable::new("bodyBottom", 0.0).unwrap()))
            .unwrap();

        let err = queue.add_command(&mut text).unwrap_err();
        assert!(matches!(err, QueueError::UndefinedVariables { ref missing, .. } if missing == &["headlineBottom"]));
        assert!(queue.is_empty());
        assert!(!queue.has_variable("bodyBottom"));
    }

    #[test]
    fn test_y_pos_mirrored_as_variable() {
        let mut queue = CommandQueue::new(GeneratorSettings::default());
        queue.set_y_pos(20.0, None).unwrap();
        queue.increment_y_pos(5.5, Some("cursorY")).unwrap();
        assert_eq!(queue.y_pos(), 25.5);
        assert!(queue.has_variable("cursorY"));
        assert_eq!(
            queue.get_commands_raw(),
            [json!({"cmd": "variable", "name": "cursorY", "value": 25.5})]
        );
    }

    #[test]
    fn test_rejected_mirror_keeps_y_pos() {
        let mut queue = CommandQueue::new(GeneratorSettings::default());
        queue.set_y_pos(12.0, None).unwrap();
        assert!(queue.set_y_pos(40.0, Some("  ")).is_err());
        assert!(queue.increment_y_pos(3.0, Some("")).is_err());
        assert_eq!(queue.y_pos(), 12.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_missing_assets_message() {
        let mut queue = CommandQueue::new(GeneratorSettings::default());
        assert_eq!(queue.missing_assets_message(), None);
        queue.increment_missing_asset_counter("17");
        queue.increment_missing_asset_counter("17");
        queue.increment_missing_asset_counter("4");
        assert_eq!(queue.missing_asset_count(), 3);
        assert_eq!(
            queue.missing_assets_message().as_deref(),
            Some("3 missing asset reference(s): 17 (2x), 4")
        );
    }

    #[test]
    fn test_into_result() {
        let mut queue = CommandQueue::new(GeneratorSettings::default());
        queue.add_command(&mut CopyBox::new("logo")).unwrap();
        queue.add_message("Generated in preview mode");
        let result = queue.into_result(&UpdateSelection::full_render()).unwrap();
        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.messages, vec!["Generated in preview mode"]);
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["warnings"], json!([]));
    }
}
