//! Per-render state shared by commands while they are serialized
//!
//! One `RenderContext` lives for exactly one generation run. It holds the page
//! cursor, the box ident counters and the box ident reference stack, so two
//! renders never observe each other's state.

use crate::{BoxIdentBuilder, Command, GeneratorSettings, Result};

#[derive(Debug, Default)]
pub struct RenderContext {
    settings: GeneratorSettings,
    page_number: u32,
    idents: BoxIdentBuilder,
    reference_stack: Vec<String>,
    pending_page_messages: Vec<String>,
}

impl RenderContext {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Current page number (0 before any page navigation)
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn set_page_number(&mut self, page: u32) {
        tracing::trace!(page, "page cursor set");
        self.page_number = page;
    }

    pub fn increment_page_number(&mut self) {
        self.page_number += 1;
        tracing::trace!(page = self.page_number, "page cursor advanced");
    }

    /// Push a content reference used for content-keyed box idents
    pub fn push_box_ident_reference(&mut self, reference: impl Into<String>) {
        self.reference_stack.push(reference.into());
    }

    pub fn pop_box_ident_reference(&mut self) -> Option<String> {
        self.reference_stack.pop()
    }

    /// The innermost active box ident reference
    pub fn box_ident_reference(&self) -> Option<&str> {
        self.reference_stack.last().map(String::as_str)
    }

    /// Assign a generated ident to a box that has none
    pub fn ensure_box_ident(
        &mut self,
        command: &mut dyn Command,
        postfixes: &[&str],
    ) -> Result<Option<String>> {
        self.idents.ensure_box_ident(
            command,
            &self.settings.box_ident_prefix,
            self.page_number,
            postfixes,
        )
    }

    /// Record the box's ident; a reused ident becomes a page message
    pub fn ensure_unique_box_ident(&mut self, command: &dyn Command) {
        if let Some(key) = self.idents.ensure_unique_box_ident(command) {
            tracing::warn!(key = %key, "duplicate box ident");
            if self.settings.report_duplicate_idents {
                self.push_page_message(format!("Error: Duplicate BoxIdent found: {}", key));
            }
        }
    }

    /// Queue a diagnostic that should be placed on the current page
    pub fn push_page_message(&mut self, message: impl Into<String>) {
        self.pending_page_messages.push(message.into());
    }

    /// Drain diagnostics collected since the last call
    pub fn take_page_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_page_messages)
    }

    pub fn idents(&self) -> &BoxIdentBuilder {
        &self.idents
    }

    /// Open a checkpoint; everything up to [`Self::rollback`] can be undone
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.idents.begin();
        Checkpoint {
            page_number: self.page_number,
            references: self.reference_stack.len(),
            page_messages: self.pending_page_messages.len(),
        }
    }

    pub fn commit(&mut self) {
        self.idents.commit();
    }

    /// Restore the page cursor, ident counters and pending messages
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.idents.rollback();
        self.page_number = checkpoint.page_number;
        self.reference_stack.truncate(checkpoint.references);
        self.pending_page_messages.truncate(checkpoint.page_messages);
        tracing::debug!(page = self.page_number, "render state rolled back");
    }
}

/// Render state captured by [`RenderContext::checkpoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    page_number: u32,
    references: usize,
    page_messages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_cursor() {
        let mut ctx = RenderContext::default();
        assert_eq!(ctx.page_number(), 0);
        ctx.set_page_number(4);
        ctx.increment_page_number();
        assert_eq!(ctx.page_number(), 5);
    }

    #[test]
    fn test_reference_stack() {
        let mut ctx = RenderContext::default();
        assert_eq!(ctx.box_ident_reference(), None);
        ctx.push_box_ident_reference("product-12");
        ctx.push_box_ident_reference("variant-3");
        assert_eq!(ctx.box_ident_reference(), Some("variant-3"));
        assert_eq!(ctx.pop_box_ident_reference().as_deref(), Some("variant-3"));
        assert_eq!(ctx.box_ident_reference(), Some("product-12"));
    }

    #[test]
    fn test_page_messages_drain() {
        let mut ctx = RenderContext::default();
        ctx.push_page_message("one");
        assert_eq!(ctx.take_page_messages(), vec!["one".to_string()]);
        assert!(ctx.take_page_messages().is_empty());
    }

    #[test]
    fn test_rollback_to_checkpoint() {
        let mut ctx = RenderContext::default();
        ctx.set_page_number(2);
        ctx.push_page_message("kept");

        let checkpoint = ctx.checkpoint();
        ctx.increment_page_number();
        ctx.push_page_message("dropped");
        ctx.push_box_ident_reference("product-1");
        let mut copy = crate::CopyBox::new("logo");
        ctx.ensure_box_ident(&mut copy, &[]).unwrap();
        ctx.rollback(checkpoint);

        assert_eq!(ctx.page_number(), 2);
        assert_eq!(ctx.box_ident_reference(), None);
        assert_eq!(ctx.take_page_messages(), vec!["kept".to_string()]);
        assert_eq!(
            ctx.ensure_box_ident(&mut crate::CopyBox::new("logo"), &[]).unwrap().as_deref(),
            Some("Q-2-cbox-1")
        );
    }
}
