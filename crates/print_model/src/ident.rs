//! Box ident generation
//!
//! Every placed box needs a `tid` the InDesign plugin can find again on the
//! next run. Boxes without an explicit ident get
//! `{prefix}-{page}-{kind}{_postfix...}-{counter}`, where the counter runs per
//! page and composed kind. Explicit idents are kept as they are.

use crate::{Command, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct BoxIdentBuilder {
    counters: HashMap<(u32, String), u32>,
    generated: HashSet<(String, String)>,
    journal: Option<Vec<IdentChange>>,
}

/// Change recorded while a journal is open
#[derive(Debug)]
enum IdentChange {
    Counter(u32, String),
    Recorded(String, String),
}

impl BoxIdentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a box an ident if it has none. Returns the final ident, or `None`
    /// for commands that are not boxes.
    pub fn ensure_box_ident(
        &mut self,
        command: &mut dyn Command,
        prefix: &str,
        page: u32,
        postfixes: &[&str],
    ) -> Result<Option<String>> {
        let kind = command.kind();
        let Some(placed) = command.as_box_mut() else {
            return Ok(None);
        };
        if let Some(existing) = placed.box_ident() {
            return Ok(Some(existing.to_string()));
        }

        let mut composed = kind.to_string();
        for postfix in postfixes {
            composed.push('_');
            composed.push_str(postfix);
        }
        let counter = self.next_counter(page, &composed);
        let ident = format!("{}-{}-{}-{}", prefix, page, composed, counter);
        placed.set_box_ident(ident.clone())?;
        Ok(Some(ident))
    }

    /// Record the (element name, ident) pair. Returns the `name#ident` key if
    /// the pair was seen before in this render.
    pub fn ensure_unique_box_ident(&mut self, command: &dyn Command) -> Option<String> {
        let placed = command.as_box()?;
        let ident = placed.box_ident()?.to_string();
        let name = placed.element_name().unwrap_or_default().to_string();
        let key = format!("{}#{}", name, ident);
        if self.generated.insert((name.clone(), ident.clone())) {
            if let Some(journal) = self.journal.as_mut() {
                journal.push(IdentChange::Recorded(name, ident));
            }
            None
        } else {
            Some(key)
        }
    }

    /// Next counter value for a page and composed kind, starting at 1
    pub fn next_counter(&mut self, page: u32, composed_kind: &str) -> u32 {
        let counter = self
            .counters
            .entry((page, composed_kind.to_string()))
            .or_insert(0);
        *counter += 1;
        let value = *counter;
        if let Some(journal) = self.journal.as_mut() {
            journal.push(IdentChange::Counter(page, composed_kind.to_string()));
        }
        value
    }

    /// Start recording changes so they can be undone with [`Self::rollback`]
    pub fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keep the changes recorded since [`Self::begin`]
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo counter steps and recorded pairs since [`Self::begin`]
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for change in journal.into_iter().rev() {
            match change {
                IdentChange::Counter(page, kind) => {
                    let key = (page, kind);
                    if let Some(counter) = self.counters.get_mut(&key) {
                        *counter -= 1;
                        if *counter == 0 {
                            self.counters.remove(&key);
                        }
                    }
                }
                IdentChange::Recorded(name, ident) => {
                    self.generated.remove(&(name, ident));
                }
            }
        }
    }

    /// Number of distinct idents recorded so far
    pub fn recorded(&self) -> usize {
        self.generated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CopyBox, SetLayer};

    #[test]
    fn test_generated_idents_count_per_page_and_kind() {
        let mut builder = BoxIdentBuilder::new();
        let mut a = CopyBox::new("logo");
        let mut b = CopyBox::new("logo");
        let mut c = CopyBox::new("logo");

        let first = builder.ensure_box_ident(&mut a, "Q", 1, &[]).unwrap();
        let second = builder.ensure_box_ident(&mut b, "Q", 1, &[]).unwrap();
        let other_page = builder.ensure_box_ident(&mut c, "Q", 2, &[]).unwrap();

        assert_eq!(first.as_deref(), Some("Q-1-cbox-1"));
        assert_eq!(second.as_deref(), Some("Q-1-cbox-2"));
        assert_eq!(other_page.as_deref(), Some("Q-2-cbox-1"));
    }

    #[test]
    fn test_postfix_has_own_counter() {
        let mut builder = BoxIdentBuilder::new();
        let mut plain = CopyBox::new("logo");
        let mut inline = CopyBox::new("logo");
        builder.ensure_box_ident(&mut plain, "Q", 3, &[]).unwrap();
        let ident = builder.ensure_box_ident(&mut inline, "Q", 3, &["inline"]).unwrap();
        assert_eq!(ident.as_deref(), Some("Q-3-cbox_inline-1"));
    }

    #[test]
    fn test_explicit_ident_kept() {
        let mut builder = BoxIdentBuilder::new();
        let mut copy = CopyBox::new("logo");
        copy.base_mut().set_box_ident("ID-42").unwrap();
        let ident = builder.ensure_box_ident(&mut copy, "Q", 1, &[]).unwrap();
        assert_eq!(ident.as_deref(), Some("ID-42"));
        assert_eq!(builder.next_counter(1, "cbox"), 1);
    }

    #[test]
    fn test_non_box_untouched() {
        let mut builder = BoxIdentBuilder::new();
        let mut layer = SetLayer::new("Text");
        assert_eq!(builder.ensure_box_ident(&mut layer, "Q", 1, &[]).unwrap(), None);
        assert_eq!(builder.ensure_unique_box_ident(&layer), None);
    }

    #[test]
    fn test_duplicate_detection() {
        let mut builder = BoxIdentBuilder::new();
        let mut a = CopyBox::new("logo");
        a.base_mut().set_box_ident("ID-1").unwrap();
        let mut b = CopyBox::new("logo");
        b.base_mut().set_box_ident("ID-1").unwrap();
        let mut other_name = CopyBox::new("claim");
        other_name.base_mut().set_box_ident("ID-1").unwrap();

        assert_eq!(builder.ensure_unique_box_ident(&a), None);
        assert_eq!(builder.ensure_unique_box_ident(&other_name), None);
        assert_eq!(
            builder.ensure_unique_box_ident(&b).as_deref(),
            Some("logo#ID-1")
        );
        assert_eq!(builder.recorded(), 2);
    }

    #[test]
    fn test_rollback_restores_counters_and_pairs() {
        let mut builder = BoxIdentBuilder::new();
        let mut kept = CopyBox::new("logo");
        builder.ensure_box_ident(&mut kept, "Q", 1, &[]).unwrap();
        builder.ensure_unique_box_ident(&kept);

        builder.begin();
        let mut dropped = CopyBox::new("logo");
        builder.ensure_box_ident(&mut dropped, "Q", 1, &[]).unwrap();
        assert_eq!(builder.ensure_unique_box_ident(&dropped), None);
        builder.rollback();

        assert_eq!(builder.recorded(), 1);
        assert_eq!(builder.ensure_unique_box_ident(&dropped), None);
        assert_eq!(builder.next_counter(1, "cbox"), 2);

        builder.begin();
        builder.next_counter(1, "cbox");
        builder.commit();
        builder.rollback();
        assert_eq!(builder.next_counter(1, "cbox"), 4);
    }
}
