//! Update-mode filtering of the command log
//!
//! An update run only re-sends the boxes the user selected in InDesign, plus
//! the structural commands the plugin needs to find its way through the
//! document.

use crate::Result;
use print_model::{
    Command, GeneratorSettings, RenderContext, UpdateElements, ExecuteScript, GoToPage,
    OpenDocument, PageMessage, Variable, KIND_KEY, PARAM_LOCALE, PARAM_LOCALIZED, PARAM_NAME,
    PARAM_TID,
};
use serde_json::Value;
use std::collections::HashSet;

/// Command kinds that always pass an update filter
pub const STRUCTURAL_KINDS: [&str; 5] = [
    OpenDocument::KIND,
    GoToPage::KIND,
    ExecuteScript::KIND,
    Variable::KIND,
    PageMessage::KIND,
];

fn strip_locale<'a>(value: &'a str, locale: &str) -> &'a str {
    value
        .strip_suffix(locale)
        .and_then(|rest| rest.strip_suffix('-'))
        .unwrap_or(value)
}

/// `{name}#{tid}` key of a serialized box, with the locale token removed
/// from localized boxes
fn element_key(command: &Value) -> Option<(String, Option<String>)> {
    let tid = command.get(PARAM_TID)?.as_str()?;
    let name = command.get(PARAM_NAME).and_then(Value::as_str).unwrap_or_default();
    let raw = format!("{}#{}", name, tid);

    let localized = command.get(PARAM_LOCALIZED).and_then(Value::as_bool) == Some(true);
    let normalized = match command.get(PARAM_LOCALE).and_then(Value::as_str) {
        Some(locale) if localized => {
            let stripped = strip_locale(tid, locale);
            (stripped != tid).then(|| format!("{}#{}", name, stripped))
        }
        _ => None,
    };
    Some((raw, normalized))
}

/// Keep the selected boxes and structural commands, in log order, behind an
/// `updateitems` directive. An empty selection selects nothing at all.
pub fn filter_selected_commands(
    raw_commands: &[Value],
    selected: &[String],
    settings: &GeneratorSettings,
) -> Result<Vec<Value>> {
    if selected.is_empty() {
        tracing::debug!("empty update selection, nothing to send");
        return Ok(Vec::new());
    }

    let active_locale = settings
        .locale
        .as_deref()
        .filter(|_| settings.locale_aware);
    let wanted: HashSet<&str> = selected
        .iter()
        .map(|entry| match active_locale {
            Some(locale) => strip_locale(entry, locale),
            None => entry.as_str(),
        })
        .collect();

    let mut scratch = RenderContext::default();
    let mut filtered = vec![UpdateElements::new(selected).build_command(&mut scratch, true)?];

    for command in raw_commands {
        let structural = command
            .get(KIND_KEY)
            .and_then(Value::as_str)
            .is_some_and(|kind| STRUCTURAL_KINDS.contains(&kind));
        let chosen = structural
            || element_key(command).is_some_and(|(raw, normalized)| {
                wanted.contains(raw.as_str())
                    || normalized.is_some_and(|key| wanted.contains(key.as_str()))
            });
        if chosen {
            filtered.push(command.clone());
        }
    }

    tracing::debug!(
        selected = selected.len(),
        kept = filtered.len() - 1,
        "filtered command log for update"
    );
    Ok(filtered)
}
