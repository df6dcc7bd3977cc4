//! Plugin request parameters the queue depends on

use serde::{Deserialize, Serialize};

/// Access to the parameters of the active plugin request
pub trait PluginParams {
    /// Whether the plugin asked to regenerate a selection only
    fn is_update_mode(&self) -> bool;

    /// Selected elements as `{elementName}#{boxIdent}`
    fn selected_elements(&self) -> &[String];
}

/// Update request as sent by the plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSelection {
    pub update_mode: bool,
    pub selected_elements: Vec<String>,
}

impl UpdateSelection {
    /// Full render, nothing selected
    pub fn full_render() -> Self {
        Self::default()
    }

    pub fn update<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            update_mode: true,
            selected_elements: elements.into_iter().map(Into::into).collect(),
        }
    }
}

impl PluginParams for UpdateSelection {
    fn is_update_mode(&self) -> bool {
        self.update_mode
    }

    fn selected_elements(&self) -> &[String] {
        &self.selected_elements
    }
}
