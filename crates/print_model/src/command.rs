//! Command core - the typed unit of output sent to the InDesign plugin
//!
//! Every command carries a kind tag (the `cmd` wire key), a parameter map and
//! optionally named sub-commands ("components"). Serialization is a single
//! recursive pass that resolves nested commands to plain JSON data.

use crate::{BoxCore, ImageRegistry, ModelError, RenderContext, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Wire key carrying the command kind
pub const KIND_KEY: &str = "cmd";

/// Per-parameter validator, invoked whenever the parameter is set
pub type Validator = fn(&Value) -> Result<()>;

/// Where a component command is stored inside its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSlot {
    /// Key under which the component is serialized
    pub ident: &'static str,
    /// Whether several instances may share the slot
    pub multiple: bool,
}

impl ComponentSlot {
    pub const fn single(ident: &'static str) -> Self {
        Self { ident, multiple: false }
    }

    pub const fn multiple(ident: &'static str) -> Self {
        Self { ident, multiple: true }
    }
}

/// Components attached under one slot
#[derive(Debug)]
pub enum Component {
    Single(Box<dyn Command>),
    Multiple(Vec<Box<dyn Command>>),
}

impl Component {
    /// Iterate over the commands stored in this slot
    pub fn commands(&self) -> impl Iterator<Item = &dyn Command> {
        let items: Vec<&dyn Command> = match self {
            Component::Single(command) => vec![command.as_ref()],
            Component::Multiple(commands) => commands.iter().map(|c| c.as_ref()).collect(),
        };
        items.into_iter()
    }
}

/// Parameter storage shared by every command kind
#[derive(Debug)]
pub struct CommandCore {
    kind: &'static str,
    params: BTreeMap<String, Value>,
    validators: BTreeMap<&'static str, Validator>,
    components: BTreeMap<&'static str, Component>,
}

impl CommandCore {
    /// Create an empty core for the given wire kind
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            validators: BTreeMap::new(),
            components: BTreeMap::new(),
        }
    }

    /// Wire kind of the command
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Initialize a parameter with its default value
    pub fn define(&mut self, name: &str, default: impl Into<Value>) {
        self.params.insert(name.to_string(), default.into());
    }

    /// Register a validator for a parameter
    pub fn validate_with(&mut self, name: &'static str, validator: Validator) {
        self.validators.insert(name, validator);
    }

    /// Set a parameter, running its validator first. `Null` unsets it.
    pub fn set_param(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(validator) = self.validators.get(name) {
            validator(&value)?;
        }
        self.params.insert(name.to_string(), value);
        Ok(())
    }

    /// Get a parameter; fails if it was never initialized
    pub fn param(&self, name: &str) -> Result<&Value> {
        self.params
            .get(name)
            .ok_or_else(|| ModelError::UndefinedParameter(name.to_string()))
    }

    /// Whether a parameter holds a non-null value
    pub fn has_value(&self, name: &str) -> bool {
        self.params.get(name).is_some_and(|v| !v.is_null())
    }

    /// String value of a parameter, if set
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Numeric value of a parameter, if set
    pub fn f64_param(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(Value::as_f64)
    }

    /// Boolean value of a parameter, if set
    pub fn bool_param(&self, name: &str) -> Option<bool> {
        self.params.get(name).and_then(Value::as_bool)
    }

    /// Unset a parameter without running its validator
    pub fn clear_param(&mut self, name: &str) {
        if let Some(value) = self.params.get_mut(name) {
            *value = Value::Null;
        }
    }

    /// Attach a component command under the slot it declares
    pub fn add_component(&mut self, command: Box<dyn Command>) -> Result<()> {
        let slot = command
            .component_slot()
            .ok_or_else(|| ModelError::InvalidComponent(command.kind().to_string()))?;

        if !slot.multiple {
            self.components.insert(slot.ident, Component::Single(command));
            return Ok(());
        }

        match self.components.get_mut(slot.ident) {
            Some(Component::Multiple(commands)) => commands.push(command),
            _ => {
                self.components
                    .insert(slot.ident, Component::Multiple(vec![command]));
            }
        }
        Ok(())
    }

    /// Component stored under a slot ident
    pub fn component(&self, ident: &str) -> Option<&Component> {
        self.components.get(ident)
    }

    /// Whether anything is attached under a slot ident
    pub fn has_component(&self, ident: &str) -> bool {
        self.components.contains_key(ident)
    }

    /// All attached component commands, in slot order
    pub fn components(&self) -> impl Iterator<Item = &dyn Command> {
        self.components.values().flat_map(|c| c.commands())
    }

    /// Non-null parameters as a JSON map, prefixed with the kind tag
    pub fn serialize_params(&self, include_kind: bool) -> Map<String, Value> {
        let mut out = Map::new();
        if include_kind {
            out.insert(KIND_KEY.to_string(), Value::String(self.kind.to_string()));
        }
        for (name, value) in &self.params {
            if !value.is_null() {
                out.insert(name.clone(), value.clone());
            }
        }
        out
    }

    fn components_mut(&mut self) -> impl Iterator<Item = (&&'static str, &mut Component)> {
        self.components.iter_mut()
    }
}

/// Behaviour shared by every command kind
///
/// Concrete commands embed a [`CommandCore`] and override the hooks they need.
pub trait Command: fmt::Debug {
    fn core(&self) -> &CommandCore;

    fn core_mut(&mut self) -> &mut CommandCore;

    /// Wire kind (`cmd` value)
    fn kind(&self) -> &'static str {
        self.core().kind()
    }

    /// Slot this command occupies when attached as a component
    fn component_slot(&self) -> Option<ComponentSlot> {
        None
    }

    /// Derive parameters from typed state right before validation
    fn assemble(&mut self, _ctx: &mut RenderContext) -> Result<()> {
        Ok(())
    }

    /// Pre-serialization validation hook
    fn validate(&mut self) -> Result<()> {
        Ok(())
    }

    /// Serialize the command and all of its components
    fn build_command(&mut self, ctx: &mut RenderContext, include_kind: bool) -> Result<Value> {
        serialize_command(self, ctx, include_kind)
    }

    fn as_box(&self) -> Option<&BoxCore> {
        None
    }

    fn as_box_mut(&mut self) -> Option<&mut BoxCore> {
        None
    }

    /// Variable names this command defines (components excluded)
    fn defined_variables(&self) -> Vec<String> {
        Vec::new()
    }

    /// Variable names this command needs (components excluded)
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Assets collected by image-carrying commands
    fn collected_images(&self) -> Option<&ImageRegistry> {
        None
    }

    /// Asset ids that could not be resolved
    fn missing_assets(&self) -> Vec<String> {
        Vec::new()
    }

    /// Child commands held outside the component slots
    fn nested_commands(&self) -> Vec<&dyn Command> {
        Vec::new()
    }
}

/// Default serialization: assemble, validate, emit non-null params and
/// recursively serialized components
pub fn serialize_command<C: Command + ?Sized>(
    command: &mut C,
    ctx: &mut RenderContext,
    include_kind: bool,
) -> Result<Value> {
    command.assemble(ctx)?;
    command.validate()?;

    let core = command.core_mut();
    let mut out = core.serialize_params(include_kind);
    for (ident, component) in core.components_mut() {
        let value = match component {
            Component::Single(child) => child.build_command(ctx, true)?,
            Component::Multiple(children) => Value::Array(
                children
                    .iter_mut()
                    .map(|child| child.build_command(ctx, true))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .filter(|v| !is_empty_output(v))
                    .collect(),
            ),
        };
        if !is_empty_output(&value) {
            out.insert(ident.to_string(), value);
        }
    }
    Ok(Value::Object(out))
}

/// Visit a command, its components and nested commands depth-first
pub fn walk_commands<'a>(command: &'a dyn Command, visit: &mut dyn FnMut(&'a dyn Command)) {
    visit(command);
    for child in command.core().components() {
        walk_commands(child, visit);
    }
    for child in command.nested_commands() {
        walk_commands(child, visit);
    }
}

/// Whether a serialized command carries nothing worth sending
pub fn is_empty_output(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ============================================================================
// Shared validators
// ============================================================================

pub(crate) fn require_number(param: &str, value: &Value) -> Result<()> {
    if value.is_number() {
        Ok(())
    } else {
        Err(ModelError::invalid(param, format!("expected a number, got {}", value)))
    }
}

pub(crate) fn require_string(param: &str, value: &Value) -> Result<()> {
    if value.is_string() {
        Ok(())
    } else {
        Err(ModelError::invalid(param, format!("expected a string, got {}", value)))
    }
}

pub(crate) fn optional_non_negative(param: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Number(n) if n.as_f64().is_some_and(|v| v >= 0.0) => Ok(()),
        other => Err(ModelError::invalid(
            param,
            format!("expected a non-negative number, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Sample {
        core: CommandCore,
        slot: Option<ComponentSlot>,
    }

    impl Sample {
        fn new(kind: &'static str) -> Self {
            let mut core = CommandCore::new(kind);
            core.define("label", "sample");
            core.define("size", Value::Null);
            core.validate_with("size", |v| optional_non_negative("size", v));
            Self { core, slot: None }
        }

        fn in_slot(mut self, slot: ComponentSlot) -> Self {
            self.slot = Some(slot);
            self
        }
    }

    impl Command for Sample {
        fn core(&self) -> &CommandCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut CommandCore {
            &mut self.core
        }

        fn component_slot(&self) -> Option<ComponentSlot> {
            self.slot
        }
    }

    #[test]
    fn test_build_strips_null_params() {
        let mut sample = Sample::new("sample");
        let mut ctx = RenderContext::default();
        let out = sample.build_command(&mut ctx, true).unwrap();
        assert_eq!(out, json!({"cmd": "sample", "label": "sample"}));

        sample.core_mut().set_param("label", Value::Null).unwrap();
        let out = sample.build_command(&mut ctx, false).unwrap();
        assert_eq!(out, json!({}));
    }

    #[test]
    fn test_validator_runs_on_set() {
        let mut sample = Sample::new("sample");
        assert!(sample.core_mut().set_param("size", 12.5).is_ok());
        assert!(sample.core_mut().set_param("size", -1).is_err());
        assert_eq!(sample.core().param("size").unwrap(), &json!(12.5));
    }

    #[test]
    fn test_undefined_param() {
        let sample = Sample::new("sample");
        assert!(matches!(
            sample.core().param("nope"),
            Err(ModelError::UndefinedParameter(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_components_single_and_multiple() {
        let mut parent = Sample::new("parent");
        let mut first = Sample::new("first").in_slot(ComponentSlot::single("one"));
        first.core_mut().set_param("label", "a").unwrap();
        let mut second = Sample::new("second").in_slot(ComponentSlot::single("one"));
        second.core_mut().set_param("label", "b").unwrap();
        parent.core_mut().add_component(Box::new(first)).unwrap();
        parent.core_mut().add_component(Box::new(second)).unwrap();

        parent
            .core_mut()
            .add_component(Box::new(Sample::new("m1").in_slot(ComponentSlot::multiple("many"))))
            .unwrap();
        parent
            .core_mut()
            .add_component(Box::new(Sample::new("m2").in_slot(ComponentSlot::multiple("many"))))
            .unwrap();

        let mut ctx = RenderContext::default();
        let out = parent.build_command(&mut ctx, true).unwrap();
        assert_eq!(out["one"], json!({"cmd": "second", "label": "b"}));
        assert_eq!(out["many"][0]["cmd"], "m1");
        assert_eq!(out["many"][1]["cmd"], "m2");
    }

    #[test]
    fn test_component_without_slot_rejected() {
        let mut parent = Sample::new("parent");
        let result = parent.core_mut().add_component(Box::new(Sample::new("loose")));
        assert!(matches!(result, Err(ModelError::InvalidComponent(kind)) if kind == "loose"));
    }

    #[test]
    fn test_walk_visits_nested() {
        let mut parent = Sample::new("parent");
        let mut child = Sample::new("child").in_slot(ComponentSlot::multiple("kids"));
        child
            .core_mut()
            .add_component(Box::new(Sample::new("grandchild").in_slot(ComponentSlot::single("g"))))
            .unwrap();
        parent.core_mut().add_component(Box::new(child)).unwrap();

        let mut kinds = Vec::new();
        walk_commands(&parent, &mut |c| kinds.push(c.kind()));
        assert_eq!(kinds, vec!["parent", "child", "grandchild"]);
    }
}
