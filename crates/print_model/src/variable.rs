//! InDesign-side variables
//!
//! Variables hold positions or computed values on the plugin side. Later
//! commands reference them by name (relative positions, min/max formulas).
//! Both kinds can be attached to a box under the `variables` slot.

use crate::command::require_string;
use crate::{Command, CommandCore, ComponentSlot, ModelError, RenderContext, Result};
use serde_json::Value;

const VARIABLES_SLOT: ComponentSlot = ComponentSlot::multiple("variables");

/// Box geometry a variable can capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariablePosition {
    Left,
    Top,
    Right,
    Bottom,
    Width,
    Height,
}

impl VariablePosition {
    pub fn as_str(self) -> &'static str {
        match self {
            VariablePosition::Left => "left",
            VariablePosition::Top => "top",
            VariablePosition::Right => "right",
            VariablePosition::Bottom => "bottom",
            VariablePosition::Width => "width",
            VariablePosition::Height => "height",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(VariablePosition::Left),
            "top" => Some(VariablePosition::Top),
            "right" => Some(VariablePosition::Right),
            "bottom" => Some(VariablePosition::Bottom),
            "width" => Some(VariablePosition::Width),
            "height" => Some(VariablePosition::Height),
            _ => None,
        }
    }
}

fn validate_position(value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::String(s) if VariablePosition::parse(s).is_some() => Ok(()),
        other => Err(ModelError::invalid(
            "position",
            format!("{} is not a variable position", other),
        )),
    }
}

fn validate_name(value: &Value) -> Result<()> {
    require_string("name", value)?;
    if value.as_str().is_some_and(|s| s.trim().is_empty()) {
        return Err(ModelError::invalid("name", "variable name must not be empty"));
    }
    Ok(())
}

// =============================================================================
// Variable
// =============================================================================

/// Named scalar, either a fixed value or a position of the parent box
#[derive(Debug)]
pub struct Variable {
    core: CommandCore,
}

impl Variable {
    pub const KIND: &'static str = "variable";

    fn empty(name: &str) -> Result<Self> {
        let mut core = CommandCore::new(Self::KIND);
        core.define("name", Value::Null);
        core.define("value", Value::Null);
        core.define("position", Value::Null);
        core.validate_with("name", validate_name);
        core.validate_with("position", validate_position);
        core.set_param("name", name)?;
        Ok(Self { core })
    }

    /// Variable with a fixed value
    pub fn new(name: &str, value: impl Into<Value>) -> Result<Self> {
        let mut variable = Self::empty(name)?;
        variable.core.set_param("value", value)?;
        Ok(variable)
    }

    /// Variable capturing a position of the box it is attached to
    pub fn from_position(name: &str, position: &str) -> Result<Self> {
        let mut variable = Self::empty(name)?;
        variable.core.set_param("position", position)?;
        Ok(variable)
    }

    pub fn at(name: &str, position: VariablePosition) -> Result<Self> {
        Self::from_position(name, position.as_str())
    }

    pub fn name(&self) -> &str {
        self.core.str_param("name").unwrap_or_default()
    }
}

impl Command for Variable {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn component_slot(&self) -> Option<ComponentSlot> {
        Some(VARIABLES_SLOT)
    }

    fn validate(&mut self) -> Result<()> {
        if !self.core.has_value("value") && !self.core.has_value("position") {
            return Err(ModelError::MissingParameter {
                command: Self::KIND.to_string(),
                param: "value".to_string(),
            });
        }
        Ok(())
    }

    fn defined_variables(&self) -> Vec<String> {
        vec![self.name().to_string()]
    }
}

// =============================================================================
// MathVariable
// =============================================================================

/// Aggregate used by [`MathVariable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOperation {
    Min,
    Max,
}

impl MathOperation {
    fn function(self) -> &'static str {
        match self {
            MathOperation::Min => "Math.min",
            MathOperation::Max => "Math.max",
        }
    }
}

/// Variable computed on the plugin side as min/max over other variables
#[derive(Debug)]
pub struct MathVariable {
    core: CommandCore,
    name: String,
    operation: MathOperation,
    operands: Vec<String>,
}

impl MathVariable {
    pub const KIND: &'static str = "eval";

    pub fn new(name: impl Into<String>, operation: MathOperation, operands: Vec<String>) -> Self {
        let mut core = CommandCore::new(Self::KIND);
        core.define("script", Value::Null);
        Self {
            core,
            name: name.into(),
            operation,
            operands,
        }
    }

    pub fn min(name: impl Into<String>, operands: &[&str]) -> Self {
        Self::new(name, MathOperation::Min, operands.iter().map(|s| s.to_string()).collect())
    }

    pub fn max(name: impl Into<String>, operands: &[&str]) -> Self {
        Self::new(name, MathOperation::Max, operands.iter().map(|s| s.to_string()).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// ExtendScript statement assigning the aggregate to the variable
    pub fn compile(&self) -> String {
        let args: Vec<String> = self
            .operands
            .iter()
            .map(|operand| format!("vars[{}]", quote(operand)))
            .collect();
        format!(
            "vars[{}] = {}({});",
            quote(&self.name),
            self.operation.function(),
            args.join(", ")
        )
    }
}

fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

impl Command for MathVariable {
    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn component_slot(&self) -> Option<ComponentSlot> {
        Some(VARIABLES_SLOT)
    }

    fn assemble(&mut self, _ctx: &mut RenderContext) -> Result<()> {
        let script = self.compile();
        self.core.set_param("script", script)
    }

    fn validate(&mut self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::invalid("name", "variable name must not be empty"));
        }
        if self.operands.is_empty() {
            return Err(ModelError::MissingParameter {
                command: Self::KIND.to_string(),
                param: "operands".to_string(),
            });
        }
        Ok(())
    }

    fn defined_variables(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn dependencies(&self) -> Vec<String> {
        self.operands.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_variable() {
        let mut variable = Variable::new("startY", 25.5).unwrap();
        let mut ctx = RenderContext::default();
        assert_eq!(
            variable.build_command(&mut ctx, true).unwrap(),
            json!({"cmd": "variable", "name": "startY", "value": 25.5})
        );
        assert_eq!(variable.defined_variables(), vec!["startY".to_string()]);
    }

    #[test]
    fn test_position_validated() {
        assert!(Variable::from_position("a", "bottom").is_ok());
        assert!(Variable::from_position("a", "middle").is_err());
        assert!(Variable::new("  ", 1).is_err());
    }

    #[test]
    fn test_variable_needs_value() {
        let mut variable = Variable::new("empty", Value::Null).unwrap();
        let mut ctx = RenderContext::default();
        assert!(matches!(
            variable.build_command(&mut ctx, true),
            Err(ModelError::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_math_variable_script() {
        let mut max = MathVariable::max("lowest", &["leftBottom", "rightBottom"]);
        assert_eq!(max.dependencies(), vec!["leftBottom", "rightBottom"]);
        assert_eq!(max.defined_variables(), vec!["lowest"]);

        let mut ctx = RenderContext::default();
        let out = max.build_command(&mut ctx, true).unwrap();
        assert_eq!(out["cmd"], "eval");
        assert_eq!(
            out["script"],
            r#"vars["lowest"] = Math.max(vars["leftBottom"], vars["rightBottom"]);"#
        );
    }

    #[test]
    fn test_math_variable_needs_operands() {
        let mut min = MathVariable::min("nothing", &[]);
        let mut ctx = RenderContext::default();
        assert!(min.build_command(&mut ctx, true).is_err());
    }
}
