// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node parameters and the parameter RPC surface.
//!
//! Every node carries a flat table of named parameter values with dotted
//! names (`drive.max_speed`). [`ParameterService`] exposes the table through
//! six ordinary service endpoints, so parameter traffic is scheduled exactly
//! like any other service callback.

mod service;
pub mod srv;

pub use service::ParameterService;

use crate::node::Node;

/// Value of a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    NotSet,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    ByteArray(Vec<u8>),
}

impl ParameterValue {
    #[must_use]
    pub fn type_of(&self) -> ParameterType {
        match self {
            ParameterValue::NotSet => ParameterType::NotSet,
            ParameterValue::Bool(_) => ParameterType::Bool,
            ParameterValue::Integer(_) => ParameterType::Integer,
            ParameterValue::Double(_) => ParameterType::Double,
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::ByteArray(_) => ParameterType::ByteArray,
        }
    }
}

/// Type tag of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    NotSet,
    Bool,
    Integer,
    Double,
    String,
    ByteArray,
}

/// A named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
}

impl Parameter {
    #[must_use]
    pub fn new(name: &str, value: ParameterValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Outcome of one set operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SetParametersResult {
    pub successful: bool,
    pub reason: String,
}

impl SetParametersResult {
    fn ok() -> Self {
        Self {
            successful: true,
            reason: String::new(),
        }
    }

    fn rejected(reason: &str) -> Self {
        Self {
            successful: false,
            reason: reason.to_string(),
        }
    }
}

/// Static description of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub parameter_type: ParameterType,
}

/// Result of a list operation: matching names plus the dotted prefixes that
/// have children among them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParametersResult {
    pub names: Vec<String>,
    pub prefixes: Vec<String>,
}

/// List every nesting level when passed as `depth`.
pub const DEPTH_RECURSIVE: u64 = 0;

const SEPARATOR: char = '.';

impl Node {
    /// Set one parameter. Setting [`ParameterValue::NotSet`] removes it.
    pub fn set_parameter(&self, parameter: Parameter) -> SetParametersResult {
        self.set_parameters(vec![parameter]).remove(0)
    }

    /// Set several parameters, each independently.
    pub fn set_parameters(&self, parameters: Vec<Parameter>) -> Vec<SetParametersResult> {
        parameters
            .into_iter()
            .map(|parameter| match validate_name(&parameter.name) {
                Err(reason) => SetParametersResult::rejected(reason),
                Ok(()) => {
                    self.apply_parameter(parameter);
                    SetParametersResult::ok()
                }
            })
            .collect()
    }

    /// Set several parameters as one unit: either all apply or none do.
    pub fn set_parameters_atomically(&self, parameters: Vec<Parameter>) -> SetParametersResult {
        for parameter in &parameters {
            if let Err(reason) = validate_name(&parameter.name) {
                return SetParametersResult::rejected(reason);
            }
        }
        for parameter in parameters {
            self.apply_parameter(parameter);
        }
        SetParametersResult::ok()
    }

    fn apply_parameter(&self, parameter: Parameter) {
        let mut table = self.parameters.lock().unwrap_or_else(|e| e.into_inner());
        if parameter.value == ParameterValue::NotSet {
            table.remove(&parameter.name);
        } else {
            table.insert(parameter.name, parameter.value);
        }
    }

    /// Current value of `name`, or [`ParameterValue::NotSet`].
    pub fn get_parameter(&self, name: &str) -> ParameterValue {
        self.parameters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .unwrap_or(ParameterValue::NotSet)
    }

    /// Current values of `names`, in order.
    pub fn get_parameters(&self, names: &[String]) -> Vec<ParameterValue> {
        let table = self.parameters.lock().unwrap_or_else(|e| e.into_inner());
        names
            .iter()
            .map(|name| table.get(name).cloned().unwrap_or(ParameterValue::NotSet))
            .collect()
    }

    /// Type tags of `names`, in order.
    pub fn get_parameter_types(&self, names: &[String]) -> Vec<ParameterType> {
        self.get_parameters(names)
            .iter()
            .map(ParameterValue::type_of)
            .collect()
    }

    /// Descriptors of `names`, in order.
    pub fn describe_parameters(&self, names: &[String]) -> Vec<ParameterDescriptor> {
        let table = self.parameters.lock().unwrap_or_else(|e| e.into_inner());
        names
            .iter()
            .map(|name| ParameterDescriptor {
                name: name.clone(),
                parameter_type: table
                    .get(name)
                    .map_or(ParameterType::NotSet, ParameterValue::type_of),
            })
            .collect()
    }

    /// Names under `prefixes` (every name when `prefixes` is empty), limited
    /// to `depth` dotted levels below the prefix; [`DEPTH_RECURSIVE`] lifts
    /// the limit.
    pub fn list_parameters(&self, prefixes: &[String], depth: u64) -> ListParametersResult {
        let table = self.parameters.lock().unwrap_or_else(|e| e.into_inner());
        let mut result = ListParametersResult::default();

        for name in table.keys() {
            let relative_depth = if prefixes.is_empty() {
                Some(count_levels(name))
            } else {
                prefixes.iter().find_map(|prefix| {
                    name.strip_prefix(prefix.as_str())
                        .and_then(|rest| rest.strip_prefix(SEPARATOR))
                        .map(count_levels)
                })
            };

            let Some(relative_depth) = relative_depth else {
                continue;
            };
            if depth != DEPTH_RECURSIVE && relative_depth > depth {
                continue;
            }

            result.names.push(name.clone());
            if let Some(split) = name.rfind(SEPARATOR) {
                let prefix = name[..split].to_string();
                if !result.prefixes.contains(&prefix) {
                    result.prefixes.push(prefix);
                }
            }
        }

        result
    }
}

fn validate_name(name: &str) -> core::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("parameter name must not be empty");
    }
    if name.starts_with(SEPARATOR) || name.ends_with(SEPARATOR) {
        return Err("parameter name must not start or end with a separator");
    }
    Ok(())
}

/// Number of dotted levels in `name`: `a` is 1, `a.b` is 2.
fn count_levels(name: &str) -> u64 {
    name.split(SEPARATOR).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_round_trip() {
        let node = Node::new("params_basic").expect("node");
        let result = node.set_parameter(Parameter::new("drive.max_speed", ParameterValue::Double(1.5)));
        assert!(result.successful);
        assert_eq!(
            node.get_parameter("drive.max_speed"),
            ParameterValue::Double(1.5)
        );
        assert_eq!(node.get_parameter("missing"), ParameterValue::NotSet);
    }

    #[test]
    fn test_not_set_removes() {
        let node = Node::new("params_remove").expect("node");
        node.set_parameter(Parameter::new("flag", ParameterValue::Bool(true)));
        node.set_parameter(Parameter::new("flag", ParameterValue::NotSet));
        assert_eq!(node.get_parameter("flag"), ParameterValue::NotSet);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let node = Node::new("params_invalid").expect("node");
        let result = node.set_parameter(Parameter::new("", ParameterValue::Integer(1)));
        assert!(!result.successful);
        assert!(!result.reason.is_empty());
    }

    #[test]
    fn test_atomic_set_applies_nothing_on_failure() {
        let node = Node::new("params_atomic").expect("node");
        let result = node.set_parameters_atomically(vec![
            Parameter::new("a", ParameterValue::Integer(1)),
            Parameter::new("", ParameterValue::Integer(2)),
        ]);
        assert!(!result.successful);
        assert_eq!(node.get_parameter("a"), ParameterValue::NotSet);
    }

    #[test]
    fn test_list_with_prefix_and_depth() {
        let node = Node::new("params_list").expect("node");
        node.set_parameters(vec![
            Parameter::new("drive.max_speed", ParameterValue::Double(1.0)),
            Parameter::new("drive.pid.kp", ParameterValue::Double(0.4)),
            Parameter::new("lidar.rate", ParameterValue::Integer(10)),
        ]);

        let all = node.list_parameters(&[], DEPTH_RECURSIVE);
        assert_eq!(all.names.len(), 3);
        assert!(all.prefixes.contains(&"drive".to_string()));
        assert!(all.prefixes.contains(&"drive.pid".to_string()));

        let drive = node.list_parameters(&["drive".to_string()], 1);
        assert_eq!(drive.names, vec!["drive.max_speed".to_string()]);

        let drive_deep = node.list_parameters(&["drive".to_string()], DEPTH_RECURSIVE);
        assert_eq!(drive_deep.names.len(), 2);
    }

    #[test]
    fn test_parameter_types() {
        let node = Node::new("params_types").expect("node");
        node.set_parameter(Parameter::new("label", ParameterValue::String("x".into())));
        let types = node.get_parameter_types(&["label".to_string(), "gone".to_string()]);
        assert_eq!(types, vec![ParameterType::String, ParameterType::NotSet]);
    }
}
