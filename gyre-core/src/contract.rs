//! Parameter contracts — the declared input surface of a node.
//!
//! A contract is the authoritative list of parameters a node will accept.
//! The resolver drops anything not listed here during injection; values are
//! never silently passed through. This is a deliberate security boundary
//! against parameter-injection attacks, not a convenience filter.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Integer or floating-point number.
    Number,
    /// Boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// Any value; no type checking applied.
    Any,
}

impl ParamType {
    /// Check whether a value is compatible with this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.inner().is_string(),
            Self::Number => value.inner().is_number(),
            Self::Boolean => value.inner().is_boolean(),
            Self::Object => value.inner().is_object(),
            Self::Array => value.inner().is_array(),
            Self::Any => true,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Specification of a single declared parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Declared type.
    pub param_type: ParamType,

    /// Whether the parameter must be present after the merge.
    pub required: bool,

    /// Default used when no source supplies the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    /// Create a required parameter of the given type.
    pub fn required(param_type: ParamType) -> Self {
        Self {
            param_type,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    /// Create an optional parameter of the given type.
    pub fn optional(param_type: ParamType) -> Self {
        Self {
            param_type,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

/// The full declared contract of a node.
///
/// Iteration order is deterministic (sorted by name) so that resolution
/// and logging behave identically across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterContract {
    params: BTreeMap<String, ParamSpec>,
}

impl ParameterContract {
    /// Create an empty contract.
    ///
    /// A node with an empty contract receives no injected values at all,
    /// regardless of matching-named runtime overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter (builder style).
    pub fn with(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    /// Check whether a parameter name is declared.
    pub fn declares(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Get the spec for a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    /// Iterate over all declared parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over required parameter names.
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Check if the contract declares no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_builder() {
        let contract = ParameterContract::new()
            .with("values", ParamSpec::required(ParamType::Array))
            .with(
                "factor",
                ParamSpec::optional(ParamType::Number)
                    .with_default(0.9)
                    .with_description("Multiplier applied each iteration"),
            );

        assert_eq!(contract.len(), 2);
        assert!(contract.declares("values"));
        assert!(contract.declares("factor"));
        assert!(!contract.declares("injected"));

        let factor = contract.get("factor").unwrap();
        assert!(!factor.required);
        assert_eq!(factor.default.as_ref().unwrap().as_f64(), Some(0.9));
    }

    #[test]
    fn required_names() {
        let contract = ParameterContract::new()
            .with("a", ParamSpec::required(ParamType::Any))
            .with("b", ParamSpec::optional(ParamType::Any))
            .with("c", ParamSpec::required(ParamType::String));

        let required: Vec<&str> = contract.required_names().collect();
        assert_eq!(required, vec!["a", "c"]);
    }

    #[test]
    fn type_checking() {
        assert!(ParamType::Number.accepts(&Value::float(1.5)));
        assert!(!ParamType::Number.accepts(&Value::string("1.5")));
        assert!(ParamType::Any.accepts(&Value::null()));
        assert!(ParamType::Array.accepts(&vec![1i64, 2, 3].into()));
    }

    #[test]
    fn empty_contract() {
        let contract = ParameterContract::new();
        assert!(contract.is_empty());
        assert_eq!(contract.required_names().count(), 0);
    }
}
