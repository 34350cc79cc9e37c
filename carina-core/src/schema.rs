//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, including repeatable
//! nested blocks, so configuration can be validated and defaulted before any
//! remote call is made.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block with a fixed set of keys
    Block(BlockSchema),
}

impl AttributeType {
    /// Repeatable nested block, e.g. `domain { ... } domain { ... }`
    pub fn blocks(block: BlockSchema) -> Self {
        AttributeType::List(Box::new(AttributeType::Block(block)))
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(block), Value::Map(map)) => match block.validate(map) {
                Ok(()) => Ok(()),
                Err(mut errors) => Err(TypeError::BlockError {
                    block: block.name.clone(),
                    inner: Box::new(errors.remove(0)),
                }),
            },

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(block) => format!("Block({})", block.name),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("In block '{block}': {inner}")]
    BlockError { block: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the provider from remote state, never by configuration
    pub computed: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            default: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Schema of a nested block
///
/// Unlike top-level resource attributes, block keys are closed: a key that
/// is not declared is an error.
#[derive(Debug, Clone)]
pub struct BlockSchema {
    pub name: String,
    pub attributes: HashMap<String, AttributeSchema>,
}

impl BlockSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    /// Declared keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn validate(&self, values: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        into_result(validate_attributes(&self.attributes, values, true))
    }

    /// Fill in declared defaults for keys absent from `values`
    pub fn with_defaults(&self, values: &HashMap<String, Value>) -> HashMap<String, Value> {
        apply_defaults(&self.attributes, values)
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Look up the block schema behind a block-typed attribute
    pub fn block(&self, name: &str) -> Option<&BlockSchema> {
        match self.attributes.get(name).map(|a| &a.attr_type) {
            Some(AttributeType::Block(block)) => Some(block),
            Some(AttributeType::List(inner)) => match inner.as_ref() {
                AttributeType::Block(block) => Some(block),
                _ => None,
            },
            _ => None,
        }
    }

    /// Validate resource attributes
    ///
    /// Unknown top-level attributes are allowed; unknown keys inside blocks
    /// are not.
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        into_result(validate_attributes(&self.attributes, attributes, false))
    }

    /// Fill in declared defaults, including inside nested blocks
    pub fn apply_defaults(&self, attributes: &HashMap<String, Value>) -> HashMap<String, Value> {
        apply_defaults(&self.attributes, attributes)
    }
}

fn into_result(errors: Vec<TypeError>) -> Result<(), Vec<TypeError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    values: &HashMap<String, Value>,
    strict: bool,
) -> Vec<TypeError> {
    let mut errors = Vec::new();

    for (name, schema) in schemas {
        if schema.required && !values.contains_key(name) && schema.default.is_none() {
            errors.push(TypeError::MissingRequired { name: name.clone() });
        }
    }

    for (name, value) in values {
        match schemas.get(name) {
            Some(schema) if schema.computed => {
                errors.push(TypeError::ComputedAttribute { name: name.clone() });
            }
            Some(schema) => {
                if let Err(e) = schema.attr_type.validate(value) {
                    errors.push(e);
                }
            }
            None if strict => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
            None => {}
        }
    }

    errors
}

fn apply_defaults(
    schemas: &HashMap<String, AttributeSchema>,
    values: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut out = values.clone();

    for (name, schema) in schemas {
        match out.get_mut(name) {
            None => {
                if let Some(default) = &schema.default {
                    out.insert(name.clone(), default.clone());
                }
            }
            Some(value) => fill_block_defaults(&schema.attr_type, value),
        }
    }

    out
}

fn fill_block_defaults(attr_type: &AttributeType, value: &mut Value) {
    match (attr_type, value) {
        (AttributeType::Block(block), Value::Map(map)) => {
            *map = block.with_defaults(map);
        }
        (AttributeType::List(inner), Value::List(items)) => {
            for item in items {
                fill_block_defaults(inner, item);
            }
        }
        _ => {}
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// TCP port number (0-65535)
    pub fn port_number() -> AttributeType {
        AttributeType::Custom {
            name: "PortNumber".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (0..=65535).contains(n) => Ok(()),
                Value::Int(_) => Err("Port number must be between 0 and 65535".to_string()),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// Unsigned 32-bit integer (timeouts, counts, weights)
    pub fn uint32() -> AttributeType {
        AttributeType::Custom {
            name: "UInt32".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if u32::try_from(*n).is_ok() => Ok(()),
                Value::Int(n) => Err(format!("Value {} is outside 0..={}", n, u32::MAX)),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// Non-empty string without surrounding whitespace (names, hostnames)
    pub fn non_empty_string() -> AttributeType {
        AttributeType::Custom {
            name: "NonEmptyString".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if s.trim().is_empty() => {
                    Err("Value must not be empty".to_string())
                }
                Value::String(s) if s.trim() != s => {
                    Err(format!("Value '{}' has surrounding whitespace", s))
                }
                Value::String(_) => Ok(()),
                _ => Err("Expected string".to_string()),
            },
        }
    }
}
