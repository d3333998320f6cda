//! Stage parameters: a flat, ordered key/value set.

use crate::error::{ArrayFlowError, Result};
use crate::store::ArrayPath;
use crate::types::ElementType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single parameter value.
///
/// Serialized untagged, so pipeline files read naturally:
/// `"Value" = 0.5`, `"Dims" = [10, 10, 1]`, `"Input" = ["M", "cells", "ids"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    Path(ArrayPath),
}

impl ParamValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            ParamValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    /// Integer lists widen to float lists.
    pub fn as_float_list(&self) -> Option<Vec<f64>> {
        match self {
            ParamValue::FloatList(v) => Some(v.clone()),
            ParamValue::IntList(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// Accepts a path triple or its `a|b|c` text form.
    pub fn as_path(&self) -> Option<ArrayPath> {
        match self {
            ParamValue::Path(p) => Some(p.clone()),
            ParamValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::String(_) => "string",
            ParamValue::IntList(_) => "int list",
            ParamValue::FloatList(_) => "float list",
            ParamValue::Path(_) => "path",
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v.into())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntList(v)
    }
}

impl From<&[usize]> for ParamValue {
    fn from(v: &[usize]) -> Self {
        ParamValue::IntList(v.iter().map(|&x| x as i64).collect())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::FloatList(v)
    }
}

impl From<&[f32]> for ParamValue {
    fn from(v: &[f32]) -> Self {
        ParamValue::FloatList(v.iter().map(|&x| x.into()).collect())
    }
}

impl From<ArrayPath> for ParamValue {
    fn from(v: ArrayPath) -> Self {
        ParamValue::Path(v)
    }
}

impl From<ElementType> for ParamValue {
    fn from(v: ElementType) -> Self {
        ParamValue::String(v.name().to_string())
    }
}

/// Named parameters of one stage, in declaration order.
///
/// The typed getters return `Ok(None)` for an absent key and a `Parameter`
/// error when the key holds a value of the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(IndexMap<String, ParamValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.typed(key, "bool", ParamValue::as_bool)
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.typed(key, "int", ParamValue::as_int)
    }

    pub fn get_float(&self, key: &str) -> Result<Option<f64>> {
        self.typed(key, "float", ParamValue::as_float)
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.typed(key, "string", |v| v.as_str().map(str::to_string))
    }

    pub fn get_path(&self, key: &str) -> Result<Option<ArrayPath>> {
        self.typed(key, "path", ParamValue::as_path)
    }

    pub fn get_float_list(&self, key: &str) -> Result<Option<Vec<f64>>> {
        self.typed(key, "float list", ParamValue::as_float_list)
    }

    /// Non-negative integer list, e.g. tuple or component dimensions.
    pub fn get_dims(&self, key: &str) -> Result<Option<Vec<usize>>> {
        let Some(list) = self.typed(key, "int list", |v| v.as_int_list().map(<[i64]>::to_vec))? else {
            return Ok(None);
        };
        list.iter()
            .map(|&x| {
                usize::try_from(x).map_err(|_| {
                    ArrayFlowError::Parameter(format!("'{}' contains negative dimension {}", key, x))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Element type given by name, e.g. `"float32"`.
    pub fn get_element_type(&self, key: &str) -> Result<Option<ElementType>> {
        match self.get_string(key)? {
            Some(name) => name
                .parse()
                .map(Some)
                .map_err(|e: String| ArrayFlowError::Parameter(format!("'{}': {}", key, e))),
            None => Ok(None),
        }
    }

    fn typed<T>(
        &self,
        key: &str,
        expected: &str,
        extract: impl FnOnce(&ParamValue) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => extract(value).map(Some).ok_or_else(|| {
                ArrayFlowError::Parameter(format!(
                    "'{}' should be a {}, found {}",
                    key,
                    expected,
                    value.type_name()
                ))
            }),
        }
    }
}
