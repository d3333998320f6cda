//! Built-in stages.
//!
//! Each stage is a plain struct with inherent `preflight`/`execute` methods;
//! [`BuiltinStage`](crate::pipeline::BuiltinStage) dispatches to them.

mod create_attribute_matrix;
mod create_data_array;
mod create_image_geometry;
mod find_feature_neighbors;
mod remove_inactive_features;
mod rename_array;
mod threshold_array;

pub use create_attribute_matrix::CreateAttributeMatrix;
pub use create_data_array::CreateDataArray;
pub use create_image_geometry::CreateImageGeometry;
pub use find_feature_neighbors::FindFeatureNeighbors;
pub use remove_inactive_features::RemoveInactiveFeatures;
pub use rename_array::RenameArray;
pub use threshold_array::{CompareOp, ThresholdArray};

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::{ParamValue, ParameterSet};
use crate::store::MatrixCategory;

pub(crate) fn parse_category(key: &str, text: &str) -> Result<MatrixCategory> {
    text.parse()
        .map_err(|e: String| ArrayFlowError::Parameter(format!("'{}': {}", key, e)))
}

pub(crate) fn float_triple(key: &str, values: &[f64]) -> Result<[f32; 3]> {
    match values {
        [x, y, z] => Ok([*x as f32, *y as f32, *z as f32]),
        _ => Err(ArrayFlowError::Parameter(format!(
            "'{}' needs exactly 3 values, found {}",
            key,
            values.len()
        ))),
    }
}

/// A scalar parameter as text, whatever its stored type.
pub(crate) fn scalar_text(params: &ParameterSet, key: &str) -> Result<Option<String>> {
    match params.get(key) {
        None => Ok(None),
        Some(ParamValue::String(s)) => Ok(Some(s.clone())),
        Some(ParamValue::Int(v)) => Ok(Some(v.to_string())),
        Some(ParamValue::Float(v)) => Ok(Some(v.to_string())),
        Some(ParamValue::Bool(v)) => Ok(Some(v.to_string())),
        Some(_) => Err(ArrayFlowError::Parameter(format!(
            "'{}' should be a single value",
            key
        ))),
    }
}
