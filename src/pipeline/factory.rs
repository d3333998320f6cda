//! Creation of built-in stages from their type and a parameter set.

use crate::config::StageConfig;
use crate::error::Result;
use crate::pipeline::executor::StageSlot;
use crate::pipeline::stage::BuiltinStage;
use crate::pipeline::stage_type::StageType;
use crate::pipeline::stages::{
    CreateAttributeMatrix, CreateDataArray, CreateImageGeometry, FindFeatureNeighbors,
    RemoveInactiveFeatures, RenameArray, ThresholdArray,
};

pub struct StageFactory;

impl StageFactory {
    /// A stage of the given type with default parameters.
    pub fn create(stage_type: StageType) -> BuiltinStage {
        match stage_type {
            StageType::CreateAttributeMatrix => {
                BuiltinStage::CreateAttributeMatrix(CreateAttributeMatrix::default())
            }
            StageType::CreateImageGeometry => {
                BuiltinStage::CreateImageGeometry(CreateImageGeometry::default())
            }
            StageType::CreateDataArray => BuiltinStage::CreateDataArray(CreateDataArray::default()),
            StageType::RenameArray => BuiltinStage::RenameArray(RenameArray::default()),
            StageType::ThresholdArray => BuiltinStage::ThresholdArray(ThresholdArray::default()),
            StageType::FindFeatureNeighbors => {
                BuiltinStage::FindFeatureNeighbors(FindFeatureNeighbors::default())
            }
            StageType::RemoveInactiveFeatures => {
                BuiltinStage::RemoveInactiveFeatures(RemoveInactiveFeatures::default())
            }
        }
    }

    /// A configured stage slot for one pipeline-file entry.
    pub fn build(config: &StageConfig) -> Result<StageSlot> {
        let mut stage = Self::create(config.stage_type);
        stage.set_parameters(&config.params)?;
        let slot = StageSlot::new(stage);
        Ok(match &config.label {
            Some(label) => slot.with_label(label.clone()),
            None => slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArrayFlowError;
    use crate::pipeline::params::ParameterSet;

    #[test]
    fn test_every_type_is_constructible() {
        for ty in StageType::all() {
            let stage = StageFactory::create(*ty);
            assert_eq!(stage.name(), ty.name());
            assert_eq!(stage.human_label(), ty.display_name());
        }
    }

    #[test]
    fn test_build_applies_params_and_label() {
        let config = StageConfig::new(
            StageType::RenameArray,
            ParameterSet::new()
                .with("Path", "M|cells|a")
                .with("NewName", "b"),
        )
        .with_label("rename a");
        let slot = StageFactory::build(&config).unwrap();
        assert_eq!(slot.label(), "rename a");
        assert_eq!(
            slot.stage.parameters().get_string("NewName").unwrap(),
            Some("b".to_string())
        );
    }

    #[test]
    fn test_build_rejects_bad_param_type() {
        let config = StageConfig::new(
            StageType::ThresholdArray,
            ParameterSet::new().with("Value", "not a number"),
        );
        assert!(matches!(
            StageFactory::build(&config),
            Err(ArrayFlowError::Parameter(_))
        ));
    }
}
