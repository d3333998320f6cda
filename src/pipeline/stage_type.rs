//! Stage type enumeration for creating built-in stages from pipeline files.

use serde::{Deserialize, Serialize};

/// Types of built-in stages that can be instantiated by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageType {
    // Structure
    CreateAttributeMatrix,
    CreateImageGeometry,
    CreateDataArray,
    RenameArray,

    // Computation
    /// Boolean mask from comparing a scalar array against a value.
    ThresholdArray,
    FindFeatureNeighbors,
    RemoveInactiveFeatures,
}

impl StageType {
    /// Stable identifier, identical to the serialized name.
    pub fn name(&self) -> &'static str {
        match self {
            StageType::CreateAttributeMatrix => "CreateAttributeMatrix",
            StageType::CreateImageGeometry => "CreateImageGeometry",
            StageType::CreateDataArray => "CreateDataArray",
            StageType::RenameArray => "RenameArray",
            StageType::ThresholdArray => "ThresholdArray",
            StageType::FindFeatureNeighbors => "FindFeatureNeighbors",
            StageType::RemoveInactiveFeatures => "RemoveInactiveFeatures",
        }
    }

    /// Get the display name for this stage type.
    pub fn display_name(&self) -> &'static str {
        match self {
            StageType::CreateAttributeMatrix => "Create Attribute Matrix",
            StageType::CreateImageGeometry => "Create Image Geometry",
            StageType::CreateDataArray => "Create Data Array",
            StageType::RenameArray => "Rename Array",
            StageType::ThresholdArray => "Threshold Array",
            StageType::FindFeatureNeighbors => "Find Feature Neighbors",
            StageType::RemoveInactiveFeatures => "Remove Inactive Features",
        }
    }

    pub fn all() -> &'static [StageType] {
        &[
            StageType::CreateAttributeMatrix,
            StageType::CreateImageGeometry,
            StageType::CreateDataArray,
            StageType::RenameArray,
            StageType::ThresholdArray,
            StageType::FindFeatureNeighbors,
            StageType::RemoveInactiveFeatures,
        ]
    }

    /// Whether the stage only shapes the registry without computing values.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            StageType::CreateAttributeMatrix
                | StageType::CreateImageGeometry
                | StageType::CreateDataArray
                | StageType::RenameArray
        )
    }

    /// Get a detailed description of what this stage does.
    pub fn description(&self) -> &'static str {
        match self {
            StageType::CreateAttributeMatrix =>
                "Creates an attribute matrix with the given tuple dimensions.\n\
                 The container is created if it does not exist.",

            StageType::CreateImageGeometry =>
                "Attaches a regular grid geometry to a data container.\n\
                 Optionally creates a cell matrix sized to the grid.",

            StageType::CreateDataArray =>
                "Creates an array of any element type in an existing matrix.\n\
                 Every component is set to the initialization value.",

            StageType::RenameArray =>
                "Renames an array inside its attribute matrix.\n\
                 Fails if the new name is taken.",

            StageType::ThresholdArray =>
                "Compares a scalar array against a value.\n\
                 Writes a boolean mask with one entry per tuple.",

            StageType::FindFeatureNeighbors =>
                "Finds features sharing a face on an image grid.\n\
                 Writes a neighbor list and a neighbor count per feature.",

            StageType::RemoveInactiveFeatures =>
                "Removes features flagged inactive from a feature matrix.\n\
                 Renumbers cell feature ids to match.",
        }
    }
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for StageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageType::all()
            .iter()
            .copied()
            .find(|ty| ty.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown stage type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_serde() {
        for ty in StageType::all() {
            let json = serde_json::to_string(ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.name()));
            assert_eq!(ty.name().parse::<StageType>().unwrap(), *ty);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "thresholdarray".parse::<StageType>().unwrap(),
            StageType::ThresholdArray
        );
        assert!("Nope".parse::<StageType>().is_err());
    }
}
