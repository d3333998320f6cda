//! RemoveInactiveFeatures: compact a feature matrix and renumber cell ids.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::StageContext;
use crate::store::{ArrayPath, ArrayRef, MatrixCategory, Registry};

const ACTIVE_ARRAY: &str = "ActiveArray";
const FEATURE_IDS: &str = "FeatureIds";

const FEATURE_CATEGORIES: &[MatrixCategory] = &[
    MatrixCategory::VertexFeature,
    MatrixCategory::EdgeFeature,
    MatrixCategory::FaceFeature,
    MatrixCategory::CellFeature,
    MatrixCategory::VertexEnsemble,
    MatrixCategory::EdgeEnsemble,
    MatrixCategory::FaceEnsemble,
    MatrixCategory::CellEnsemble,
];

/// Removes every feature whose `active` flag is false.
///
/// Cells that belonged to a removed feature get id 0; the others are
/// renumbered to the compacted feature indices. Neighbor lists in the
/// feature matrix are dropped since they refer to the old numbering.
#[derive(Default)]
pub struct RemoveInactiveFeatures {
    active: ArrayPath,
    feature_ids: ArrayPath,
}

impl RemoveInactiveFeatures {
    pub fn new(active: ArrayPath, feature_ids: ArrayPath) -> Self {
        Self {
            active,
            feature_ids,
        }
    }

    pub fn name(&self) -> &str {
        "RemoveInactiveFeatures"
    }

    pub fn human_label(&self) -> &str {
        "Remove Inactive Features"
    }

    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with(ACTIVE_ARRAY, self.active.clone())
            .with(FEATURE_IDS, self.feature_ids.clone())
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(path) = params.get_path(ACTIVE_ARRAY)? {
            self.active = path;
        }
        if let Some(path) = params.get_path(FEATURE_IDS)? {
            self.feature_ids = path;
        }
        Ok(())
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.resolve(registry, ctx)?;
        Ok(())
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        let Some((active, ids)) = self.resolve(registry, ctx)? else {
            return Ok(());
        };

        let flags: Vec<bool> = active.lock()?.read().try_view::<bool>()?.as_slice().to_vec();
        let features = flags.len().saturating_sub(1);
        let inactive = flags.iter().skip(1).filter(|&&on| !on).count();
        if inactive == 0 {
            ctx.notify_status("No inactive features to remove");
            return Ok(());
        }
        if inactive == features {
            return Err(ArrayFlowError::StageComputation(format!(
                "all {} features in {} are inactive",
                features,
                self.active.matrix_path()
            )));
        }
        ctx.check_cancelled()?;

        let ids_shared = ids.lock()?;
        let mut ids_guard = ids_shared.write();
        let mut ids_view = ids_guard.try_view_mut::<i32>()?;

        let matrix_path = self.active.matrix_path();
        let Some(matrix) = registry.matrix_mut(&matrix_path) else {
            return Err(ArrayFlowError::StaleReference);
        };
        let remaining = matrix.remove_inactive_tuples(&flags, Some(ids_view.as_mut_slice()))?;

        ctx.notify_status(format!(
            "Removed {} of {} features, {} remain",
            inactive,
            features,
            remaining.saturating_sub(1)
        ));
        Ok(())
    }

    fn resolve(
        &self,
        registry: &mut Registry,
        ctx: &mut StageContext,
    ) -> Result<Option<(ArrayRef, ArrayRef)>> {
        if self.active.matrix_path() == self.feature_ids.matrix_path() {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' and '{}' must live in different attribute matrices",
                ACTIVE_ARRAY, FEATURE_IDS
            )));
        }
        let matrix_ok = registry
            .resolve_required_matrix(ctx, &self.active.matrix_path(), FEATURE_CATEGORIES)
            .is_some();
        let active = registry.resolve_required_as::<bool>(ctx, &self.active, &[1]);
        let ids = registry.resolve_required_as::<i32>(ctx, &self.feature_ids, &[1]);
        if !matrix_ok || active.is_empty() || ids.is_empty() {
            return Ok(None);
        }
        Ok(Some((active, ids)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::stage::Phase;
    use crate::store::NamedArray;

    fn registry(active: &[bool]) -> Registry {
        let mut registry = Registry::new();
        let container = registry.create_container("Vol").unwrap();

        let cells = container
            .create_attribute_matrix("cells", &[6], MatrixCategory::Cell)
            .unwrap();
        let mut ids = NamedArray::create::<i32>("ids", 6, &[1]).unwrap();
        ids.view_mut::<i32>()
            .unwrap()
            .as_mut_slice()
            .copy_from_slice(&[1, 1, 2, 3, 3, 0]);
        cells.insert("ids", ids).unwrap();

        let grains = container
            .create_attribute_matrix("grains", &[active.len()], MatrixCategory::CellFeature)
            .unwrap();
        let mut flags = NamedArray::create::<bool>("active", active.len(), &[1]).unwrap();
        flags
            .view_mut::<bool>()
            .unwrap()
            .as_mut_slice()
            .copy_from_slice(active);
        grains.insert("active", flags).unwrap();
        let mut sizes = NamedArray::create::<f32>("size", active.len(), &[1]).unwrap();
        sizes
            .view_mut::<f32>()
            .unwrap()
            .as_mut_slice()
            .iter_mut()
            .enumerate()
            .for_each(|(i, v)| *v = i as f32 * 10.0);
        grains.insert("size", sizes).unwrap();
        registry
    }

    fn stage() -> RemoveInactiveFeatures {
        RemoveInactiveFeatures::new(
            ArrayPath::new("Vol", "grains", "active"),
            ArrayPath::new("Vol", "cells", "ids"),
        )
    }

    #[test]
    fn test_removes_and_renumbers() {
        let mut registry = registry(&[true, true, false, true]);
        let mut ctx = StageContext::standalone(Phase::Execute);
        stage().execute(&mut registry, &mut ctx).unwrap();
        assert!(!ctx.has_error());

        let grains = registry.matrix(&ArrayPath::matrix("Vol", "grains")).unwrap();
        assert_eq!(grains.tuple_count(), 3);
        let sizes = grains.get("size").unwrap().read();
        assert_eq!(sizes.view::<f32>().unwrap().as_slice(), &[0.0, 10.0, 30.0]);

        let ids = registry.array(&ArrayPath::new("Vol", "cells", "ids")).unwrap();
        assert_eq!(ids.read().view::<i32>().unwrap().as_slice(), &[1, 1, 0, 2, 2, 0]);
    }

    #[test]
    fn test_unknown_feature_id_fails() {
        let mut registry = registry(&[true, true, false, true]);
        registry
            .array(&ArrayPath::new("Vol", "cells", "ids"))
            .unwrap()
            .write()
            .view_mut::<i32>()
            .unwrap()
            .as_mut_slice()[4] = 9;

        let mut ctx = StageContext::standalone(Phase::Execute);
        let result = stage().execute(&mut registry, &mut ctx);
        assert!(matches!(result, Err(ArrayFlowError::StageComputation(_))));

        let grains = registry.matrix(&ArrayPath::matrix("Vol", "grains")).unwrap();
        assert_eq!(grains.tuple_count(), 4);
        let ids = registry.array(&ArrayPath::new("Vol", "cells", "ids")).unwrap();
        assert_eq!(ids.read().view::<i32>().unwrap().as_slice(), &[1, 1, 2, 3, 9, 0]);
    }

    #[test]
    fn test_nothing_inactive_is_noop() {
        let mut registry = registry(&[true, true, true, true]);
        let mut ctx = StageContext::standalone(Phase::Execute);
        stage().execute(&mut registry, &mut ctx).unwrap();
        let grains = registry.matrix(&ArrayPath::matrix("Vol", "grains")).unwrap();
        assert_eq!(grains.tuple_count(), 4);
    }

    #[test]
    fn test_all_inactive_fails() {
        let mut registry = registry(&[true, false, false, false]);
        let result = stage().execute(&mut registry, &mut StageContext::standalone(Phase::Execute));
        assert!(matches!(result, Err(ArrayFlowError::StageComputation(_))));
    }

    #[test]
    fn test_requires_feature_matrix() {
        let mut registry = registry(&[true, true]);
        registry
            .matrix_mut(&ArrayPath::matrix("Vol", "grains"))
            .unwrap()
            .set_category(MatrixCategory::Cell);
        let mut ctx = StageContext::standalone(Phase::Preflight);
        stage().preflight(&mut registry, &mut ctx).unwrap();
        assert_eq!(ctx.status().error_code(), ErrorKind::ShapeMismatch.code());
    }
}
