//! FindFeatureNeighbors: features that share at least one voxel face.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::StageContext;
use crate::store::{ArrayPath, ArrayRef, ImageGeom, MatrixCategory, Registry, StatusSink};
use std::collections::BTreeSet;

const FEATURE_IDS: &str = "FeatureIds";
const FEATURE_MATRIX: &str = "FeatureMatrix";
const NEIGHBOR_LIST: &str = "NeighborList";
const NUM_NEIGHBORS: &str = "NumNeighbors";

/// Builds, for every feature, the sorted list of face-adjacent features.
///
/// Feature id 0 is background and never appears as a neighbor. The feature
/// matrix grows to `max(id) + 1` tuples if it is smaller.
pub struct FindFeatureNeighbors {
    feature_ids: ArrayPath,
    feature_matrix: ArrayPath,
    neighbor_list: String,
    num_neighbors: String,
}

impl Default for FindFeatureNeighbors {
    fn default() -> Self {
        Self {
            feature_ids: ArrayPath::default(),
            feature_matrix: ArrayPath::default(),
            neighbor_list: "NeighborList".to_string(),
            num_neighbors: "NumNeighbors".to_string(),
        }
    }
}

struct Resolved {
    voxels: usize,
    ids: ArrayRef,
}

impl FindFeatureNeighbors {
    pub fn new(feature_ids: ArrayPath, feature_matrix: ArrayPath) -> Self {
        Self {
            feature_ids,
            feature_matrix: feature_matrix.matrix_path(),
            ..Self::default()
        }
    }

    pub fn with_output_names(
        mut self,
        neighbor_list: impl Into<String>,
        num_neighbors: impl Into<String>,
    ) -> Self {
        self.neighbor_list = neighbor_list.into();
        self.num_neighbors = num_neighbors.into();
        self
    }

    pub fn name(&self) -> &str {
        "FindFeatureNeighbors"
    }

    pub fn human_label(&self) -> &str {
        "Find Feature Neighbors"
    }

    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with(FEATURE_IDS, self.feature_ids.clone())
            .with(FEATURE_MATRIX, self.feature_matrix.clone())
            .with(NEIGHBOR_LIST, self.neighbor_list.as_str())
            .with(NUM_NEIGHBORS, self.num_neighbors.as_str())
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(path) = params.get_path(FEATURE_IDS)? {
            self.feature_ids = path;
        }
        if let Some(path) = params.get_path(FEATURE_MATRIX)? {
            self.feature_matrix = path.matrix_path();
        }
        if let Some(name) = params.get_string(NEIGHBOR_LIST)? {
            self.neighbor_list = name;
        }
        if let Some(name) = params.get_string(NUM_NEIGHBORS)? {
            self.num_neighbors = name;
        }
        Ok(())
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.resolve(registry, ctx)?;
        Ok(())
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        let Some(resolved) = self.resolve(registry, ctx)? else {
            return Ok(());
        };
        let Some(geometry) = registry
            .container(&self.feature_ids.container)
            .and_then(|c| c.get_geometry::<ImageGeom>())
            .cloned()
        else {
            return Err(ArrayFlowError::StaleReference);
        };

        let ids_shared = resolved.ids.lock()?;
        let ids_guard = ids_shared.read();
        let ids = ids_guard.try_view::<i32>()?.as_slice();

        let feature_count = feature_count(ids)?;
        if let Some(matrix) = registry.matrix_mut(&self.feature_matrix) {
            if matrix.tuple_count() < feature_count {
                tracing::debug!(
                    matrix = %self.feature_matrix,
                    features = feature_count,
                    "Resizing feature matrix"
                );
                matrix.resize_tuples(&[feature_count])?;
            }
        }
        let features = registry
            .matrix(&self.feature_matrix)
            .map_or(feature_count, |m| m.tuple_count());

        ctx.notify_status(format!(
            "Finding neighbors of {} features over {} voxels",
            feature_count - 1,
            resolved.voxels
        ));
        let neighbors = face_neighbors(&geometry, ids, features, ctx)?;

        let list_ref = registry.resolve_or_create_neighbor_list::<i32>(ctx, &self.neighbor_list_path());
        let count_ref = registry.resolve_or_create::<i32>(ctx, &self.num_neighbors_path(), &[1], 0);
        if list_ref.is_empty() || count_ref.is_empty() {
            return Ok(());
        }

        let list_shared = list_ref.lock()?;
        let count_shared = count_ref.lock()?;
        let mut lists = list_shared.write();
        let mut counts = count_shared.write();
        let mut counts = counts.try_view_mut::<i32>()?;
        let counts = counts.as_mut_slice();
        for (feature, set) in neighbors.into_iter().enumerate() {
            counts[feature] = i32::try_from(set.len()).unwrap_or(i32::MAX);
            lists.set_list(feature, set.into_iter().collect::<Vec<i32>>())?;
        }
        Ok(())
    }

    fn neighbor_list_path(&self) -> ArrayPath {
        self.feature_matrix.with_array(self.neighbor_list.as_str())
    }

    fn num_neighbors_path(&self) -> ArrayPath {
        self.feature_matrix.with_array(self.num_neighbors.as_str())
    }

    fn resolve(&self, registry: &mut Registry, ctx: &mut StageContext) -> Result<Option<Resolved>> {
        if self.neighbor_list.is_empty()
            || self.num_neighbors.is_empty()
            || self.neighbor_list == self.num_neighbors
        {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' and '{}' must be distinct, non-empty names",
                NEIGHBOR_LIST, NUM_NEIGHBORS
            )));
        }
        if self.feature_matrix == self.feature_ids.matrix_path() {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' must not be the matrix holding '{}'",
                FEATURE_MATRIX, FEATURE_IDS
            )));
        }

        let voxels = match registry.resolve_required_geometry::<ImageGeom>(ctx, &self.feature_ids) {
            Some(geometry) => Some(geometry.checked_voxel_count().ok_or_else(|| {
                ArrayFlowError::Parameter(format!(
                    "image dimensions {:?} of '{}' overflow the voxel count",
                    geometry.dims, self.feature_ids.container
                ))
            })?),
            None => None,
        };
        let ids = registry.resolve_required_as::<i32>(ctx, &self.feature_ids, &[1]);
        let matrix_ok = registry
            .resolve_required_matrix(ctx, &self.feature_matrix, &[MatrixCategory::CellFeature])
            .is_some();
        let (Some(voxels), false, true) = (voxels, ids.is_empty(), matrix_ok) else {
            return Ok(None);
        };

        let tuples = ids.tuple_count().unwrap_or(0);
        if tuples != voxels {
            ctx.record_error(ArrayFlowError::TupleCountMismatch {
                name: self.feature_ids.to_string(),
                expected: voxels,
                found: tuples,
            });
            return Ok(None);
        }

        let list = registry.resolve_or_create_neighbor_list::<i32>(ctx, &self.neighbor_list_path());
        let count = registry.resolve_or_create::<i32>(ctx, &self.num_neighbors_path(), &[1], 0);
        if list.is_empty() || count.is_empty() {
            return Ok(None);
        }
        Ok(Some(Resolved { voxels, ids }))
    }
}

/// `max(id) + 1`, at least 1. Negative ids are an error.
fn feature_count(ids: &[i32]) -> Result<usize> {
    let mut max = 0i32;
    for (voxel, &id) in ids.iter().enumerate() {
        if id < 0 {
            return Err(ArrayFlowError::StageComputation(format!(
                "voxel {} has negative feature id {}",
                voxel, id
            )));
        }
        max = max.max(id);
    }
    Ok(max as usize + 1)
}

fn face_neighbors(
    geometry: &ImageGeom,
    ids: &[i32],
    features: usize,
    ctx: &mut StageContext,
) -> Result<Vec<BTreeSet<i32>>> {
    let mut neighbors = vec![BTreeSet::new(); features];
    let plane = (geometry.dims[0] * geometry.dims[1]).max(1);
    let slices = geometry.dims[2];

    for z in 0..slices {
        ctx.check_cancelled()?;
        for voxel in z * plane..((z + 1) * plane).min(ids.len()) {
            let id = ids[voxel];
            if id <= 0 {
                continue;
            }
            for other in geometry.face_neighbors(voxel) {
                let other_id = ids[other];
                if other_id > 0 && other_id != id {
                    neighbors[id as usize].insert(other_id);
                }
            }
        }
        ctx.notify_progress(z + 1, slices);
    }
    Ok(neighbors)
}
