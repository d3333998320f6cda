//! Attribute matrices: named arrays that share one tuple count.

use crate::error::{ArrayFlowError, Result};
use crate::store::array::{NamedArray, SharedArray};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Semantic granularity of the tuples in a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MatrixCategory {
    Vertex,
    Edge,
    Face,
    Cell,
    VertexFeature,
    EdgeFeature,
    FaceFeature,
    CellFeature,
    VertexEnsemble,
    EdgeEnsemble,
    FaceEnsemble,
    CellEnsemble,
    #[default]
    Generic,
}

impl MatrixCategory {
    /// One entry per geometric element (vertex, edge, face, cell).
    pub fn is_element(&self) -> bool {
        matches!(
            self,
            MatrixCategory::Vertex | MatrixCategory::Edge | MatrixCategory::Face | MatrixCategory::Cell
        )
    }

    pub fn is_feature(&self) -> bool {
        matches!(
            self,
            MatrixCategory::VertexFeature
                | MatrixCategory::EdgeFeature
                | MatrixCategory::FaceFeature
                | MatrixCategory::CellFeature
        )
    }

    pub fn is_ensemble(&self) -> bool {
        matches!(
            self,
            MatrixCategory::VertexEnsemble
                | MatrixCategory::EdgeEnsemble
                | MatrixCategory::FaceEnsemble
                | MatrixCategory::CellEnsemble
        )
    }
}

impl MatrixCategory {
    pub fn all() -> &'static [MatrixCategory] {
        &[
            MatrixCategory::Vertex,
            MatrixCategory::Edge,
            MatrixCategory::Face,
            MatrixCategory::Cell,
            MatrixCategory::VertexFeature,
            MatrixCategory::EdgeFeature,
            MatrixCategory::FaceFeature,
            MatrixCategory::CellFeature,
            MatrixCategory::VertexEnsemble,
            MatrixCategory::EdgeEnsemble,
            MatrixCategory::FaceEnsemble,
            MatrixCategory::CellEnsemble,
            MatrixCategory::Generic,
        ]
    }
}

impl std::fmt::Display for MatrixCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for MatrixCategory {
    type Err = String;

    /// Case-insensitive category name, e.g. `"CellFeature"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        MatrixCategory::all()
            .iter()
            .copied()
            .find(|category| category.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown attribute matrix category: {}", s))
    }
}

/// Result of [`AttributeMatrix::rename`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    OldDoesNotExist,
    Success,
    NewExists,
}

/// Ordered set of arrays with a shared tuple shape.
///
/// Every contained array reports the matrix's tuple count; [`insert`] and
/// [`resize_tuples`] keep that true.
///
/// [`insert`]: AttributeMatrix::insert
/// [`resize_tuples`]: AttributeMatrix::resize_tuples
#[derive(Debug, Clone)]
pub struct AttributeMatrix {
    name: String,
    category: MatrixCategory,
    tuple_dims: Vec<usize>,
    arrays: IndexMap<String, SharedArray>,
}

impl AttributeMatrix {
    /// Empty `tuple_dims` means zero tuples.
    pub fn new(name: impl Into<String>, tuple_dims: &[usize], category: MatrixCategory) -> Self {
        Self {
            name: name.into(),
            category,
            tuple_dims: normalize_dims(tuple_dims),
            arrays: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn category(&self) -> MatrixCategory {
        self.category
    }

    pub fn set_category(&mut self, category: MatrixCategory) {
        self.category = category;
    }

    pub fn tuple_dims(&self) -> &[usize] {
        &self.tuple_dims
    }

    pub fn tuple_count(&self) -> usize {
        self.tuple_dims.iter().product()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    /// Array names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.arrays.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&SharedArray> {
        self.arrays.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedArray)> {
        self.arrays.iter().map(|(name, array)| (name.as_str(), array))
    }

    /// Insert `array` under `name`, replacing any array already stored there.
    ///
    /// Fails with `TupleCountMismatch` and leaves the matrix untouched when
    /// the array's tuple count differs from the matrix's.
    pub fn insert(&mut self, name: impl Into<String>, mut array: NamedArray) -> Result<SharedArray> {
        let name = name.into();
        if array.tuple_count() != self.tuple_count() {
            return Err(ArrayFlowError::TupleCountMismatch {
                name,
                expected: self.tuple_count(),
                found: array.tuple_count(),
            });
        }
        array.rename(name.as_str());
        let shared = SharedArray::new(array);
        if self.arrays.insert(name.clone(), shared.clone()).is_some() {
            tracing::trace!(matrix = %self.name, array = %name, "Replaced array");
        }
        Ok(shared)
    }

    pub fn remove(&mut self, name: &str) -> Option<SharedArray> {
        self.arrays.shift_remove(name)
    }

    /// Rename an array in place, keeping its position.
    pub fn rename(&mut self, old: &str, new: &str, overwrite: bool) -> RenameOutcome {
        if !self.arrays.contains_key(old) {
            return RenameOutcome::OldDoesNotExist;
        }
        if old == new {
            return RenameOutcome::Success;
        }
        if self.arrays.contains_key(new) {
            if !overwrite {
                return RenameOutcome::NewExists;
            }
            self.arrays.shift_remove(new);
        }
        let Some(index) = self.arrays.get_index_of(old) else {
            return RenameOutcome::OldDoesNotExist;
        };
        let Some((_, array)) = self.arrays.shift_remove_index(index) else {
            return RenameOutcome::OldDoesNotExist;
        };
        array.write().rename(new);
        let (last, _) = self.arrays.insert_full(new.to_string(), array);
        self.arrays.move_index(last, index.min(last));
        RenameOutcome::Success
    }

    /// Change the tuple shape and resize every array to match.
    ///
    /// On failure every array is put back to its previous tuple count, so the
    /// matrix keeps its old shape.
    pub fn resize_tuples(&mut self, tuple_dims: &[usize]) -> Result<()> {
        let dims = normalize_dims(tuple_dims);
        let count = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                ArrayFlowError::Parameter(format!(
                    "tuple dims {:?} of '{}' overflow",
                    dims, self.name
                ))
            })?;

        let mut resized: Vec<(&SharedArray, usize)> = Vec::with_capacity(self.arrays.len());
        for array in self.arrays.values() {
            let mut guard = array.write();
            let previous = guard.tuple_count();
            if let Err(error) = guard.resize(count) {
                drop(guard);
                for (done, previous) in resized {
                    // Shrinking back to the old count never allocates.
                    if let Err(rollback) = done.write().resize(previous) {
                        tracing::error!(matrix = %self.name, "Resize rollback failed: {}", rollback);
                    }
                }
                return Err(error);
            }
            resized.push((array, previous));
        }
        self.tuple_dims = dims;
        Ok(())
    }

    /// Check that every array agrees with the matrix tuple count.
    pub fn validate_array_sizes(&self) -> Result<()> {
        let expected = self.tuple_count();
        for (name, array) in &self.arrays {
            let found = array.read().tuple_count();
            if found != expected {
                return Err(ArrayFlowError::TupleCountMismatch {
                    name: name.clone(),
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Remove the tuples whose `active` flag is false from every array.
    ///
    /// Tuple 0 is the reserved "no feature" slot and is always kept. Neighbor
    /// lists are dropped because their contents refer to the old numbering.
    /// When `element_ids` is given, each id is rewritten to the new index of
    /// its tuple, or 0 if that tuple was removed. An id outside `0..tuple_count`
    /// fails the call before anything is changed. Returns the new tuple count.
    pub fn remove_inactive_tuples(
        &mut self,
        active: &[bool],
        element_ids: Option<&mut [i32]>,
    ) -> Result<usize> {
        if !(self.category.is_feature() || self.category.is_ensemble()) {
            return Err(ArrayFlowError::StageComputation(format!(
                "attribute matrix '{}' has category {} and cannot be compacted",
                self.name, self.category
            )));
        }
        let total = self.tuple_count();
        if active.len() != total {
            return Err(ArrayFlowError::TupleCountMismatch {
                name: self.name.clone(),
                expected: total,
                found: active.len(),
            });
        }

        if let Some(ids) = element_ids.as_deref() {
            if let Some((cell, &id)) = ids
                .iter()
                .enumerate()
                .find(|&(_, &id)| usize::try_from(id).map_or(true, |id| id >= total))
            {
                return Err(ArrayFlowError::StageComputation(format!(
                    "element {} has id {} but '{}' only has {} tuples",
                    cell, id, self.name, total
                )));
            }
        }

        let mut new_ids = vec![0i32; total];
        let mut removed = Vec::new();
        let mut next = 0i32;
        for (index, &is_active) in active.iter().enumerate() {
            if index == 0 || is_active {
                new_ids[index] = next;
                next += 1;
            } else {
                removed.push(index);
            }
        }

        if let Some(ids) = element_ids {
            for id in ids.iter_mut() {
                if let Some(&renumbered) = usize::try_from(*id).ok().and_then(|old| new_ids.get(old)) {
                    *id = renumbered;
                }
            }
        }

        if removed.is_empty() {
            return Ok(total);
        }

        self.arrays.retain(|_, array| !array.read().is_neighbor_list());
        for array in self.arrays.values() {
            array.write().erase_tuples(&removed)?;
        }
        let remaining = total - removed.len();
        self.tuple_dims = vec![remaining];
        Ok(remaining)
    }

    /// Full copy with independently owned arrays.
    pub fn deep_copy(&self) -> Self {
        self.map_arrays(SharedArray::deep_copy)
    }

    /// Same shape and arrays, none of them allocated.
    pub fn structure_copy(&self) -> Self {
        self.map_arrays(|array| array.read().structure_copy())
    }

    fn map_arrays(&self, f: impl Fn(&SharedArray) -> NamedArray) -> Self {
        Self {
            name: self.name.clone(),
            category: self.category,
            tuple_dims: self.tuple_dims.clone(),
            arrays: self
                .arrays
                .iter()
                .map(|(name, array)| (name.clone(), SharedArray::new(f(array))))
                .collect(),
        }
    }
}

fn normalize_dims(dims: &[usize]) -> Vec<usize> {
    if dims.is_empty() {
        vec![0]
    } else {
        dims.to_vec()
    }
}
