//! Data containers: named attribute matrices plus an optional geometry.

use crate::error::{ArrayFlowError, Result};
use crate::store::geometry::{Geometry, GeometryType};
use crate::store::matrix::{AttributeMatrix, MatrixCategory};
use crate::store::path::ArrayPath;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct DataContainer {
    name: String,
    matrices: IndexMap<String, AttributeMatrix>,
    geometry: Option<Geometry>,
}

impl DataContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matrices: IndexMap::new(),
            geometry: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Create a new matrix. Fails with `DuplicateName` if one already exists.
    pub fn create_attribute_matrix(
        &mut self,
        name: &str,
        tuple_dims: &[usize],
        category: MatrixCategory,
    ) -> Result<&mut AttributeMatrix> {
        ArrayPath::matrix(self.name.as_str(), name).validate_matrix()?;
        if self.matrices.contains_key(name) {
            return Err(ArrayFlowError::DuplicateName(format!("{}|{}", self.name, name)));
        }
        Ok(self.insert_matrix(AttributeMatrix::new(name, tuple_dims, category)))
    }

    /// Return the named matrix, creating it with the given shape if absent.
    /// An existing matrix is returned unchanged.
    pub fn create_attribute_matrix_if_absent(
        &mut self,
        name: &str,
        tuple_dims: &[usize],
        category: MatrixCategory,
    ) -> &mut AttributeMatrix {
        self.matrices
            .entry(name.to_string())
            .or_insert_with(|| AttributeMatrix::new(name, tuple_dims, category))
    }

    /// Add a matrix under its own name, returning any matrix it replaced.
    pub fn add_attribute_matrix(&mut self, matrix: AttributeMatrix) -> Option<AttributeMatrix> {
        self.matrices.insert(matrix.name().to_string(), matrix)
    }

    pub fn get_attribute_matrix(&self, name: &str) -> Option<&AttributeMatrix> {
        self.matrices.get(name)
    }

    pub fn get_attribute_matrix_mut(&mut self, name: &str) -> Option<&mut AttributeMatrix> {
        self.matrices.get_mut(name)
    }

    pub fn contains_attribute_matrix(&self, name: &str) -> bool {
        self.matrices.contains_key(name)
    }

    pub fn remove_attribute_matrix(&mut self, name: &str) -> Option<AttributeMatrix> {
        self.matrices.shift_remove(name)
    }

    pub fn rename_attribute_matrix(&mut self, old: &str, new: &str) -> Result<()> {
        ArrayPath::matrix(self.name.as_str(), new).validate_matrix()?;
        if old == new {
            return Ok(());
        }
        if self.matrices.contains_key(new) {
            return Err(ArrayFlowError::DuplicateName(format!("{}|{}", self.name, new)));
        }
        let Some(index) = self.matrices.get_index_of(old) else {
            return Err(ArrayFlowError::MissingAttributeMatrix {
                container: self.name.clone(),
                matrix: old.to_string(),
            });
        };
        if let Some((_, mut matrix)) = self.matrices.shift_remove_index(index) {
            matrix.set_name(new);
            let (last, _) = self.matrices.insert_full(new.to_string(), matrix);
            self.matrices.move_index(last, index.min(last));
        }
        Ok(())
    }

    /// Matrix names in insertion order.
    pub fn attribute_matrix_names(&self) -> Vec<String> {
        self.matrices.keys().cloned().collect()
    }

    pub fn attribute_matrices(&self) -> impl Iterator<Item = &AttributeMatrix> {
        self.matrices.values()
    }

    /// Path of every array in every matrix, in insertion order.
    pub fn all_array_paths(&self) -> Vec<ArrayPath> {
        self.matrices
            .values()
            .flat_map(|matrix| {
                matrix
                    .names()
                    .into_iter()
                    .map(move |array| ArrayPath::new(self.name.as_str(), matrix.name(), array))
            })
            .collect()
    }

    pub fn set_geometry(&mut self, geometry: impl Into<Geometry>) {
        self.geometry = Some(geometry.into());
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// The attached geometry, if it is a `G`.
    pub fn get_geometry<G: GeometryType>(&self) -> Option<&G> {
        self.geometry.as_ref().and_then(G::from_geometry)
    }

    pub fn get_geometry_mut<G: GeometryType>(&mut self) -> Option<&mut G> {
        self.geometry.as_mut().and_then(G::from_geometry_mut)
    }

    pub fn clear_geometry(&mut self) -> Option<Geometry> {
        self.geometry.take()
    }

    pub fn deep_copy(&self) -> Self {
        self.map_matrices(AttributeMatrix::deep_copy)
    }

    pub fn structure_copy(&self) -> Self {
        self.map_matrices(AttributeMatrix::structure_copy)
    }

    fn map_matrices(&self, f: impl Fn(&AttributeMatrix) -> AttributeMatrix) -> Self {
        Self {
            name: self.name.clone(),
            matrices: self
                .matrices
                .iter()
                .map(|(name, matrix)| (name.clone(), f(matrix)))
                .collect(),
            geometry: self.geometry.clone(),
        }
    }

    fn insert_matrix(&mut self, matrix: AttributeMatrix) -> &mut AttributeMatrix {
        let (index, _) = self.matrices.insert_full(matrix.name().to_string(), matrix);
        &mut self.matrices[index]
    }
}
