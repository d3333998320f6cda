//! The registry and its path-resolution families.
//!
//! Every stage receives the [`Registry`] and addresses data through
//! [`ArrayPath`]s. Two families of lookups mirror the two intents a stage
//! can have:
//!
//! - **Required** (`resolve_required*`): the object must exist with the
//!   expected shape. Failures are recorded in the caller's [`StatusSink`]
//!   and an empty reference (or `None`) is returned.
//! - **Produced** (`resolve_or_create*`): missing containers and matrices
//!   are created, a matching array is reused, and an array with a different
//!   type, layout or component shape is replaced. Only malformed paths and
//!   allocation failures are errors.
//!
//! Neither family returns `Err`; the stage's error register is the single
//! place failures land.

use crate::error::{ArrayFlowError, Result};
use crate::store::array::{ArrayLayout, NamedArray, SharedArray};
use crate::store::container::DataContainer;
use crate::store::geometry::GeometryType;
use crate::store::matrix::{AttributeMatrix, MatrixCategory};
use crate::store::path::ArrayPath;
use crate::types::{Element, ElementType};
use indexmap::IndexMap;
use std::fmt;
use std::sync::{RwLock, Weak};

/// Where resolution failures are reported.
///
/// Implemented by the stage context during a pipeline run and by
/// [`StageStatus`](crate::pipeline::StageStatus) for direct use.
pub trait StatusSink {
    fn record_error(&mut self, error: ArrayFlowError);

    /// Whether produced arrays should get storage now. Preflight answers
    /// `false` so outputs are only declared.
    fn allocate_outputs(&self) -> bool {
        true
    }
}

/// Weak handle to a registry array.
///
/// Empty when resolution failed, and also once the array has been replaced
/// or its matrix removed. Re-resolve at the start of every phase.
#[derive(Debug, Clone, Default)]
pub struct ArrayRef {
    path: ArrayPath,
    inner: Weak<RwLock<NamedArray>>,
}

impl ArrayRef {
    pub fn empty(path: ArrayPath) -> Self {
        Self {
            path,
            inner: Weak::new(),
        }
    }

    fn new(path: ArrayPath, array: &SharedArray) -> Self {
        Self {
            path,
            inner: array.downgrade(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.strong_count() == 0
    }

    pub fn path(&self) -> &ArrayPath {
        &self.path
    }

    /// Upgrade to a strong handle, failing with `StaleReference` if empty.
    pub fn lock(&self) -> Result<SharedArray> {
        self.inner
            .upgrade()
            .map(SharedArray::from_arc)
            .ok_or(ArrayFlowError::StaleReference)
    }

    pub fn tuple_count(&self) -> Option<usize> {
        self.lock().ok().map(|array| array.read().tuple_count())
    }

    pub fn element_type(&self) -> Option<ElementType> {
        self.lock().ok().map(|array| array.read().element_type())
    }

    pub fn component_dims(&self) -> Option<Vec<usize>> {
        self.lock()
            .ok()
            .map(|array| array.read().component_dims().to_vec())
    }
}

/// Shape summary of one array, as reported by [`Registry::describe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDescription {
    pub path: ArrayPath,
    pub element_type: ElementType,
    pub layout: ArrayLayout,
    pub component_dims: Vec<usize>,
    pub tuple_count: usize,
}

impl fmt::Display for ArrayDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:?} components={:?} tuples={}",
            self.path, self.element_type, self.layout, self.component_dims, self.tuple_count
        )
    }
}

/// Top-level collection of data containers, in insertion order.
#[derive(Debug, Default)]
pub struct Registry {
    containers: IndexMap<String, DataContainer>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    // ── Containers ──

    /// Add a container under its own name.
    pub fn add_container(&mut self, container: DataContainer) -> Result<()> {
        ArrayPath::container(container.name()).validate_container()?;
        if self.containers.contains_key(container.name()) {
            return Err(ArrayFlowError::DuplicateName(container.name().to_string()));
        }
        self.containers
            .insert(container.name().to_string(), container);
        Ok(())
    }

    /// Create an empty container. Fails on an empty or duplicate name.
    pub fn create_container(&mut self, name: &str) -> Result<&mut DataContainer> {
        self.add_container(DataContainer::new(name))?;
        self.containers
            .get_mut(name)
            .ok_or_else(|| ArrayFlowError::MissingContainer(name.to_string()))
    }

    pub fn container(&self, name: &str) -> Option<&DataContainer> {
        self.containers.get(name)
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut DataContainer> {
        self.containers.get_mut(name)
    }

    pub fn containers(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers.values()
    }

    pub fn remove_container(&mut self, name: &str) -> Option<DataContainer> {
        self.containers.shift_remove(name)
    }

    pub fn rename_container(&mut self, old: &str, new: &str) -> Result<()> {
        ArrayPath::container(new).validate_container()?;
        if old == new {
            return Ok(());
        }
        if self.containers.contains_key(new) {
            return Err(ArrayFlowError::DuplicateName(new.to_string()));
        }
        let index = self
            .containers
            .get_index_of(old)
            .ok_or_else(|| ArrayFlowError::MissingContainer(old.to_string()))?;
        if let Some((_, mut container)) = self.containers.shift_remove_index(index) {
            container.set_name(new);
            let (last, _) = self.containers.insert_full(new.to_string(), container);
            self.containers.move_index(last, index.min(last));
        }
        Ok(())
    }

    /// Deep-copy container `source` under the name `new`.
    pub fn duplicate_container(&mut self, source: &str, new: &str) -> Result<()> {
        let mut copy = self
            .containers
            .get(source)
            .ok_or_else(|| ArrayFlowError::MissingContainer(source.to_string()))?
            .deep_copy();
        copy.set_name(new);
        self.add_container(copy)
    }

    /// Container names in insertion order.
    pub fn container_names(&self) -> Vec<String> {
        self.containers.keys().cloned().collect()
    }

    // ── Plain lookups ──

    pub fn contains_container(&self, path: &ArrayPath) -> bool {
        self.containers.contains_key(&path.container)
    }

    pub fn contains_matrix(&self, path: &ArrayPath) -> bool {
        self.matrix(path).is_some()
    }

    pub fn contains_array(&self, path: &ArrayPath) -> bool {
        self.matrix(path)
            .is_some_and(|matrix| matrix.contains(&path.array))
    }

    pub fn matrix(&self, path: &ArrayPath) -> Option<&AttributeMatrix> {
        self.containers
            .get(&path.container)?
            .get_attribute_matrix(&path.matrix)
    }

    pub fn matrix_mut(&mut self, path: &ArrayPath) -> Option<&mut AttributeMatrix> {
        self.containers
            .get_mut(&path.container)?
            .get_attribute_matrix_mut(&path.matrix)
    }

    /// Strong handle to the array at `path`, or the `Missing*` error
    /// naming the first part that does not exist.
    pub fn array(&self, path: &ArrayPath) -> Result<SharedArray> {
        path.validate_array()?;
        let matrix = self.existing_matrix(path)?;
        matrix
            .get(&path.array)
            .cloned()
            .ok_or_else(|| ArrayFlowError::MissingArray {
                matrix: path.matrix_path().to_string(),
                array: path.array.clone(),
            })
    }

    // ── Required resolution ──

    /// Resolve an existing array of any element type.
    ///
    /// An empty `component_dims` accepts any component shape.
    pub fn resolve_required(
        &self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        component_dims: &[usize],
    ) -> ArrayRef {
        self.record(sink, path, self.required_array(path, None, component_dims))
    }

    /// Resolve an existing array whose element type must be `T`.
    pub fn resolve_required_as<T: Element>(
        &self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        component_dims: &[usize],
    ) -> ArrayRef {
        self.record(sink, path, self.required_array(path, Some(T::TYPE), component_dims))
    }

    pub fn resolve_required_container(
        &self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
    ) -> Option<&DataContainer> {
        match self.existing_container(path) {
            Ok(container) => Some(container),
            Err(error) => {
                sink.record_error(error);
                None
            }
        }
    }

    /// Resolve an existing matrix. An empty `allowed` list accepts any category.
    pub fn resolve_required_matrix(
        &self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        allowed: &[MatrixCategory],
    ) -> Option<&AttributeMatrix> {
        match self.checked_matrix(path, allowed) {
            Ok(matrix) => Some(matrix),
            Err(error) => {
                sink.record_error(error);
                None
            }
        }
    }

    pub fn resolve_required_matrix_mut(
        &mut self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        allowed: &[MatrixCategory],
    ) -> Option<&mut AttributeMatrix> {
        if let Err(error) = self.checked_matrix(path, allowed) {
            sink.record_error(error);
            return None;
        }
        self.matrix_mut(path)
    }

    /// Resolve the geometry of `path.container` as a `G`.
    ///
    /// Records `GeometryTypeMismatch` when the container has no geometry or
    /// a different kind.
    pub fn resolve_required_geometry<G: GeometryType>(
        &self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
    ) -> Option<&G> {
        let container = self.resolve_required_container(sink, path)?;
        match container.get_geometry::<G>() {
            Some(geometry) => Some(geometry),
            None => {
                sink.record_error(ArrayFlowError::GeometryTypeMismatch {
                    container: container.name().to_string(),
                    expected: G::NAME.to_string(),
                    found: container
                        .geometry()
                        .map_or("no", |geometry| geometry.type_name())
                        .to_string(),
                });
                None
            }
        }
    }

    /// Check that every array in `paths` exists and all share one tuple count.
    pub fn validate_tuple_counts(&self, sink: &mut dyn StatusSink, paths: &[ArrayPath]) -> bool {
        let mut expected: Option<(usize, &ArrayPath)> = None;
        let mut valid = true;
        for path in paths {
            let array = match self.array(path) {
                Ok(array) => array,
                Err(error) => {
                    sink.record_error(error);
                    valid = false;
                    continue;
                }
            };
            let found = array.read().tuple_count();
            match expected {
                None => expected = Some((found, path)),
                Some((count, first)) if count != found => {
                    sink.record_error(ArrayFlowError::TupleCountMismatch {
                        name: format!("{} vs {}", path, first),
                        expected: count,
                        found,
                    });
                    valid = false;
                }
                Some(_) => {}
            }
        }
        valid
    }

    // ── Produced resolution ──

    pub fn resolve_or_create_container(
        &mut self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
    ) -> Option<&mut DataContainer> {
        if let Err(error) = path.validate_container() {
            sink.record_error(error);
            return None;
        }
        Some(self.container_entry(&path.container))
    }

    /// Return the matrix at `path`, creating container and matrix as needed.
    ///
    /// An existing matrix is resized to `tuple_dims` and takes `category`.
    pub fn resolve_or_create_matrix(
        &mut self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        tuple_dims: &[usize],
        category: MatrixCategory,
    ) -> Option<&mut AttributeMatrix> {
        if let Err(error) = path.validate_matrix() {
            sink.record_error(error);
            return None;
        }
        let container = self.container_entry(&path.container);
        if !container.contains_attribute_matrix(&path.matrix) {
            tracing::debug!(path = %path, ?tuple_dims, %category, "Creating attribute matrix");
        }
        let matrix = container.create_attribute_matrix_if_absent(&path.matrix, tuple_dims, category);
        matrix.set_category(category);
        if matrix.tuple_dims() != tuple_dims {
            if let Err(error) = matrix.resize_tuples(tuple_dims) {
                sink.record_error(error);
                return None;
            }
        }
        Some(matrix)
    }

    /// Resolve or create a dense array of `T` filled with `fill`.
    ///
    /// Missing containers and matrices are created; a new matrix starts
    /// with zero tuples and the `Generic` category.
    pub fn resolve_or_create<T: Element>(
        &mut self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        component_dims: &[usize],
        fill: T,
    ) -> ArrayRef {
        let allocate = sink.allocate_outputs();
        let produced = self.produce(path, ArrayLayout::Dense, component_dims, fill, allocate);
        self.record(sink, path, produced)
    }

    /// [`Registry::resolve_or_create`] with the element type chosen at runtime
    /// and a default fill.
    pub fn resolve_or_create_dyn(
        &mut self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        element_type: ElementType,
        component_dims: &[usize],
    ) -> ArrayRef {
        crate::with_element_type!(element_type, T => {
            self.resolve_or_create::<T>(sink, path, component_dims, T::default())
        })
    }

    /// Resolve or create a neighbor-list array of `T`.
    pub fn resolve_or_create_neighbor_list<T: Element>(
        &mut self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
    ) -> ArrayRef {
        let allocate = sink.allocate_outputs();
        let produced = self.produce(path, ArrayLayout::NeighborList, &[1], T::default(), allocate);
        self.record(sink, path, produced)
    }

    // ── Whole-registry operations ──

    /// Mirror of the registry with every array declared but unallocated.
    pub fn structure_copy(&self) -> Self {
        self.map_containers(DataContainer::structure_copy)
    }

    pub fn deep_copy(&self) -> Self {
        self.map_containers(DataContainer::deep_copy)
    }

    /// Every array's path and shape, in container, matrix and array order.
    pub fn describe(&self) -> Vec<ArrayDescription> {
        let mut out = Vec::new();
        for container in self.containers.values() {
            for matrix in container.attribute_matrices() {
                for (name, array) in matrix.iter() {
                    let array = array.read();
                    out.push(ArrayDescription {
                        path: ArrayPath::new(container.name(), matrix.name(), name),
                        element_type: array.element_type(),
                        layout: array.layout(),
                        component_dims: array.component_dims().to_vec(),
                        tuple_count: array.tuple_count(),
                    });
                }
            }
        }
        out
    }

    // ── Internals ──

    fn record(
        &self,
        sink: &mut dyn StatusSink,
        path: &ArrayPath,
        outcome: Result<SharedArray>,
    ) -> ArrayRef {
        match outcome {
            Ok(array) => ArrayRef::new(path.clone(), &array),
            Err(error) => {
                sink.record_error(error);
                ArrayRef::empty(path.clone())
            }
        }
    }

    fn existing_container(&self, path: &ArrayPath) -> Result<&DataContainer> {
        path.validate_container()?;
        self.containers
            .get(&path.container)
            .ok_or_else(|| ArrayFlowError::MissingContainer(path.container.clone()))
    }

    fn existing_matrix(&self, path: &ArrayPath) -> Result<&AttributeMatrix> {
        path.validate_matrix()?;
        self.existing_container(path)?
            .get_attribute_matrix(&path.matrix)
            .ok_or_else(|| ArrayFlowError::MissingAttributeMatrix {
                container: path.container.clone(),
                matrix: path.matrix.clone(),
            })
    }

    fn checked_matrix(&self, path: &ArrayPath, allowed: &[MatrixCategory]) -> Result<&AttributeMatrix> {
        let matrix = self.existing_matrix(path)?;
        if !allowed.is_empty() && !allowed.contains(&matrix.category()) {
            return Err(ArrayFlowError::ShapeMismatch {
                name: path.matrix_path().to_string(),
                message: format!(
                    "category {} is not one of {:?}",
                    matrix.category(),
                    allowed
                ),
            });
        }
        Ok(matrix)
    }

    fn required_array(
        &self,
        path: &ArrayPath,
        element_type: Option<ElementType>,
        component_dims: &[usize],
    ) -> Result<SharedArray> {
        let shared = self.array(path)?;
        {
            let array = shared.read();
            if !component_dims.is_empty() && array.component_dims() != component_dims {
                return Err(ArrayFlowError::ShapeMismatch {
                    name: path.to_string(),
                    message: format!(
                        "expected component dimensions {:?}, found {:?}",
                        component_dims,
                        array.component_dims()
                    ),
                });
            }
            if let Some(expected) = element_type {
                if array.element_type() != expected {
                    return Err(ArrayFlowError::ShapeMismatch {
                        name: path.to_string(),
                        message: format!(
                            "expected element type {}, found {}",
                            expected,
                            array.element_type()
                        ),
                    });
                }
            }
        }
        Ok(shared)
    }

    fn container_entry(&mut self, name: &str) -> &mut DataContainer {
        self.containers.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(container = name, "Creating data container");
            DataContainer::new(name)
        })
    }

    fn produce<T: Element>(
        &mut self,
        path: &ArrayPath,
        layout: ArrayLayout,
        component_dims: &[usize],
        fill: T,
        allocate: bool,
    ) -> Result<SharedArray> {
        path.validate_array()?;
        let dims: Vec<usize> = match layout {
            ArrayLayout::NeighborList => vec![1],
            ArrayLayout::Dense if component_dims.is_empty() => vec![1],
            ArrayLayout::Dense => component_dims.to_vec(),
        };

        let matrix = self
            .container_entry(&path.container)
            .create_attribute_matrix_if_absent(&path.matrix, &[0], MatrixCategory::Generic);

        if let Some(existing) = matrix.get(&path.array) {
            let reusable = existing.read().same_shape(T::TYPE, layout, &dims);
            if reusable {
                let existing = existing.clone();
                let needs_storage = allocate && !existing.read().is_allocated();
                if needs_storage {
                    existing.write().allocate(fill)?;
                }
                return Ok(existing);
            }
            tracing::debug!(path = %path, "Replacing array with a different shape");
        }

        let tuples = matrix.tuple_count();
        let mut array = match layout {
            ArrayLayout::Dense => NamedArray::declare(T::TYPE, path.array.as_str(), tuples, &dims),
            ArrayLayout::NeighborList => {
                NamedArray::declare_neighbor_list(T::TYPE, path.array.as_str(), tuples)
            }
        };
        if allocate {
            array.allocate(fill)?;
        }
        matrix.insert(path.array.as_str(), array)
    }

    fn map_containers(&self, f: impl Fn(&DataContainer) -> DataContainer) -> Self {
        Self {
            containers: self
                .containers
                .iter()
                .map(|(name, container)| (name.clone(), f(container)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::geometry::{ImageGeom, VertexGeom};

    #[derive(Default)]
    struct Collect {
        errors: Vec<ArrayFlowError>,
        declare_only: bool,
    }

    impl StatusSink for Collect {
        fn record_error(&mut self, error: ArrayFlowError) {
            self.errors.push(error);
        }

        fn allocate_outputs(&self) -> bool {
            !self.declare_only
        }
    }

    impl Collect {
        fn kinds(&self) -> Vec<ErrorKind> {
            self.errors.iter().map(ArrayFlowError::kind).collect()
        }
    }

    fn registry_with_cells(tuples: usize) -> Registry {
        let mut registry = Registry::new();
        registry
            .create_container("M")
            .unwrap()
            .create_attribute_matrix("cells", &[tuples], MatrixCategory::Cell)
            .unwrap();
        registry
    }

    #[test]
    fn test_create_then_require() {
        let mut registry = registry_with_cells(8);
        let mut sink = Collect::default();
        let path = ArrayPath::new("M", "cells", "ids");

        let created = registry.resolve_or_create::<i32>(&mut sink, &path, &[1], 0);
        assert!(!created.is_empty());

        let required = registry.resolve_required(&mut sink, &path, &[1]);
        assert!(sink.errors.is_empty());
        assert_eq!(required.tuple_count(), Some(8));
        assert_eq!(required.element_type(), Some(ElementType::Int32));
    }

    #[test]
    fn test_missing_parts() {
        let registry = registry_with_cells(8);
        let mut sink = Collect::default();

        let r = registry.resolve_required(&mut sink, &ArrayPath::new("X", "cells", "ids"), &[1]);
        assert!(r.is_empty());
        let r = registry.resolve_required(&mut sink, &ArrayPath::new("M", "grains", "ids"), &[1]);
        assert!(r.is_empty());
        let r = registry.resolve_required(&mut sink, &ArrayPath::new("M", "cells", "ids"), &[1]);
        assert!(r.is_empty());

        assert_eq!(
            sink.kinds(),
            vec![
                ErrorKind::MissingContainer,
                ErrorKind::MissingAttributeMatrix,
                ErrorKind::MissingArray
            ]
        );
    }

    #[test]
    fn test_required_shape_mismatch() {
        let mut registry = registry_with_cells(2);
        let mut sink = Collect::default();
        let path = ArrayPath::new("M", "cells", "quats");
        registry.resolve_or_create::<f32>(&mut sink, &path, &[4], 0.0);

        assert!(registry.resolve_required(&mut sink, &path, &[3]).is_empty());
        assert!(registry.resolve_required_as::<f64>(&mut sink, &path, &[4]).is_empty());
        assert!(!registry.resolve_required_as::<f32>(&mut sink, &path, &[4]).is_empty());
        assert!(!registry.resolve_required(&mut sink, &path, &[]).is_empty());
        assert_eq!(sink.kinds(), vec![ErrorKind::ShapeMismatch; 2]);
    }

    #[test]
    fn test_create_builds_missing_container_and_matrix() {
        let mut registry = Registry::new();
        let mut sink = Collect::default();
        let path = ArrayPath::new("New", "stuff", "values");
        let r = registry.resolve_or_create::<u8>(&mut sink, &path, &[2], 0);

        assert!(sink.errors.is_empty());
        assert!(!r.is_empty());
        let matrix = registry.matrix(&path).unwrap();
        assert_eq!(matrix.category(), MatrixCategory::Generic);
        assert_eq!(matrix.tuple_count(), 0);
    }

    #[test]
    fn test_create_reuses_and_replaces() {
        let mut registry = registry_with_cells(3);
        let mut sink = Collect::default();
        let path = ArrayPath::new("M", "cells", "v");

        let first = registry.resolve_or_create::<i32>(&mut sink, &path, &[1], 5);
        let again = registry.resolve_or_create::<i32>(&mut sink, &path, &[1], 9);
        assert!(first.lock().unwrap().ptr_eq(&again.lock().unwrap()));
        // reuse keeps existing contents
        assert_eq!(
            again.lock().unwrap().read().view::<i32>().unwrap().as_slice(),
            &[5, 5, 5]
        );

        let replaced = registry.resolve_or_create::<f64>(&mut sink, &path, &[1], 0.0);
        assert!(first.is_empty());
        assert_eq!(replaced.element_type(), Some(ElementType::Float64));
        assert_eq!(registry.matrix(&path).unwrap().len(), 1);
        assert!(sink.errors.is_empty());
    }

    #[test]
    fn test_create_rejects_malformed_path() {
        let mut registry = Registry::new();
        let mut sink = Collect::default();
        let r = registry.resolve_or_create::<i32>(&mut sink, &ArrayPath::new("M", "", "x"), &[1], 0);
        assert!(r.is_empty());
        assert_eq!(sink.kinds(), vec![ErrorKind::InvalidPath]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_declare_only_sink() {
        let mut registry = registry_with_cells(1000);
        let mut sink = Collect {
            declare_only: true,
            ..Default::default()
        };
        let path = ArrayPath::new("M", "cells", "big");
        let r = registry.resolve_or_create_dyn(&mut sink, &path, ElementType::Float64, &[3]);
        let array = r.lock().unwrap();
        assert!(!array.read().is_allocated());
        assert_eq!(array.read().tuple_count(), 1000);

        // execute-phase resolution materializes the declared array
        sink.declare_only = false;
        let r = registry.resolve_or_create_dyn(&mut sink, &path, ElementType::Float64, &[3]);
        assert!(r.lock().unwrap().read().is_allocated());
    }

    #[test]
    fn test_resolve_or_create_matrix_resizes() {
        let mut registry = registry_with_cells(2);
        let mut sink = Collect::default();
        let path = ArrayPath::new("M", "cells", "a");
        registry.resolve_or_create::<u8>(&mut sink, &path, &[1], 1);

        let matrix = registry
            .resolve_or_create_matrix(&mut sink, &path.matrix_path(), &[5], MatrixCategory::Cell)
            .unwrap();
        assert_eq!(matrix.tuple_count(), 5);
        let view_len = matrix.get("a").unwrap().read().view::<u8>().unwrap().as_slice().len();
        assert_eq!(view_len, 5);
    }

    #[test]
    fn test_required_matrix_category() {
        let registry = registry_with_cells(2);
        let mut sink = Collect::default();
        let path = ArrayPath::matrix("M", "cells");
        assert!(registry
            .resolve_required_matrix(&mut sink, &path, &[MatrixCategory::Cell])
            .is_some());
        assert!(registry
            .resolve_required_matrix(&mut sink, &path, &[MatrixCategory::CellFeature])
            .is_none());
        assert_eq!(sink.kinds(), vec![ErrorKind::ShapeMismatch]);
    }

    #[test]
    fn test_required_geometry() {
        let mut registry = registry_with_cells(8);
        let mut sink = Collect::default();
        let path = ArrayPath::container("M");
        assert!(registry.resolve_required_geometry::<ImageGeom>(&mut sink, &path).is_none());

        registry
            .container_mut("M")
            .unwrap()
            .set_geometry(ImageGeom::new([2, 2, 2]));
        assert!(registry.resolve_required_geometry::<ImageGeom>(&mut sink, &path).is_some());
        assert!(registry.resolve_required_geometry::<VertexGeom>(&mut sink, &path).is_none());
        assert_eq!(sink.kinds(), vec![ErrorKind::GeometryTypeMismatch; 2]);
    }

    #[test]
    fn test_validate_tuple_counts() {
        let mut registry = registry_with_cells(4);
        let mut sink = Collect::default();
        registry
            .container_mut("M")
            .unwrap()
            .create_attribute_matrix("grains", &[3], MatrixCategory::CellFeature)
            .unwrap();
        let a = ArrayPath::new("M", "cells", "a");
        let b = ArrayPath::new("M", "cells", "b");
        let g = ArrayPath::new("M", "grains", "g");
        registry.resolve_or_create::<u8>(&mut sink, &a, &[1], 0);
        registry.resolve_or_create::<u8>(&mut sink, &b, &[1], 0);
        registry.resolve_or_create::<u8>(&mut sink, &g, &[1], 0);

        assert!(registry.validate_tuple_counts(&mut sink, &[a.clone(), b]));
        assert!(!registry.validate_tuple_counts(&mut sink, &[a, g]));
        assert_eq!(sink.kinds(), vec![ErrorKind::TupleCountMismatch]);
    }

    #[test]
    fn test_weak_ref_observes_matrix_removal() {
        let mut registry = registry_with_cells(2);
        let mut sink = Collect::default();
        let path = ArrayPath::new("M", "cells", "a");
        let r = registry.resolve_or_create::<u8>(&mut sink, &path, &[1], 0);
        assert!(!r.is_empty());

        registry.container_mut("M").unwrap().remove_attribute_matrix("cells");
        assert!(r.is_empty());
        assert!(matches!(r.lock(), Err(ArrayFlowError::StaleReference)));
    }

    #[test]
    fn test_container_management() {
        let mut registry = Registry::new();
        registry.create_container("A").unwrap();
        registry.create_container("B").unwrap();
        assert!(matches!(
            registry.create_container("A"),
            Err(ArrayFlowError::DuplicateName(_))
        ));
        assert!(registry.create_container("").is_err());

        registry.rename_container("A", "C").unwrap();
        assert_eq!(registry.container_names(), vec!["C", "B"]);
        assert_eq!(registry.container("C").unwrap().name(), "C");

        registry.duplicate_container("B", "D").unwrap();
        assert_eq!(registry.container_names(), vec!["C", "B", "D"]);
        assert!(registry.remove_container("B").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_structure_copy_and_describe() {
        let mut registry = registry_with_cells(4);
        let mut sink = Collect::default();
        registry.resolve_or_create::<f32>(&mut sink, &ArrayPath::new("M", "cells", "x"), &[3], 1.0);
        registry.resolve_or_create_neighbor_list::<i32>(&mut sink, &ArrayPath::new("M", "cells", "n"));

        let copy = registry.structure_copy();
        assert_eq!(copy.describe(), registry.describe());
        let array = copy.array(&ArrayPath::new("M", "cells", "x")).unwrap();
        assert!(!array.read().is_allocated());
        assert_eq!(registry.describe()[1].layout, ArrayLayout::NeighborList);
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
        assert_send_sync::<ArrayRef>();
    }
}
