//! Test data builders for registries and matrices

use arrayflow::store::{AttributeMatrix, ImageGeom, MatrixCategory, NamedArray, Registry};
use arrayflow::types::Element;

/// Builder for populated registries.
///
/// Containers are created on first mention; every call panics on failure
/// so tests read as plain setup.
#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(mut self, name: &str) -> Self {
        if self.registry.container(name).is_none() {
            self.registry.create_container(name).unwrap();
        }
        self
    }

    pub fn matrix(
        mut self,
        container: &str,
        matrix: &str,
        tuple_dims: &[usize],
        category: MatrixCategory,
    ) -> Self {
        self = self.container(container);
        self.registry
            .container_mut(container)
            .unwrap()
            .create_attribute_matrix(matrix, tuple_dims, category)
            .unwrap();
        self
    }

    /// Scalar array at `path` holding `values`. The matrix must exist.
    pub fn array<T: Element>(self, path: &str, values: &[T]) -> Self {
        self.array_with_components(path, &[1], values)
    }

    pub fn array_with_components<T: Element>(
        mut self,
        path: &str,
        component_dims: &[usize],
        values: &[T],
    ) -> Self {
        let path = super::path(path);
        let components: usize = component_dims.iter().product();
        let mut array =
            NamedArray::create::<T>(path.array.as_str(), values.len() / components, component_dims)
                .unwrap();
        array.view_mut::<T>().unwrap().as_mut_slice().copy_from_slice(values);
        self.registry
            .matrix_mut(&path.matrix_path())
            .unwrap()
            .insert(path.array.as_str(), array)
            .unwrap();
        self
    }

    pub fn image_geometry(mut self, container: &str, dims: [usize; 3]) -> Self {
        self = self.container(container);
        self.registry
            .container_mut(container)
            .unwrap()
            .set_geometry(ImageGeom::new(dims));
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

/// A `Cell` matrix named "cells" with one zeroed `f32` scalar array per name.
pub fn matrix_with(tuples: usize, names: &[&str]) -> AttributeMatrix {
    let mut matrix = AttributeMatrix::new("cells", &[tuples], MatrixCategory::Cell);
    for name in names {
        matrix
            .insert(*name, NamedArray::create::<f32>(*name, tuples, &[1]).unwrap())
            .unwrap();
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builder() {
        let registry = RegistryBuilder::new()
            .matrix("M", "cells", &[3], MatrixCategory::Cell)
            .array("M|cells|x", &[1i32, 2, 3])
            .build();
        assert_eq!(super::super::values::<i32>(&registry, "M|cells|x"), vec![1, 2, 3]);
    }

    #[test]
    fn test_matrix_with() {
        let matrix = matrix_with(4, &["a", "b"]);
        assert_eq!(matrix.names(), vec!["a", "b"]);
        assert_eq!(matrix.tuple_count(), 4);
    }
}
