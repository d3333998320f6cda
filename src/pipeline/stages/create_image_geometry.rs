//! CreateImageGeometry: attach a regular voxel grid to a data container.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::StageContext;
use crate::pipeline::stages::float_triple;
use crate::store::{ArrayPath, ImageGeom, MatrixCategory, Registry};

const CONTAINER: &str = "Container";
const DIMENSIONS: &str = "Dimensions";
const SPACING: &str = "Spacing";
const ORIGIN: &str = "Origin";
const CELL_MATRIX: &str = "CellMatrix";

/// Sets an [`ImageGeom`] on a container, creating the container if absent.
///
/// When `cell_matrix` is non-empty a `Cell` matrix with one tuple per voxel
/// is created alongside it.
pub struct CreateImageGeometry {
    container: ArrayPath,
    dims: [usize; 3],
    spacing: [f32; 3],
    origin: [f32; 3],
    cell_matrix: String,
}

impl Default for CreateImageGeometry {
    fn default() -> Self {
        Self {
            container: ArrayPath::default(),
            dims: [1, 1, 1],
            spacing: [1.0; 3],
            origin: [0.0; 3],
            cell_matrix: String::new(),
        }
    }
}

impl CreateImageGeometry {
    pub fn new(container: impl Into<String>, dims: [usize; 3]) -> Self {
        Self {
            container: ArrayPath::container(container),
            dims,
            ..Self::default()
        }
    }

    pub fn with_spacing(mut self, spacing: [f32; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_origin(mut self, origin: [f32; 3]) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_cell_matrix(mut self, name: impl Into<String>) -> Self {
        self.cell_matrix = name.into();
        self
    }

    pub fn name(&self) -> &str {
        "CreateImageGeometry"
    }

    pub fn human_label(&self) -> &str {
        "Create Image Geometry"
    }

    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with(CONTAINER, self.container.clone())
            .with(DIMENSIONS, self.dims.as_slice())
            .with(SPACING, self.spacing.as_slice())
            .with(ORIGIN, self.origin.as_slice())
            .with(CELL_MATRIX, self.cell_matrix.as_str())
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(container) = params.get_path(CONTAINER)? {
            self.container = container;
        }
        if let Some(dims) = params.get_dims(DIMENSIONS)? {
            self.dims = <[usize; 3]>::try_from(dims.as_slice()).map_err(|_| {
                ArrayFlowError::Parameter(format!(
                    "'{}' needs exactly 3 values, found {}",
                    DIMENSIONS,
                    dims.len()
                ))
            })?;
        }
        if let Some(spacing) = params.get_float_list(SPACING)? {
            self.spacing = float_triple(SPACING, &spacing)?;
        }
        if let Some(origin) = params.get_float_list(ORIGIN)? {
            self.origin = float_triple(ORIGIN, &origin)?;
        }
        if let Some(name) = params.get_string(CELL_MATRIX)? {
            self.cell_matrix = name;
        }
        Ok(())
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.apply(registry, ctx)
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.apply(registry, ctx)?;
        ctx.notify_status(format!(
            "Image geometry {:?} set on {}",
            self.dims, self.container.container
        ));
        Ok(())
    }

    fn apply(&self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        if self.dims.contains(&0) {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' must be positive, found {:?}",
                DIMENSIONS, self.dims
            )));
        }
        if ImageGeom::new(self.dims).checked_voxel_count().is_none() {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' {:?} overflow the voxel count",
                DIMENSIONS, self.dims
            )));
        }
        if self.spacing.iter().any(|&s| !(s > 0.0)) {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' must be positive, found {:?}",
                SPACING, self.spacing
            )));
        }

        let geometry = ImageGeom::new(self.dims)
            .with_spacing(self.spacing)
            .with_origin(self.origin);
        let Some(container) = registry.resolve_or_create_container(ctx, &self.container) else {
            return Ok(());
        };
        container.set_geometry(geometry);

        if !self.cell_matrix.is_empty() {
            let path = ArrayPath::matrix(self.container.container.as_str(), self.cell_matrix.as_str());
            let [nx, ny, nz] = self.dims;
            registry.resolve_or_create_matrix(ctx, &path, &[nz, ny, nx], MatrixCategory::Cell);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::stage::Phase;

    #[test]
    fn test_sets_geometry_and_cell_matrix() {
        let mut registry = Registry::new();
        let mut stage = CreateImageGeometry::new("Vol", [4, 3, 2])
            .with_spacing([0.5, 0.5, 1.0])
            .with_cell_matrix("cells");
        let mut ctx = StageContext::standalone(Phase::Execute);
        stage.execute(&mut registry, &mut ctx).unwrap();

        let container = registry.container("Vol").unwrap();
        let geom = container.get_geometry::<ImageGeom>().unwrap();
        assert_eq!(geom.voxel_count(), 24);
        assert_eq!(geom.spacing, [0.5, 0.5, 1.0]);

        let cells = container.get_attribute_matrix("cells").unwrap();
        assert_eq!(cells.tuple_count(), 24);
        assert_eq!(cells.category(), MatrixCategory::Cell);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut stage = CreateImageGeometry::new("Vol", [4, 0, 1]);
        let result = stage.preflight(&mut Registry::new(), &mut StageContext::standalone(Phase::Preflight));
        assert!(matches!(result, Err(ArrayFlowError::Parameter(_))));
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        let mut stage = CreateImageGeometry::new("Vol", [usize::MAX, 2, 1]);
        let mut registry = Registry::new();
        let result = stage.preflight(&mut registry, &mut StageContext::standalone(Phase::Preflight));
        assert!(matches!(result, Err(ArrayFlowError::Parameter(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dimensions_need_three_values() {
        let mut stage = CreateImageGeometry::default();
        let params = ParameterSet::new().with(DIMENSIONS, vec![4i64, 4]);
        assert!(stage.set_parameters(&params).is_err());

        let params = ParameterSet::new()
            .with(CONTAINER, "Vol")
            .with(DIMENSIONS, vec![4i64, 4, 4])
            .with(ORIGIN, vec![1i64, 2, 3]);
        stage.set_parameters(&params).unwrap();
        assert_eq!(stage.dims, [4, 4, 4]);
        assert_eq!(stage.origin, [1.0, 2.0, 3.0]);
        assert_eq!(stage.container, ArrayPath::container("Vol"));
    }

    #[test]
    fn test_missing_container_name() {
        let mut registry = Registry::new();
        let mut stage = CreateImageGeometry::default();
        let mut ctx = StageContext::standalone(Phase::Preflight);
        stage.preflight(&mut registry, &mut ctx).unwrap();
        assert_eq!(ctx.status().error_code(), ErrorKind::InvalidPath.code());
    }
}
