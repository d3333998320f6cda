//! CreateAttributeMatrix: add an attribute matrix, creating its container if needed.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::StageContext;
use crate::pipeline::stages::parse_category;
use crate::store::{ArrayPath, MatrixCategory, Registry};

const PATH: &str = "Path";
const TUPLE_DIMS: &str = "TupleDims";
const CATEGORY: &str = "Category";

/// Creates (or reshapes) the matrix at `path` with the given tuple dimensions.
///
/// An existing matrix is resized, which resizes every array in it.
pub struct CreateAttributeMatrix {
    path: ArrayPath,
    tuple_dims: Vec<usize>,
    category: MatrixCategory,
}

impl Default for CreateAttributeMatrix {
    fn default() -> Self {
        Self {
            path: ArrayPath::default(),
            tuple_dims: vec![1],
            category: MatrixCategory::Generic,
        }
    }
}

impl CreateAttributeMatrix {
    pub fn new(path: ArrayPath, tuple_dims: &[usize], category: MatrixCategory) -> Self {
        Self {
            path,
            tuple_dims: tuple_dims.to_vec(),
            category,
        }
    }

    pub fn name(&self) -> &str {
        "CreateAttributeMatrix"
    }

    pub fn human_label(&self) -> &str {
        "Create Attribute Matrix"
    }

    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with(PATH, self.path.clone())
            .with(TUPLE_DIMS, self.tuple_dims.as_slice())
            .with(CATEGORY, self.category.to_string())
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(path) = params.get_path(PATH)? {
            self.path = path;
        }
        if let Some(dims) = params.get_dims(TUPLE_DIMS)? {
            self.tuple_dims = dims;
        }
        if let Some(category) = params.get_string(CATEGORY)? {
            self.category = parse_category(CATEGORY, &category)?;
        }
        Ok(())
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.declare(registry, ctx)
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.declare(registry, ctx)?;
        ctx.notify_status(format!(
            "Created attribute matrix {} with tuple dimensions {:?}",
            self.path.matrix_path(),
            self.tuple_dims
        ));
        Ok(())
    }

    fn declare(&self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        if self.tuple_dims.is_empty() {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' must have at least one dimension",
                TUPLE_DIMS
            )));
        }
        registry.resolve_or_create_matrix(ctx, &self.path, &self.tuple_dims, self.category);
        Ok(())
    }
}
