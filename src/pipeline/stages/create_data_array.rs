//! CreateDataArray: a new array of any element type, filled with one value.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::StageContext;
use crate::pipeline::stages::scalar_text;
use crate::store::{ArrayPath, NamedArray, Registry};
use crate::types::{Element, ElementType};

const OUTPUT: &str = "Output";
const ELEMENT_TYPE: &str = "ElementType";
const COMPONENT_DIMS: &str = "ComponentDims";
const INIT_VALUE: &str = "InitValue";

/// Creates `output` in an existing matrix with the matrix's tuple count.
pub struct CreateDataArray {
    output: ArrayPath,
    element_type: ElementType,
    component_dims: Vec<usize>,
    init_value: String,
}

impl Default for CreateDataArray {
    fn default() -> Self {
        Self {
            output: ArrayPath::default(),
            element_type: ElementType::Float32,
            component_dims: vec![1],
            init_value: "0".to_string(),
        }
    }
}

impl CreateDataArray {
    pub fn new(output: ArrayPath, element_type: ElementType, component_dims: &[usize]) -> Self {
        Self {
            output,
            element_type,
            component_dims: component_dims.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_init_value(mut self, value: impl Into<String>) -> Self {
        self.init_value = value.into();
        self
    }

    pub fn name(&self) -> &str {
        "CreateDataArray"
    }

    pub fn human_label(&self) -> &str {
        "Create Data Array"
    }

    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with(OUTPUT, self.output.clone())
            .with(ELEMENT_TYPE, self.element_type)
            .with(COMPONENT_DIMS, self.component_dims.as_slice())
            .with(INIT_VALUE, self.init_value.as_str())
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(output) = params.get_path(OUTPUT)? {
            self.output = output;
        }
        if let Some(element_type) = params.get_element_type(ELEMENT_TYPE)? {
            self.element_type = element_type;
        }
        if let Some(dims) = params.get_dims(COMPONENT_DIMS)? {
            self.component_dims = dims;
        }
        if let Some(value) = scalar_text(params, INIT_VALUE)? {
            self.init_value = value;
        }
        Ok(())
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.check_parameters()?;
        if registry
            .resolve_required_matrix(ctx, &self.output.matrix_path(), &[])
            .is_none()
        {
            return Ok(());
        }
        registry.resolve_or_create_dyn(ctx, &self.output, self.element_type, &self.component_dims);
        Ok(())
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.check_parameters()?;
        if registry
            .resolve_required_matrix(ctx, &self.output.matrix_path(), &[])
            .is_none()
        {
            return Ok(());
        }
        let target =
            registry.resolve_or_create_dyn(ctx, &self.output, self.element_type, &self.component_dims);
        if target.is_empty() {
            return Ok(());
        }

        let shared = target.lock()?;
        let mut array = shared.write();
        crate::with_element_type!(self.element_type, T => {
            fill::<T>(&mut array, &self.init_value)
        })?;
        ctx.notify_status(format!(
            "Created {} {} array with {} tuples",
            self.output,
            self.element_type,
            array.tuple_count()
        ));
        Ok(())
    }

    fn check_parameters(&self) -> Result<()> {
        if self.component_dims.is_empty() || self.component_dims.contains(&0) {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' must be non-empty and positive, found {:?}",
                COMPONENT_DIMS, self.component_dims
            )));
        }
        crate::with_element_type!(self.element_type, T => parse::<T>(&self.init_value).map(|_| ()))
    }
}

fn parse<T: Element>(text: &str) -> Result<T> {
    T::parse_value(text).ok_or_else(|| {
        ArrayFlowError::Parameter(format!(
            "'{}' value '{}' is not a valid {}",
            INIT_VALUE,
            text,
            T::TYPE
        ))
    })
}

fn fill<T: Element>(array: &mut NamedArray, text: &str) -> Result<()> {
    array.fill_with(parse::<T>(text)?)
}
