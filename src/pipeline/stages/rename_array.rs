//! RenameArray: give an array a new name within its attribute matrix.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::StageContext;
use crate::store::path::PATH_SEPARATOR;
use crate::store::{ArrayPath, Registry, RenameOutcome, StatusSink};

const PATH: &str = "Path";
const NEW_NAME: &str = "NewName";

#[derive(Default)]
pub struct RenameArray {
    path: ArrayPath,
    new_name: String,
}

impl RenameArray {
    pub fn new(path: ArrayPath, new_name: impl Into<String>) -> Self {
        Self {
            path,
            new_name: new_name.into(),
        }
    }

    pub fn name(&self) -> &str {
        "RenameArray"
    }

    pub fn human_label(&self) -> &str {
        "Rename Array"
    }

    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with(PATH, self.path.clone())
            .with(NEW_NAME, self.new_name.as_str())
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(path) = params.get_path(PATH)? {
            self.path = path;
        }
        if let Some(name) = params.get_string(NEW_NAME)? {
            self.new_name = name;
        }
        Ok(())
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.rename(registry, ctx)
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.rename(registry, ctx)?;
        if !ctx.has_error() {
            ctx.notify_status(format!("Renamed {} to {}", self.path, self.new_name));
        }
        Ok(())
    }

    fn rename(&self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        let name = self.new_name.as_str();
        if name.is_empty() || name.trim() != name || name.contains(PATH_SEPARATOR) {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' is not a valid array name: '{}'",
                NEW_NAME, name
            )));
        }
        self.path.validate_array()?;

        let Some(matrix) = registry.resolve_required_matrix_mut(ctx, &self.path.matrix_path(), &[])
        else {
            return Ok(());
        };
        match matrix.rename(&self.path.array, name, false) {
            RenameOutcome::Success => {}
            RenameOutcome::NewExists => {
                ctx.record_error(ArrayFlowError::DuplicateName(self.path.with_array(name).to_string()))
            }
            RenameOutcome::OldDoesNotExist => ctx.record_error(ArrayFlowError::MissingArray {
                matrix: self.path.matrix_path().to_string(),
                array: self.path.array.clone(),
            }),
        }
        Ok(())
    }
}
