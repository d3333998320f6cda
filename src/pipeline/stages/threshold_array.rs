//! ThresholdArray: boolean mask from comparing a scalar array against a value.
//!
//! The input may have any numeric element type; it is dispatched once per
//! execute and compared in `f64`. The mask is filled in parallel over
//! disjoint tuple ranges.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::StageContext;
use crate::store::{ArrayPath, ArrayRef, NamedArray, Registry, StatusSink};
use crate::types::{Element, ElementType};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const INPUT: &str = "Input";
const OPERATOR: &str = "Operator";
const VALUE: &str = "Value";
const OUTPUT: &str = "Output";

/// Comparison applied as `input <op> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Less => "<",
            CompareOp::Greater => ">",
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::LessEqual => "<=",
            CompareOp::GreaterEqual => ">=",
        }
    }

    #[inline]
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Less => lhs < rhs,
            CompareOp::Greater => lhs > rhs,
            CompareOp::Equal => lhs == rhs,
            CompareOp::NotEqual => lhs != rhs,
            CompareOp::LessEqual => lhs <= rhs,
            CompareOp::GreaterEqual => lhs >= rhs,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    /// Accepts the symbol (`"<="`) or the variant name (`"LessEqual"`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let op = match s.trim() {
            "<" => CompareOp::Less,
            ">" => CompareOp::Greater,
            "==" | "=" => CompareOp::Equal,
            "!=" | "<>" => CompareOp::NotEqual,
            "<=" => CompareOp::LessEqual,
            ">=" => CompareOp::GreaterEqual,
            other => match other.to_ascii_lowercase().as_str() {
                "less" => CompareOp::Less,
                "greater" => CompareOp::Greater,
                "equal" => CompareOp::Equal,
                "notequal" => CompareOp::NotEqual,
                "lessequal" => CompareOp::LessEqual,
                "greaterequal" => CompareOp::GreaterEqual,
                _ => return Err(format!("unknown comparison operator '{}'", other)),
            },
        };
        Ok(op)
    }
}

pub struct ThresholdArray {
    input: ArrayPath,
    op: CompareOp,
    value: f64,
    output: ArrayPath,
}

impl Default for ThresholdArray {
    fn default() -> Self {
        Self {
            input: ArrayPath::default(),
            op: CompareOp::Greater,
            value: 0.0,
            output: ArrayPath::default(),
        }
    }
}

impl ThresholdArray {
    pub fn new(input: ArrayPath, op: CompareOp, value: f64, output: ArrayPath) -> Self {
        Self {
            input,
            op,
            value,
            output,
        }
    }

    pub fn name(&self) -> &str {
        "ThresholdArray"
    }

    pub fn human_label(&self) -> &str {
        "Threshold Array"
    }

    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with(INPUT, self.input.clone())
            .with(OPERATOR, self.op.symbol())
            .with(VALUE, self.value)
            .with(OUTPUT, self.output.clone())
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        if let Some(input) = params.get_path(INPUT)? {
            self.input = input;
        }
        if let Some(op) = params.get_string(OPERATOR)? {
            self.op = op
                .parse()
                .map_err(|e: String| ArrayFlowError::Parameter(format!("'{}': {}", OPERATOR, e)))?;
        }
        if let Some(value) = params.get_float(VALUE)? {
            self.value = value;
        }
        if let Some(output) = params.get_path(OUTPUT)? {
            self.output = output;
        }
        Ok(())
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.resolve(registry, ctx)?;
        Ok(())
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        let Some((input, output)) = self.resolve(registry, ctx)? else {
            return Ok(());
        };

        let input = input.lock()?;
        let output = output.lock()?;
        let input = input.read();
        let mut output = output.write();

        crate::with_element_type!(input.element_type(), T => {
            self.threshold::<T>(&input, &mut output, ctx)
        })?;

        let selected = output
            .view::<bool>()
            .map_or(0, |mask| mask.as_slice().iter().filter(|&&b| b).count());
        ctx.notify_status(format!(
            "{} of {} tuples satisfy {} {} {}",
            selected,
            output.tuple_count(),
            self.input.array,
            self.op,
            self.value
        ));
        Ok(())
    }

    /// Resolve input and output. `None` when a failure was recorded.
    fn resolve(
        &self,
        registry: &mut Registry,
        ctx: &mut StageContext,
    ) -> Result<Option<(ArrayRef, ArrayRef)>> {
        if self.output == self.input {
            return Err(ArrayFlowError::Parameter(format!(
                "'{}' and '{}' must be different arrays",
                INPUT, OUTPUT
            )));
        }

        let input = registry.resolve_required(ctx, &self.input, &[1]);
        if input.is_empty() {
            return Ok(None);
        }
        let element_type = input.element_type().unwrap_or(ElementType::Bool);
        if !element_type.is_numeric() {
            ctx.record_error(ArrayFlowError::ShapeMismatch {
                name: self.input.to_string(),
                message: format!("expected a numeric array, found {}", element_type),
            });
            return Ok(None);
        }

        let output = registry.resolve_or_create::<bool>(ctx, &self.output, &[1], false);
        if output.is_empty() {
            return Ok(None);
        }
        if !registry.validate_tuple_counts(ctx, &[self.input.clone(), self.output.clone()]) {
            return Ok(None);
        }
        Ok(Some((input, output)))
    }

    fn threshold<T: Element>(
        &self,
        input: &NamedArray,
        output: &mut NamedArray,
        ctx: &mut StageContext,
    ) -> Result<()> {
        let source = input.try_view::<T>()?.as_slice();
        let mut mask = output.try_view_mut::<bool>()?;
        let mask = mask.as_mut_slice();

        let chunk = ctx.chunk_tuples();
        let batch = chunk.saturating_mul(rayon::current_num_threads()).max(1);
        let total = mask.len();
        let (op, value) = (self.op, self.value);

        let mut done = 0;
        for (out_batch, in_batch) in mask.chunks_mut(batch).zip(source.chunks(batch)) {
            ctx.check_cancelled()?;
            out_batch
                .par_chunks_mut(chunk)
                .zip(in_batch.par_chunks(chunk))
                .for_each(|(out, inp)| {
                    for (flag, &x) in out.iter_mut().zip(inp) {
                        *flag = op.apply(x.to_f64(), value);
                    }
                });
            done += out_batch.len();
            ctx.notify_progress(done, total);
        }
        Ok(())
    }
}
