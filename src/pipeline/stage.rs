//! Stage abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`StagePlugin` trait** for externally authored stages.
//! - **`BuiltinStage` enum** for the stages shipped with the crate, so the
//!   pipeline dispatches them without a vtable.
//!
//! `AnyStage` wraps either variant so the pipeline can handle both uniformly.
//!
//! # Contract
//!
//! `preflight` declares every required and produced path against the
//! registry without computing anything; it must be idempotent and cheap.
//! `execute` re-resolves the same paths (it never trusts references kept
//! from preflight) and performs the computation. Both report failures into
//! the [`StageContext`]; an `Err` returned from either is recorded there too.

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::bridge::{self, PipelineMessage};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stages::{
    CreateAttributeMatrix, CreateDataArray, CreateImageGeometry, FindFeatureNeighbors,
    RemoveInactiveFeatures, RenameArray, ThresholdArray,
};
use crate::pipeline::status::StageStatus;
use crate::store::{Registry, StatusSink};
use crossbeam_channel::Sender;
use serde::Serialize;

/// Which half of the two-phase contract is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Preflight,
    Execute,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Preflight => write!(f, "preflight"),
            Phase::Execute => write!(f, "execute"),
        }
    }
}

/// Lifecycle of a stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum StageState {
    #[default]
    Idle,
    Preflighting,
    PreflightOk,
    PreflightFailed,
    Executing,
    ExecuteOk,
    ExecuteFailed,
    Cancelled,
}

impl StageState {
    /// Terminal for a single run. Preflight may still be re-entered.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageState::ExecuteOk | StageState::ExecuteFailed | StageState::Cancelled
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StageState::PreflightFailed | StageState::ExecuteFailed | StageState::Cancelled
        )
    }
}

/// Default number of tuples handed to one parallel worker.
pub const DEFAULT_CHUNK_TUPLES: usize = 16_384;

/// Everything a stage may touch besides the registry during one phase.
pub struct StageContext {
    index: usize,
    phase: Phase,
    status: StageStatus,
    cancel: CancelToken,
    msg_tx: Option<Sender<PipelineMessage>>,
    chunk_tuples: usize,
    emit_progress: bool,
    last_percent: Option<u8>,
}

impl StageContext {
    pub fn new(index: usize, phase: Phase, cancel: CancelToken) -> Self {
        Self {
            index,
            phase,
            status: StageStatus::new(),
            cancel,
            msg_tx: None,
            chunk_tuples: DEFAULT_CHUNK_TUPLES,
            emit_progress: true,
            last_percent: None,
        }
    }

    /// Context for calling a stage directly, outside a pipeline.
    pub fn standalone(phase: Phase) -> Self {
        Self::new(0, phase, CancelToken::new())
    }

    pub fn with_sender(mut self, msg_tx: Option<Sender<PipelineMessage>>) -> Self {
        self.msg_tx = msg_tx;
        self
    }

    pub fn with_chunk_tuples(mut self, chunk_tuples: usize) -> Self {
        self.chunk_tuples = chunk_tuples.max(1);
        self
    }

    pub fn with_progress(mut self, emit_progress: bool) -> Self {
        self.emit_progress = emit_progress;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_preflight(&self) -> bool {
        self.phase == Phase::Preflight
    }

    pub fn status(&self) -> &StageStatus {
        &self.status
    }

    pub fn into_status(self) -> StageStatus {
        self.status
    }

    pub fn has_error(&self) -> bool {
        self.status.has_error()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Tuples per parallel work unit.
    pub fn chunk_tuples(&self) -> usize {
        self.chunk_tuples
    }

    pub fn notify_status(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(index = self.index, "{}", text);
        self.status.info(text.clone());
        bridge::send(
            self.msg_tx.as_ref(),
            PipelineMessage::Status {
                index: self.index,
                text,
            },
        );
    }

    /// Report `done` out of `total` units of work. Only changes of the
    /// integer percentage are forwarded.
    pub fn notify_progress(&mut self, done: usize, total: usize) {
        if !self.emit_progress {
            return;
        }
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u8
        };
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        bridge::send(
            self.msg_tx.as_ref(),
            PipelineMessage::Progress {
                index: self.index,
                percent,
            },
        );
    }

    pub fn warn(&mut self, code: i32, text: impl Into<String>) {
        let text = text.into();
        self.status.set_warning(code, text.clone());
        bridge::send(
            self.msg_tx.as_ref(),
            PipelineMessage::Warning {
                index: self.index,
                code,
                text,
            },
        );
    }

    /// Record a stage-specific error with an explicit negative code.
    pub fn error(&mut self, code: i32, text: impl Into<String>) {
        let text = text.into();
        self.status.set_error(code, text.clone());
        let code = self
            .status
            .messages()
            .last()
            .map_or(code, |message| message.code);
        bridge::send(
            self.msg_tx.as_ref(),
            PipelineMessage::Error {
                index: self.index,
                code,
                text,
            },
        );
    }
}

impl StatusSink for StageContext {
    fn record_error(&mut self, error: ArrayFlowError) {
        self.error(error.code(), error.to_string());
    }

    fn allocate_outputs(&self) -> bool {
        self.phase == Phase::Execute
    }
}

/// Trait for pluggable, externally authored stages.
pub trait StagePlugin: Send {
    /// Stable identifier of the stage kind.
    fn name(&self) -> &str;

    /// Label shown to users.
    fn human_label(&self) -> &str {
        self.name()
    }

    /// Current parameters, in declaration order.
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
    }

    /// Apply parameters. Keys that are absent keep their current value.
    fn set_parameters(&mut self, _params: &ParameterSet) -> Result<()> {
        Ok(())
    }

    fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()>;

    fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()>;
}

/// Enum dispatch for built-in stages.
pub enum BuiltinStage {
    CreateAttributeMatrix(CreateAttributeMatrix),
    CreateImageGeometry(CreateImageGeometry),
    CreateDataArray(CreateDataArray),
    ThresholdArray(ThresholdArray),
    FindFeatureNeighbors(FindFeatureNeighbors),
    RenameArray(RenameArray),
    RemoveInactiveFeatures(RemoveInactiveFeatures),
}

impl BuiltinStage {
    pub fn name(&self) -> &str {
        match self {
            BuiltinStage::CreateAttributeMatrix(s) => s.name(),
            BuiltinStage::CreateImageGeometry(s) => s.name(),
            BuiltinStage::CreateDataArray(s) => s.name(),
            BuiltinStage::ThresholdArray(s) => s.name(),
            BuiltinStage::FindFeatureNeighbors(s) => s.name(),
            BuiltinStage::RenameArray(s) => s.name(),
            BuiltinStage::RemoveInactiveFeatures(s) => s.name(),
        }
    }

    pub fn human_label(&self) -> &str {
        match self {
            BuiltinStage::CreateAttributeMatrix(s) => s.human_label(),
            BuiltinStage::CreateImageGeometry(s) => s.human_label(),
            BuiltinStage::CreateDataArray(s) => s.human_label(),
            BuiltinStage::ThresholdArray(s) => s.human_label(),
            BuiltinStage::FindFeatureNeighbors(s) => s.human_label(),
            BuiltinStage::RenameArray(s) => s.human_label(),
            BuiltinStage::RemoveInactiveFeatures(s) => s.human_label(),
        }
    }

    pub fn parameters(&self) -> ParameterSet {
        match self {
            BuiltinStage::CreateAttributeMatrix(s) => s.parameters(),
            BuiltinStage::CreateImageGeometry(s) => s.parameters(),
            BuiltinStage::CreateDataArray(s) => s.parameters(),
            BuiltinStage::ThresholdArray(s) => s.parameters(),
            BuiltinStage::FindFeatureNeighbors(s) => s.parameters(),
            BuiltinStage::RenameArray(s) => s.parameters(),
            BuiltinStage::RemoveInactiveFeatures(s) => s.parameters(),
        }
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        match self {
            BuiltinStage::CreateAttributeMatrix(s) => s.set_parameters(params),
            BuiltinStage::CreateImageGeometry(s) => s.set_parameters(params),
            BuiltinStage::CreateDataArray(s) => s.set_parameters(params),
            BuiltinStage::ThresholdArray(s) => s.set_parameters(params),
            BuiltinStage::FindFeatureNeighbors(s) => s.set_parameters(params),
            BuiltinStage::RenameArray(s) => s.set_parameters(params),
            BuiltinStage::RemoveInactiveFeatures(s) => s.set_parameters(params),
        }
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        match self {
            BuiltinStage::CreateAttributeMatrix(s) => s.preflight(registry, ctx),
            BuiltinStage::CreateImageGeometry(s) => s.preflight(registry, ctx),
            BuiltinStage::CreateDataArray(s) => s.preflight(registry, ctx),
            BuiltinStage::ThresholdArray(s) => s.preflight(registry, ctx),
            BuiltinStage::FindFeatureNeighbors(s) => s.preflight(registry, ctx),
            BuiltinStage::RenameArray(s) => s.preflight(registry, ctx),
            BuiltinStage::RemoveInactiveFeatures(s) => s.preflight(registry, ctx),
        }
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        match self {
            BuiltinStage::CreateAttributeMatrix(s) => s.execute(registry, ctx),
            BuiltinStage::CreateImageGeometry(s) => s.execute(registry, ctx),
            BuiltinStage::CreateDataArray(s) => s.execute(registry, ctx),
            BuiltinStage::ThresholdArray(s) => s.execute(registry, ctx),
            BuiltinStage::FindFeatureNeighbors(s) => s.execute(registry, ctx),
            BuiltinStage::RenameArray(s) => s.execute(registry, ctx),
            BuiltinStage::RemoveInactiveFeatures(s) => s.execute(registry, ctx),
        }
    }
}

/// Wrapper that holds either a built-in stage (enum dispatch) or a plugin (trait object).
pub enum AnyStage {
    Builtin(BuiltinStage),
    Plugin(Box<dyn StagePlugin>),
}

impl AnyStage {
    pub fn name(&self) -> &str {
        match self {
            AnyStage::Builtin(s) => s.name(),
            AnyStage::Plugin(s) => s.name(),
        }
    }

    pub fn human_label(&self) -> &str {
        match self {
            AnyStage::Builtin(s) => s.human_label(),
            AnyStage::Plugin(s) => s.human_label(),
        }
    }

    pub fn parameters(&self) -> ParameterSet {
        match self {
            AnyStage::Builtin(s) => s.parameters(),
            AnyStage::Plugin(s) => s.parameters(),
        }
    }

    pub fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        match self {
            AnyStage::Builtin(s) => s.set_parameters(params),
            AnyStage::Plugin(s) => s.set_parameters(params),
        }
    }

    pub fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        match self {
            AnyStage::Builtin(s) => s.preflight(registry, ctx),
            AnyStage::Plugin(s) => s.preflight(registry, ctx),
        }
    }

    pub fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        match self {
            AnyStage::Builtin(s) => s.execute(registry, ctx),
            AnyStage::Plugin(s) => s.execute(registry, ctx),
        }
    }
}

impl From<BuiltinStage> for AnyStage {
    fn from(stage: BuiltinStage) -> Self {
        AnyStage::Builtin(stage)
    }
}

impl From<Box<dyn StagePlugin>> for AnyStage {
    fn from(stage: Box<dyn StagePlugin>) -> Self {
        AnyStage::Plugin(stage)
    }
}

macro_rules! impl_from_stage {
    ($($stage:ident),* $(,)?) => {
        $(
            impl From<$stage> for BuiltinStage {
                fn from(stage: $stage) -> Self {
                    BuiltinStage::$stage(stage)
                }
            }

            impl From<$stage> for AnyStage {
                fn from(stage: $stage) -> Self {
                    AnyStage::Builtin(BuiltinStage::$stage(stage))
                }
            }
        )*
    };
}

impl_from_stage!(
    CreateAttributeMatrix,
    CreateImageGeometry,
    CreateDataArray,
    ThresholdArray,
    FindFeatureNeighbors,
    RenameArray,
    RemoveInactiveFeatures,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::bridge::PipelineBridge;

    #[test]
    fn test_context_allocates_only_in_execute() {
        assert!(!StageContext::standalone(Phase::Preflight).allocate_outputs());
        assert!(StageContext::standalone(Phase::Execute).allocate_outputs());
    }

    #[test]
    fn test_context_forwards_messages() {
        let (bridge, tx) = PipelineBridge::new();
        let mut ctx = StageContext::new(3, Phase::Execute, CancelToken::new()).with_sender(Some(tx));

        ctx.notify_status("working");
        ctx.notify_progress(1, 4);
        ctx.notify_progress(1, 4);
        ctx.record_error(ArrayFlowError::Cancelled);

        let msgs = bridge.drain();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1], PipelineMessage::Progress { index: 3, percent: 25 });
        assert!(matches!(msgs[2], PipelineMessage::Error { index: 3, code: -1, .. }));
        assert!(ctx.has_error());
    }

    #[test]
    fn test_state_classification() {
        assert!(StageState::Cancelled.is_terminal());
        assert!(!StageState::PreflightOk.is_terminal());
        assert!(StageState::PreflightFailed.is_failure());
        assert!(!StageState::ExecuteOk.is_failure());
    }
}
