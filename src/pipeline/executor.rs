//! Pipeline executor: an ordered list of stages run in two passes.
//!
//! `preflight_all` visits every stage so that all configuration problems are
//! reported at once. It works on a shape-only copy of the registry, so the
//! caller's registry is never modified and repeated passes agree. `execute_all` runs the stages strictly in order and
//! halts at the first stage that ends with a negative error code or observes
//! cancellation. Stages after the halt point never run.

use crate::config::{EngineSettings, PipelineFile};
use crate::error::{ArrayFlowError, Result};
use crate::pipeline::bridge::{self, PipelineMessage};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::factory::StageFactory;
use crate::pipeline::stage::{AnyStage, Phase, StageContext, StageState, DEFAULT_CHUNK_TUPLES};
use crate::pipeline::status::{StageStatus, StatusMessage};
use crate::store::{Registry, StatusSink};
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::Serialize;

/// A stage plus its run state and last status.
pub struct StageSlot {
    pub stage: AnyStage,
    label: Option<String>,
    state: StageState,
    status: StageStatus,
    cancel: CancelToken,
}

impl StageSlot {
    pub fn new(stage: impl Into<AnyStage>) -> Self {
        Self {
            stage: stage.into(),
            label: None,
            state: StageState::Idle,
            status: StageStatus::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Override the label shown in reports.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label
            .as_deref()
            .unwrap_or_else(|| self.stage.human_label())
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn status(&self) -> &StageStatus {
        &self.status
    }

    pub fn error_code(&self) -> i32 {
        self.status.error_code()
    }

    /// Request cooperative cancellation of this stage's run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn run_phase(
        &mut self,
        index: usize,
        phase: Phase,
        registry: &mut Registry,
        settings: &RunSettings,
    ) {
        self.state = match phase {
            Phase::Preflight => StageState::Preflighting,
            Phase::Execute => StageState::Executing,
        };
        bridge::send(
            settings.msg_tx.as_ref(),
            PipelineMessage::StageStarted {
                index,
                label: self.label().to_string(),
            },
        );

        let mut ctx = StageContext::new(index, phase, self.cancel.clone())
            .with_sender(settings.msg_tx.clone())
            .with_chunk_tuples(settings.chunk_tuples)
            .with_progress(settings.emit_progress);

        let outcome = match phase {
            Phase::Preflight => self.stage.preflight(registry, &mut ctx),
            Phase::Execute => self.stage.execute(registry, &mut ctx),
        };
        if let Err(error) = outcome {
            ctx.record_error(error);
        }
        if phase == Phase::Execute && !ctx.has_error() && self.cancel.is_cancelled() {
            ctx.record_error(ArrayFlowError::Cancelled);
        }

        self.status = ctx.into_status();
        let cancelled = phase == Phase::Execute && self.cancel.is_cancelled();
        self.state = match (phase, self.status.error_code()) {
            (Phase::Execute, code) if code < 0 && cancelled => StageState::Cancelled,
            (Phase::Preflight, code) if code < 0 => StageState::PreflightFailed,
            (Phase::Preflight, _) => StageState::PreflightOk,
            (Phase::Execute, code) if code < 0 => StageState::ExecuteFailed,
            (Phase::Execute, _) => StageState::ExecuteOk,
        };

        bridge::send(
            settings.msg_tx.as_ref(),
            PipelineMessage::StageFinished {
                index,
                error_code: self.status.error_code(),
            },
        );
    }

    fn outcome(&self, index: usize) -> StageOutcome {
        StageOutcome {
            index,
            label: self.label().to_string(),
            state: self.state,
            error_code: self.status.error_code(),
            warning_code: self.status.warning_code(),
            messages: self.status.messages().to_vec(),
        }
    }
}

struct RunSettings {
    msg_tx: Option<Sender<PipelineMessage>>,
    chunk_tuples: usize,
    emit_progress: bool,
}

/// Result of one stage within a pass.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub index: usize,
    pub label: String,
    pub state: StageState,
    pub error_code: i32,
    pub warning_code: i32,
    pub messages: Vec<StatusMessage>,
}

impl StageOutcome {
    pub fn is_failure(&self) -> bool {
        self.error_code < 0
    }
}

/// Aggregate result of a preflight or execute pass, in stage order.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub phase: Phase,
    pub outcomes: Vec<StageOutcome>,
    /// Index of the stage execution stopped at, if it stopped early.
    pub halted_at: Option<usize>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(|o| !o.is_failure())
    }

    /// First stage with a negative error code.
    pub fn failed_stage(&self) -> Option<usize> {
        self.outcomes.iter().find(|o| o.is_failure()).map(|o| o.index)
    }

    /// Every failing stage. Only preflight can report more than one.
    pub fn failed_stages(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| o.index)
            .collect()
    }

    pub fn outcome(&self, index: usize) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.index == index)
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds();
        if self.is_success() {
            return format!(
                "{} succeeded: {} stage(s) in {} ms",
                self.phase,
                self.outcomes.len(),
                elapsed
            );
        }
        let failed: Vec<String> = self
            .outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| format!("#{} {} ({})", o.index, o.label, o.error_code))
            .collect();
        if self.cancelled {
            format!("{} cancelled at {}", self.phase, failed.join(", "))
        } else {
            format!("{} failed: {}", self.phase, failed.join(", "))
        }
    }
}

/// Ordered stages sharing one cancellation token.
pub struct Pipeline {
    slots: Vec<StageSlot>,
    cancel: CancelToken,
    msg_tx: Option<Sender<PipelineMessage>>,
    chunk_tuples: usize,
    emit_progress: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            cancel: CancelToken::new(),
            msg_tx: None,
            chunk_tuples: DEFAULT_CHUNK_TUPLES,
            emit_progress: true,
        }
    }

    /// Forward progress and status messages to `msg_tx`.
    pub fn with_sender(mut self, msg_tx: Sender<PipelineMessage>) -> Self {
        self.msg_tx = Some(msg_tx);
        self
    }

    pub fn with_settings(mut self, settings: &EngineSettings) -> Self {
        self.chunk_tuples = settings.parallel_chunk_tuples.max(1);
        self.emit_progress = settings.emit_progress;
        self
    }

    /// Build a pipeline from a loaded pipeline file.
    pub fn from_file(file: &PipelineFile) -> Result<Self> {
        let mut pipeline = Self::new().with_settings(&file.settings);
        for (index, config) in file.stages.iter().enumerate() {
            let slot = StageFactory::build(config)
                .map_err(|e| e.with_context(format!("stage {} ({})", index, config.stage_type)))?;
            pipeline.push_slot(slot);
        }
        Ok(pipeline)
    }

    // ── Stage list ──

    pub fn push_stage(&mut self, stage: impl Into<AnyStage>) -> usize {
        self.push_slot(StageSlot::new(stage))
    }

    pub fn push_slot(&mut self, mut slot: StageSlot) -> usize {
        slot.cancel = self.cancel.clone();
        self.slots.push(slot);
        self.slots.len() - 1
    }

    pub fn insert_stage(&mut self, index: usize, stage: impl Into<AnyStage>) -> Result<()> {
        if index > self.slots.len() {
            return Err(ArrayFlowError::OutOfRange {
                name: "pipeline".to_string(),
                index,
                len: self.slots.len(),
            });
        }
        let mut slot = StageSlot::new(stage);
        slot.cancel = self.cancel.clone();
        self.slots.insert(index, slot);
        Ok(())
    }

    pub fn remove_stage(&mut self, index: usize) -> Option<AnyStage> {
        if index < self.slots.len() {
            Some(self.slots.remove(index).stage)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stage_labels(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.label().to_string()).collect()
    }

    pub fn slot(&self, index: usize) -> Option<&StageSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut StageSlot> {
        self.slots.get_mut(index)
    }

    // ── Cancellation ──

    /// Token shared by every stage; clone it to cancel from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        tracing::info!("Pipeline cancellation requested");
        self.cancel.cancel();
    }

    /// Clear a previous cancellation so `execute_all` can run again.
    pub fn reset_cancel(&self) {
        self.cancel.reset();
    }

    // ── Passes ──

    /// Preflight every stage in order, regardless of earlier failures.
    pub fn preflight_all(&mut self, registry: &Registry) -> PipelineReport {
        self.preflight_structure(registry).0
    }

    /// Preflight against a shape-only copy of `registry` and return that copy
    /// with every declared output in it.
    pub fn preflight_structure(&mut self, registry: &Registry) -> (PipelineReport, Registry) {
        let mut declared = registry.structure_copy();
        let started_at = Utc::now();
        tracing::info!(stages = self.slots.len(), "Preflight pass started");
        self.send(PipelineMessage::PassStarted {
            phase: Phase::Preflight,
            stage_count: self.slots.len(),
        });

        let settings = self.run_settings();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.run_phase(index, Phase::Preflight, &mut declared, &settings);
            if slot.status.has_error() {
                tracing::warn!(
                    index,
                    stage = slot.label(),
                    code = slot.error_code(),
                    "Preflight failed"
                );
            }
        }

        let report = self.report(Phase::Preflight, started_at, None, false);
        self.finish(&report);
        (report, declared)
    }

    /// Execute stages in order, halting at the first failure or cancellation.
    ///
    /// A cancellation that is still set when the pass starts stops it before
    /// the first stage; see [`Pipeline::reset_cancel`].
    pub fn execute_all(&mut self, registry: &mut Registry) -> PipelineReport {
        let started_at = Utc::now();
        tracing::info!(stages = self.slots.len(), "Execute pass started");
        self.send(PipelineMessage::PassStarted {
            phase: Phase::Execute,
            stage_count: self.slots.len(),
        });
        for slot in &mut self.slots {
            slot.state = StageState::Idle;
            slot.status.clear();
        }

        let settings = self.run_settings();
        let mut halted_at = None;
        let mut cancelled = false;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.cancel.is_cancelled() {
                slot.status.record(&ArrayFlowError::Cancelled);
                slot.state = StageState::Cancelled;
                halted_at = Some(index);
                cancelled = true;
                break;
            }
            tracing::debug!(index, stage = slot.label(), "Executing stage");
            slot.run_phase(index, Phase::Execute, registry, &settings);
            if slot.state == StageState::Cancelled {
                tracing::warn!(index, stage = slot.label(), "Execution cancelled");
                halted_at = Some(index);
                cancelled = true;
                break;
            }
            if slot.status.has_error() {
                tracing::error!(
                    index,
                    stage = slot.label(),
                    code = slot.error_code(),
                    "Stage failed, halting pipeline"
                );
                halted_at = Some(index);
                break;
            }
        }

        if let Some(index) = halted_at {
            self.send(PipelineMessage::Halted { index, cancelled });
        }
        let report = self.report(Phase::Execute, started_at, halted_at, cancelled);
        self.finish(&report);
        report
    }

    /// Preflight and, if every stage passed, execute against `registry`.
    ///
    /// Clears any earlier cancellation first. A cancel requested during
    /// preflight stops the execute pass before its first stage. Returns the
    /// preflight report when preflight failed.
    pub fn run(&mut self, registry: &mut Registry) -> PipelineReport {
        self.cancel.reset();
        let preflight = self.preflight_all(registry);
        if !preflight.is_success() {
            return preflight;
        }
        if self.cancel.is_cancelled() {
            tracing::info!("Cancelled during preflight, nothing will execute");
        }
        self.execute_all(registry)
    }

    fn run_settings(&self) -> RunSettings {
        RunSettings {
            msg_tx: self.msg_tx.clone(),
            chunk_tuples: self.chunk_tuples,
            emit_progress: self.emit_progress,
        }
    }

    fn report(
        &self,
        phase: Phase,
        started_at: DateTime<Utc>,
        halted_at: Option<usize>,
        cancelled: bool,
    ) -> PipelineReport {
        let outcomes = self
            .slots
            .iter()
            .enumerate()
            .take(halted_at.map_or(self.slots.len(), |i| i + 1))
            .map(|(index, slot)| slot.outcome(index))
            .collect();
        PipelineReport {
            phase,
            outcomes,
            halted_at,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn finish(&self, report: &PipelineReport) {
        tracing::info!("{}", report.summary());
        self.send(PipelineMessage::Finished {
            phase: report.phase,
            success: report.is_success(),
        });
    }

    fn send(&self, msg: PipelineMessage) {
        bridge::send(self.msg_tx.as_ref(), msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::bridge::PipelineBridge;
    use crate::pipeline::stage::StagePlugin;
    use crate::store::ArrayPath;
    use std::sync::{Arc, Mutex};

    /// Records the phases it ran and optionally fails.
    struct Recorder {
        name: String,
        fail_execute: bool,
        error_code: i32,
        cancel_during_preflight: bool,
        cancel_during_execute: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                fail_execute: false,
                error_code: -42,
                cancel_during_preflight: false,
                cancel_during_execute: false,
                log: Arc::clone(log),
            }
        }
    }

    impl StagePlugin for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("preflight {}", self.name));
            if self.cancel_during_preflight {
                ctx.cancel_token().cancel();
            }
            registry.resolve_or_create::<i32>(ctx, &ArrayPath::new("M", "cells", &self.name), &[1], 0);
            Ok(())
        }

        fn execute(&mut self, _registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("execute {}", self.name));
            if self.cancel_during_execute {
                ctx.cancel_token().cancel();
            }
            if self.fail_execute {
                ctx.error(self.error_code, "stage failure");
            }
            Ok(())
        }
    }

    fn plugin(stage: Recorder) -> AnyStage {
        AnyStage::Plugin(Box::new(stage))
    }

    #[test]
    fn test_execute_halts_at_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("b", &log);
        failing.fail_execute = true;

        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(Recorder::new("a", &log)));
        pipeline.push_stage(plugin(failing));
        pipeline.push_stage(plugin(Recorder::new("c", &log)));

        let mut registry = Registry::new();
        let report = pipeline.execute_all(&mut registry);

        assert!(!report.is_success());
        assert_eq!(report.failed_stage(), Some(1));
        assert_eq!(report.halted_at, Some(1));
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["execute a", "execute b"]);
        assert_eq!(pipeline.slot(1).unwrap().state(), StageState::ExecuteFailed);
        assert_eq!(pipeline.slot(2).unwrap().state(), StageState::Idle);
    }

    #[test]
    fn test_cancel_stops_following_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut cancelling = Recorder::new("a", &log);
        cancelling.cancel_during_execute = true;

        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(cancelling));
        pipeline.push_stage(plugin(Recorder::new("b", &log)));

        let report = pipeline.execute_all(&mut Registry::new());
        assert!(report.cancelled);
        assert_eq!(report.halted_at, Some(0));
        assert_eq!(pipeline.slot(0).unwrap().state(), StageState::Cancelled);
        assert_eq!(*log.lock().unwrap(), vec!["execute a"]);
    }

    #[test]
    fn test_own_failure_with_cancel_code_is_not_cancellation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("a", &log);
        failing.fail_execute = true;
        failing.error_code = ErrorKind::Cancelled.code();

        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(failing));
        let report = pipeline.execute_all(&mut Registry::new());

        assert!(!report.cancelled);
        assert_eq!(report.failed_stage(), Some(0));
        assert_eq!(pipeline.slot(0).unwrap().state(), StageState::ExecuteFailed);
    }

    #[test]
    fn test_cancel_during_preflight_skips_execute() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut cancelling = Recorder::new("a", &log);
        cancelling.cancel_during_preflight = true;

        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(cancelling));
        pipeline.push_stage(plugin(Recorder::new("b", &log)));

        let mut registry = Registry::new();
        let report = pipeline.run(&mut registry);

        assert_eq!(report.phase, Phase::Execute);
        assert!(report.cancelled);
        assert!(!report.is_success());
        assert_eq!(report.halted_at, Some(0));
        assert_eq!(pipeline.slot(0).unwrap().state(), StageState::Cancelled);
        assert_eq!(*log.lock().unwrap(), vec!["preflight a", "preflight b"]);
        assert!(pipeline.cancel_token().is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_run_clears_earlier_cancel() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(Recorder::new("a", &log)));

        pipeline.cancel();
        assert!(pipeline.execute_all(&mut Registry::new()).cancelled);

        let report = pipeline.run(&mut Registry::new());
        assert!(report.is_success(), "{}", report.summary());
        assert_eq!(*log.lock().unwrap(), vec!["preflight a", "execute a"]);
    }

    #[test]
    fn test_preflight_leaves_registry_unchanged() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(Recorder::new("a", &log)));

        let registry = Registry::new();
        let (first, declared) = pipeline.preflight_structure(&registry);
        assert!(first.is_success());
        assert!(registry.is_empty());
        assert!(declared.contains_array(&ArrayPath::new("M", "cells", "a")));
        assert!(pipeline.preflight_all(&registry).is_success());
    }

    #[test]
    fn test_run_skips_execute_after_failed_preflight() {
        let log = Arc::new(Mutex::new(Vec::new()));

        struct NeedsInput;
        impl StagePlugin for NeedsInput {
            fn name(&self) -> &str {
                "needs-input"
            }
            fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
                registry.resolve_required(ctx, &ArrayPath::new("X", "cells", "ids"), &[1]);
                Ok(())
            }
            fn execute(&mut self, _registry: &mut Registry, _ctx: &mut StageContext) -> Result<()> {
                Ok(())
            }
        }

        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(Recorder::new("a", &log)));
        pipeline.push_stage(AnyStage::Plugin(Box::new(NeedsInput)));

        let mut registry = Registry::new();
        let report = pipeline.run(&mut registry);

        assert_eq!(report.phase, Phase::Preflight);
        assert_eq!(report.failed_stages(), vec![1]);
        assert_eq!(
            report.outcomes[1].error_code,
            ErrorKind::MissingContainer.code()
        );
        // Preflight ran against a copy and execute never ran.
        assert!(registry.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["preflight a"]);
    }

    #[test]
    fn test_messages_forwarded() {
        let (bridge, tx) = PipelineBridge::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new().with_sender(tx);
        pipeline.push_stage(plugin(Recorder::new("a", &log)));

        let report = pipeline.run(&mut Registry::new());
        assert!(report.is_success());

        let msgs = bridge.drain();
        assert!(matches!(
            msgs.first(),
            Some(PipelineMessage::PassStarted { phase: Phase::Preflight, stage_count: 1 })
        ));
        assert_eq!(
            msgs.last(),
            Some(&PipelineMessage::Finished { phase: Phase::Execute, success: true })
        );
    }

    #[test]
    fn test_insert_and_remove_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push_stage(plugin(Recorder::new("a", &log)));
        pipeline.insert_stage(0, plugin(Recorder::new("b", &log))).unwrap();
        assert_eq!(pipeline.stage_labels(), vec!["b", "a"]);
        assert!(pipeline.insert_stage(5, plugin(Recorder::new("c", &log))).is_err());

        assert!(pipeline.remove_stage(0).is_some());
        assert!(pipeline.remove_stage(3).is_none());
        assert_eq!(pipeline.len(), 1);
    }
}
