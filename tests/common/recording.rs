//! A hand-written stage that records every call it receives.

use arrayflow::pipeline::{AnyStage, Phase, StageContext, StagePlugin};
use arrayflow::store::{ArrayPath, Registry};
use arrayflow::Result;
use std::sync::{Arc, Mutex};

/// Shared call log, e.g. `["preflight a", "execute a", ...]`.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls made in `phase`, as stage names.
    pub fn stages_in(&self, phase: Phase) -> Vec<String> {
        let prefix = format!("{} ", phase);
        self.calls()
            .iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn push(&self, phase: Phase, name: &str) {
        self.0.lock().unwrap().push(format!("{} {}", phase, name));
    }
}

pub struct RecordingStage {
    name: String,
    log: CallLog,
    fail_in: Option<Phase>,
    output: Option<ArrayPath>,
}

impl RecordingStage {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail_in: None,
            output: None,
        }
    }

    /// Record error code -42 when running `phase`.
    pub fn failing_in(mut self, phase: Phase) -> Self {
        self.fail_in = Some(phase);
        self
    }

    /// Produce an `i32` scalar array at `path` in both phases.
    pub fn producing(mut self, path: ArrayPath) -> Self {
        self.output = Some(path);
        self
    }

    pub fn boxed(self) -> AnyStage {
        AnyStage::Plugin(Box::new(self))
    }

    fn run(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.log.push(ctx.phase(), &self.name);
        if let Some(path) = &self.output {
            registry.resolve_or_create::<i32>(ctx, path, &[1], 7);
        }
        if self.fail_in == Some(ctx.phase()) {
            ctx.error(-42, format!("{} failed on purpose", self.name));
        }
        Ok(())
    }
}

impl StagePlugin for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn preflight(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.run(registry, ctx)
    }

    fn execute(&mut self, registry: &mut Registry, ctx: &mut StageContext) -> Result<()> {
        self.run(registry, ctx)
    }
}
