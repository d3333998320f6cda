//! Ordered stage pipeline with preflight and execute passes.
//!
//! A [`Pipeline`] owns a list of [`StageSlot`]s. Each slot wraps one stage
//! (a [`BuiltinStage`] or a boxed [`StagePlugin`]) together with its state
//! and error registers. Stages run in order against a shared
//! [`Registry`](crate::store::Registry):
//!
//! ```text
//! preflight:  registry.structure_copy() ─► stage 0 ─► stage 1 ─► ... (all visited)
//! execute:    registry                  ─► stage 0 ─► stage 1 ─► ... (halts on error)
//! ```
//!
//! # Design
//!
//! - **Enum dispatch for built-ins**: `BuiltinStage` matches to each stage's
//!   inherent methods; only third-party stages go through `dyn StagePlugin`.
//! - **Two phases, one code path**: stages resolve their inputs and outputs the
//!   same way in both phases. Storage is only allocated during execute.
//! - **Cooperative cancellation**: a shared [`CancelToken`] is polled by stages
//!   between work batches.
//! - **Non-blocking observation**: status, progress and errors flow to a
//!   [`PipelineBridge`] over a bounded crossbeam channel.

pub mod bridge;
pub mod cancel;
pub mod executor;
pub mod factory;
pub mod params;
pub mod stage;
pub mod stage_type;
pub mod stages;
pub mod status;

pub use bridge::{PipelineBridge, PipelineMessage};
pub use cancel::CancelToken;
pub use executor::{Pipeline, PipelineReport, StageOutcome, StageSlot};
pub use factory::StageFactory;
pub use params::{ParamValue, ParameterSet};
pub use stage::{AnyStage, BuiltinStage, Phase, StageContext, StagePlugin, StageState};
pub use stage_type::StageType;
pub use status::{MessageLevel, StageStatus, StatusMessage};
