//! # arrayflow: hierarchical array store with a two-phase pipeline engine
//!
//! Numerical data lives in a [`Registry`](store::Registry) of named
//! containers, each holding attribute matrices of equally long, type-erased
//! arrays. A [`Pipeline`](pipeline::Pipeline) runs an ordered list of stages
//! over the registry in two phases:
//!
//! - **Preflight**: every stage validates its inputs and declares its outputs
//!   against a shape-only copy of the registry. Nothing is allocated.
//! - **Execute**: stages run in order on the real registry and the pipeline
//!   halts at the first failure or cancellation.
//!
//! ## Architecture
//!
//! - **Store**: containers, attribute matrices, arrays and geometries
//! - **Pipeline**: stage trait, built-in stages, executor, cancellation
//! - **Config**: JSON/TOML pipeline files and engine settings
//! - **Communication**: crossbeam channel for progress and status messages
//!
//! ## Example
//!
//! ```ignore
//! use arrayflow::{
//!     config::PipelineFile,
//!     pipeline::{Pipeline, PipelineBridge},
//!     store::Registry,
//! };
//!
//! let file = PipelineFile::load("threshold.json")?;
//! let (bridge, msg_tx) = PipelineBridge::new();
//! let mut pipeline = Pipeline::from_file(&file)?.with_sender(msg_tx);
//!
//! let mut registry = Registry::new();
//! let report = pipeline.run(&mut registry);
//! for msg in bridge.drain() {
//!     println!("{:?}", msg);
//! }
//! println!("{}", report.summary());
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{EngineSettings, PipelineFile, StageConfig};
pub use error::{ArrayFlowError, ErrorKind, Result, ResultExt};
pub use pipeline::{Pipeline, PipelineReport, StageContext, StagePlugin, StageType};
pub use store::{ArrayPath, ArrayRef, Registry};
pub use types::{Element, ElementType};
