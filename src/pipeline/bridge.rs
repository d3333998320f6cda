//! Progress and status channel between a running pipeline and its observer.
//!
//! The pipeline pushes [`PipelineMessage`]s through a crossbeam `Sender`;
//! a front end (the CLI, a GUI, a test) holds the [`PipelineBridge`] and
//! drains them. The channel is one-way and never blocks the pipeline: when
//! the buffer is full, messages are dropped.

use crate::pipeline::stage::Phase;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Notifications emitted while a pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    /// A preflight or execute pass began over `stage_count` stages.
    PassStarted { phase: Phase, stage_count: usize },

    StageStarted { index: usize, label: String },

    /// Human-readable status from a stage.
    Status { index: usize, text: String },

    /// Progress of the current stage, 0 to 100.
    Progress { index: usize, percent: u8 },

    Warning { index: usize, code: i32, text: String },

    Error { index: usize, code: i32, text: String },

    StageFinished { index: usize, error_code: i32 },

    /// Execution stopped before the last stage.
    Halted { index: usize, cancelled: bool },

    /// The pass ended; `success` is false if any stage failed.
    Finished { phase: Phase, success: bool },
}

/// Channel capacity for messages (pipeline → observer).
const MSG_CHANNEL_CAPACITY: usize = 4_096;

/// Observer-side handle for pipeline messages.
pub struct PipelineBridge {
    pub msg_rx: Receiver<PipelineMessage>,
}

impl PipelineBridge {
    /// Create a new bridge and the sender the pipeline should own.
    pub fn new() -> (Self, Sender<PipelineMessage>) {
        let (msg_tx, msg_rx) = bounded(MSG_CHANNEL_CAPACITY);
        (Self { msg_rx }, msg_tx)
    }

    /// Drain all pending messages.
    pub fn drain(&self) -> Vec<PipelineMessage> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    /// Try to receive a single message without blocking.
    pub fn try_recv(&self) -> Option<PipelineMessage> {
        self.msg_rx.try_recv().ok()
    }
}

/// Send without blocking. Returns false if the message was dropped.
pub(crate) fn send(tx: Option<&Sender<PipelineMessage>>, msg: PipelineMessage) -> bool {
    let Some(tx) = tx else {
        return false;
    };
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::trace!("Pipeline message channel full, dropping message");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
