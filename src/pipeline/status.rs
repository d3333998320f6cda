//! Per-stage error and warning registers.

use crate::error::{ArrayFlowError, ErrorKind};
use crate::store::StatusSink;
use serde::Serialize;

/// Severity of a stage message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// One human-readable message emitted by a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMessage {
    pub level: MessageLevel,
    pub code: i32,
    pub text: String,
}

/// Error and warning registers of a stage.
///
/// `error_code` is zero while the stage is healthy and negative once an
/// error was recorded; the first error recorded since the last
/// [`clear`](StageStatus::clear) wins. Every error and warning is also kept
/// in `messages` so a preflight pass can report all of them at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageStatus {
    error_code: i32,
    warning_code: i32,
    messages: Vec<StatusMessage>,
}

impl StageStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.error_code = 0;
        self.warning_code = 0;
        self.messages.clear();
    }

    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    pub fn warning_code(&self) -> i32 {
        self.warning_code
    }

    pub fn has_error(&self) -> bool {
        self.error_code < 0
    }

    pub fn has_warning(&self) -> bool {
        self.warning_code != 0
    }

    pub fn messages(&self) -> &[StatusMessage] {
        &self.messages
    }

    /// Messages of the given level, in emission order.
    pub fn messages_at(&self, level: MessageLevel) -> impl Iterator<Item = &StatusMessage> {
        self.messages.iter().filter(move |m| m.level == level)
    }

    /// Record an error with an explicit code. Non-negative codes are
    /// coerced to the generic stage computation code.
    pub fn set_error(&mut self, code: i32, text: impl Into<String>) {
        let code = if code < 0 {
            code
        } else {
            ErrorKind::StageComputationError.code()
        };
        let text = text.into();
        tracing::error!(code, "{}", text);
        if self.error_code == 0 {
            self.error_code = code;
        }
        self.messages.push(StatusMessage {
            level: MessageLevel::Error,
            code,
            text,
        });
    }

    pub fn set_warning(&mut self, code: i32, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(code, "{}", text);
        if self.warning_code == 0 {
            self.warning_code = code;
        }
        self.messages.push(StatusMessage {
            level: MessageLevel::Warning,
            code,
            text,
        });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.messages.push(StatusMessage {
            level: MessageLevel::Info,
            code: 0,
            text: text.into(),
        });
    }

    /// Record an engine error under its taxonomy code.
    pub fn record(&mut self, error: &ArrayFlowError) {
        self.set_error(error.code(), error.to_string());
    }
}

impl StatusSink for StageStatus {
    fn record_error(&mut self, error: ArrayFlowError) {
        self.record(&error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let mut status = StageStatus::new();
        assert!(!status.has_error());

        status.record(&ArrayFlowError::MissingContainer("X".into()));
        status.record(&ArrayFlowError::DuplicateName("Y".into()));

        assert_eq!(status.error_code(), ErrorKind::MissingContainer.code());
        assert_eq!(status.messages_at(MessageLevel::Error).count(), 2);
    }

    #[test]
    fn test_warning_does_not_set_error() {
        let mut status = StageStatus::new();
        status.set_warning(-10, "careful");
        status.info("all good");
        assert!(!status.has_error());
        assert!(status.has_warning());
        assert_eq!(status.messages().len(), 2);
    }

    #[test]
    fn test_positive_error_code_is_coerced() {
        let mut status = StageStatus::new();
        status.set_error(5, "odd");
        assert_eq!(status.error_code(), ErrorKind::StageComputationError.code());
    }

    #[test]
    fn test_clear() {
        let mut status = StageStatus::new();
        status.set_error(-3, "bad");
        status.clear();
        assert_eq!(status, StageStatus::default());
    }
}
