//! Error handling for arrayflow
//!
//! This module defines the error type shared by the data store and the
//! pipeline engine, the [`ErrorKind`] taxonomy with its stable negative
//! status codes, and a Result alias.
//!
//! Store-level operations return [`Result`]. The registry resolution layer
//! and the stage runner turn those errors into a stage's error register
//! instead of propagating them further.

use crate::types::ElementType;
use thiserror::Error;

/// Classification of every failure the engine can report.
///
/// Each kind maps to a fixed negative code written into a stage's error
/// register, so front ends can match on codes without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingContainer,
    MissingAttributeMatrix,
    MissingArray,
    /// Component dimensions, element type or layout differ from what was requested.
    ShapeMismatch,
    TupleCountMismatch,
    DuplicateName,
    GeometryTypeMismatch,
    AllocationError,
    /// Catch-all for a stage's own domain-logic failure.
    StageComputationError,
    Cancelled,
    InvalidPath,
    Parameter,
    Config,
}

impl ErrorKind {
    /// Stable status code recorded in a stage's error register.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::MissingContainer => -80002,
            ErrorKind::MissingAttributeMatrix => -80003,
            ErrorKind::MissingArray => -80004,
            ErrorKind::ShapeMismatch => -80005,
            ErrorKind::TupleCountMismatch => -10200,
            ErrorKind::DuplicateName => -888,
            ErrorKind::GeometryTypeMismatch => -385,
            ErrorKind::AllocationError => -20000,
            ErrorKind::StageComputationError => -5000,
            ErrorKind::Cancelled => -1,
            ErrorKind::InvalidPath => -80000,
            ErrorKind::Parameter => -10002,
            ErrorKind::Config => -7000,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Main error type for arrayflow operations
#[derive(Error, Debug)]
pub enum ArrayFlowError {
    #[error("Data container '{0}' was not found")]
    MissingContainer(String),

    #[error("Attribute matrix '{matrix}' was not found in data container '{container}'")]
    MissingAttributeMatrix { container: String, matrix: String },

    #[error("Array '{array}' was not found in attribute matrix '{matrix}'")]
    MissingArray { matrix: String, array: String },

    #[error("Shape mismatch for '{name}': {message}")]
    ShapeMismatch { name: String, message: String },

    #[error("Tuple count mismatch for '{name}': expected {expected}, found {found}")]
    TupleCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("An object named '{0}' already exists")]
    DuplicateName(String),

    #[error("Data container '{container}' requires a {expected} geometry but has {found}")]
    GeometryTypeMismatch {
        container: String,
        expected: String,
        found: String,
    },

    #[error("Failed to allocate {element_type} storage for '{name}': {message}")]
    Allocation {
        name: String,
        element_type: ElementType,
        message: String,
    },

    #[error("Tuple index {index} is out of range for '{name}' with {len} tuples")]
    OutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("Stage computation failed: {0}")]
    StageComputation(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Array reference is empty or the array it pointed to was replaced")]
    StaleReference,

    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ArrayFlowError>,
    },
}

impl ArrayFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ArrayFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Taxonomy kind of this error, looking through any added context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArrayFlowError::MissingContainer(_) => ErrorKind::MissingContainer,
            ArrayFlowError::MissingAttributeMatrix { .. } => ErrorKind::MissingAttributeMatrix,
            ArrayFlowError::MissingArray { .. } => ErrorKind::MissingArray,
            ArrayFlowError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            ArrayFlowError::TupleCountMismatch { .. } => ErrorKind::TupleCountMismatch,
            ArrayFlowError::DuplicateName(_) => ErrorKind::DuplicateName,
            ArrayFlowError::GeometryTypeMismatch { .. } => ErrorKind::GeometryTypeMismatch,
            ArrayFlowError::Allocation { .. } => ErrorKind::AllocationError,
            ArrayFlowError::OutOfRange { .. } | ArrayFlowError::StageComputation(_) => {
                ErrorKind::StageComputationError
            }
            ArrayFlowError::StaleReference => ErrorKind::StageComputationError,
            ArrayFlowError::Cancelled => ErrorKind::Cancelled,
            ArrayFlowError::InvalidPath { .. } => ErrorKind::InvalidPath,
            ArrayFlowError::Parameter(_) => ErrorKind::Parameter,
            ArrayFlowError::Config(_)
            | ArrayFlowError::Io(_)
            | ArrayFlowError::Serialization(_) => ErrorKind::Config,
            ArrayFlowError::WithContext { source, .. } => source.kind(),
        }
    }

    /// Negative status code for this error.
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}

/// Result type alias for arrayflow operations
pub type Result<T> = std::result::Result<T, ArrayFlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
