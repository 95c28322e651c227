//! Error types for the matrix kernel generator

use std::path::PathBuf;
use thiserror::Error;

/// Result type for kernel construction
pub type KernelResult<T> = Result<T, KernelError>;

/// Kernel construction errors
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("Dimension mismatch in {operation}: {left} vs {right}")]
    DimensionMismatch {
        operation: String,
        left: String,
        right: String,
    },

    #[error("Matrix '{matrix}' has {count} unique patterns, only a single pattern is supported")]
    UnsupportedPattern { matrix: String, count: usize },

    #[error("Malformed expression in '{matrix}' at cell ({row}, {col}): {message}")]
    MalformedExpression {
        matrix: String,
        row: usize,
        col: usize,
        message: String,
    },

    #[error("Imperfect index prediction for '{matrix}' slot {slot} ({lane} index of {reference}): residual {residual:.3e}")]
    ImperfectFit {
        matrix: String,
        slot: usize,
        lane: Lane,
        reference: String,
        residual: f64,
    },

    #[error("Failed to write kernel to '{}': {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lexer error at position {position}: {message}")]
    LexerError { position: usize, message: String },

    #[error("Parser error: {message}")]
    ParseError { message: String },

    #[error("Undefined matrix: {name}")]
    UndefinedMatrix { name: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

/// Which index of an element reference a lane carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Lane {
    Row,
    Col,
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::Row => write!(f, "row"),
            Lane::Col => write!(f, "col"),
        }
    }
}

impl KernelError {
    pub fn dimension_mismatch(
        operation: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        KernelError::DimensionMismatch {
            operation: operation.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn malformed(matrix: impl Into<String>, row: usize, col: usize, msg: impl Into<String>) -> Self {
        KernelError::MalformedExpression {
            matrix: matrix.into(),
            row,
            col,
            message: msg.into(),
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        KernelError::ParseError { message: msg.into() }
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        KernelError::UndefinedMatrix { name: name.into() }
    }

    pub fn invalid_op(msg: impl Into<String>) -> Self {
        KernelError::InvalidOperation { message: msg.into() }
    }
}
