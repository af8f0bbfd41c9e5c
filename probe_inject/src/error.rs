//! Error types for registry construction and method passes.
//!
//! Both kinds are fatal: a [`ConfigurationError`] blocks all instrumentation,
//! a [`TransformError`] aborts the pass over one method.

use thiserror::Error;

use crate::descriptor::ValueKind;
use crate::ir::LabelId;
use crate::site::BranchKind;

/// A method descriptor string that could not be parsed.
#[derive(Debug, Clone, Error)]
#[error("invalid method descriptor `{descriptor}`: {reason}")]
pub struct DescriptorError {
    pub descriptor: String,
    pub reason: &'static str,
}

/// Raised while building a `ProbeRegistry`.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("expecting a probe for {kind}, none registered")]
    MissingProbe { kind: BranchKind },

    #[error("expecting no probe for {kind}, got {probe}")]
    UnexpectedProbe { kind: BranchKind, probe: String },

    #[error("more than one probe registered for {kind}")]
    DuplicateProbe { kind: BranchKind },

    #[error("invalid return type for {kind} probe {probe}, expected {expected}, got {actual}")]
    ReturnMismatch {
        kind: BranchKind,
        probe: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("invalid parameter types for {kind} probe {probe}, expected ({expected}), got ({actual})")]
    ParameterMismatch {
        kind: BranchKind,
        probe: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    InvalidDescriptor(#[from] DescriptorError),
}

/// Raised when a method's instruction stream has a shape the pass cannot handle.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    #[error("handler label {label} is not followed by any instruction")]
    NoHandlerAnchor { label: LabelId },

    #[error("label {label} is defined more than once")]
    DuplicateLabel { label: LabelId },

    #[error("label {label} is referenced but never defined")]
    UndefinedLabel { label: LabelId },

    #[error("operand stack underflow at instruction {index}")]
    StackUnderflow { index: usize },

    #[error("operand stack mismatch at instruction {index}: expected {expected}, found {found}")]
    StackMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("control flow merges different operand stacks at instruction {index}")]
    InconsistentStack { index: usize },

    #[error("execution falls off the end of the method after instruction {index}")]
    FallsOffEnd { index: usize },

    #[error("invalid call descriptor at instruction {index}")]
    InvalidInvokeDescriptor {
        index: usize,
        #[source]
        source: DescriptorError,
    },
}
