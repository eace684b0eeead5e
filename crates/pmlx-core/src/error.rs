use crate::types::SourceSpan;
use thiserror::Error;

/// Why an expression, declaration or name lookup was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprErrorKind {
    /// Operand types do not fit the operator.
    TypeMismatch,
    /// Wrong number of operands or message fields.
    ArityMismatch,
    /// Index on a non-array, or a constant index outside the declared bounds.
    InvalidIndex,
    /// Operand value rejected outright, e.g. a constant zero divisor.
    InvalidOperand,
    /// Literal outside the range of `int`.
    InvalidLiteral,
    /// Write target is not a variable reference.
    NotAnLvalue,
    UnresolvedReference,
    DuplicateDeclaration,
    /// Declaration table is full.
    Capacity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.span, .message))]
pub struct ExprError {
    pub kind: ExprErrorKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl ExprError {
    pub fn new(kind: ExprErrorKind, message: impl Into<String>, span: &SourceSpan) -> Self {
        Self {
            kind,
            message: message.into(),
            span: Some(span.clone()),
        }
    }

    pub fn unspanned(kind: ExprErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }
}

pub(crate) fn render(span: &Option<SourceSpan>, message: &str) -> String {
    match span {
        Some(span) => format!(
            "{}:{}:{}: {}",
            span.path, span.start_line, span.start_col, message
        ),
        None => message.to_string(),
    }
}
