//! Expression trees.
//!
//! Nodes can only be built through the constructors on [`Expression`], which
//! check operand types and fix the result type once. A built tree is never
//! mutated, so the three queries every node answers (`int_code`/`bool_code`,
//! `result_type`, `read_variables`) are pure and may run from any thread.

use crate::error::{ExprError, ExprErrorKind};
use crate::mtype::MTypeCode;
use crate::typing;
use crate::types::SourceSpan;
use crate::variable::{AccessIndex, ChannelSignature, Variable, VariableAccess, VariableType};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
}

impl Literal {
    pub fn value(self) -> i64 {
        match self {
            Literal::Bool(value) => i64::from(value),
            Literal::Int(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    BitNot,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorClass {
    Arithmetic,
    Bitwise,
    Shift,
    Logical,
    Equality,
    Ordering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn class(self) -> OperatorClass {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                OperatorClass::Arithmetic
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => OperatorClass::Bitwise,
            BinaryOp::Shl | BinaryOp::Shr => OperatorClass::Shift,
            BinaryOp::And | BinaryOp::Or => OperatorClass::Logical,
            BinaryOp::Eq | BinaryOp::Ne => OperatorClass::Equality,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => OperatorClass::Ordering,
        }
    }
}

/// Channel inspections usable inside expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOp {
    Len,
    Empty,
    NonEmpty,
    Full,
    NonFull,
}

impl ChannelOp {
    pub fn keyword(self) -> &'static str {
        match self {
            ChannelOp::Len => "len",
            ChannelOp::Empty => "empty",
            ChannelOp::NonEmpty => "nempty",
            ChannelOp::Full => "full",
            ChannelOp::NonFull => "nfull",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "len" => Some(ChannelOp::Len),
            "empty" => Some(ChannelOp::Empty),
            "nempty" => Some(ChannelOp::NonEmpty),
            "full" => Some(ChannelOp::Full),
            "nfull" => Some(ChannelOp::NonFull),
            _ => None,
        }
    }
}

/// A reference to a variable, optionally indexed, optionally selecting a
/// `typedef` field (`x`, `a[i]`, `m.val`, `box[i].val`).
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    var: Arc<Variable>,
    index: Option<Box<Expression>>,
    field: Option<Box<VariableRef>>,
}

impl VariableRef {
    pub fn new(
        var: Arc<Variable>,
        index: Option<Expression>,
        span: &SourceSpan,
    ) -> Result<Self, ExprError> {
        if let Some(index) = &index {
            let Some(len) = var.array_len() else {
                return Err(ExprError::new(
                    ExprErrorKind::InvalidIndex,
                    format!("{} is not an array", var.name()),
                    span,
                ));
            };
            if !index.result_type().is_numeric() {
                return Err(ExprError::new(
                    ExprErrorKind::TypeMismatch,
                    format!("array index of {} must be numeric", var.name()),
                    index.span(),
                ));
            }
            if let Some(value) = index.constant_value() {
                if value < 0 || value >= i64::from(len) {
                    return Err(ExprError::new(
                        ExprErrorKind::InvalidIndex,
                        format!("index {value} out of bounds for {}[{len}]", var.name()),
                        index.span(),
                    ));
                }
            }
        }
        Ok(Self {
            var,
            index: index.map(Box::new),
            field: None,
        })
    }

    /// Selects `field` at the end of this reference chain.
    pub fn with_field(self, field: VariableRef, span: &SourceSpan) -> Result<Self, ExprError> {
        let VariableRef {
            var,
            index,
            field: inner,
        } = self;
        let inner = match inner {
            Some(inner) => inner.with_field(field, span)?,
            None => {
                let Some(layout) = var.struct_type() else {
                    return Err(ExprError::new(
                        ExprErrorKind::TypeMismatch,
                        format!("{} has no fields", var.name()),
                        span,
                    ));
                };
                if !layout.has_field(field.var.id()) {
                    return Err(ExprError::new(
                        ExprErrorKind::UnresolvedReference,
                        format!("{} has no field {}", layout.name(), field.var.name()),
                        span,
                    ));
                }
                field
            }
        };
        Ok(VariableRef {
            var,
            index,
            field: Some(Box::new(inner)),
        })
    }

    pub fn variable(&self) -> &Arc<Variable> {
        &self.var
    }

    pub fn index(&self) -> Option<&Expression> {
        self.index.as_deref()
    }

    pub fn field(&self) -> Option<&VariableRef> {
        self.field.as_deref()
    }

    /// The innermost referenced variable (the field, when one is selected).
    pub fn target(&self) -> &Arc<Variable> {
        match &self.field {
            Some(field) => field.target(),
            None => &self.var,
        }
    }

    /// `None` when the reference denotes a whole `typedef` value.
    pub fn result_type(&self) -> Option<VariableType> {
        self.target().scalar_type()
    }

    pub fn channel(&self) -> Option<&ChannelSignature> {
        self.target().channel()
    }

    /// The storage location this reference denotes. An array referenced
    /// without an index denotes its first element.
    pub fn access(&self) -> VariableAccess {
        let index = match (&self.index, self.var.is_array()) {
            (_, false) => AccessIndex::Scalar,
            (None, true) => AccessIndex::Element(0),
            (Some(index), true) => match index.constant_value() {
                // bounds were checked at construction
                Some(value) => AccessIndex::Element(value as u32),
                None => AccessIndex::AnyElement,
            },
        };
        let access = VariableAccess::new(Arc::clone(&self.var), index);
        match &self.field {
            Some(field) => access.with_field(field.access()),
            None => access,
        }
    }

    pub(crate) fn index_expressions(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(reference) = current {
            if let Some(index) = &reference.index {
                out.push(index.as_ref());
            }
            current = reference.field.as_deref();
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Literal),
    MType(MTypeCode),
    Variable(VariableRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `(cond -> then_branch : else_branch)`
    Ternary {
        cond: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    ChannelQuery {
        op: ChannelOp,
        channel: Box<Expression>,
    },
    /// Receive poll `c?[args]`: whether the head message matches, without
    /// removing it.
    Poll {
        channel: Box<Expression>,
        args: Vec<Expression>,
    },
    Eval(Box<Expression>),
}

/// An expression node together with its source span and result type.
///
/// Equality is structural and ignores spans.
#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExprKind,
    ty: VariableType,
    span: SourceSpan,
}

impl Expression {
    fn build(span: &SourceSpan, kind: ExprKind) -> Result<Self, ExprError> {
        let ty = typing::infer(&kind, span)?;
        Ok(Self {
            kind,
            ty,
            span: span.clone(),
        })
    }

    pub fn bool_literal(span: &SourceSpan, value: bool) -> Self {
        Self {
            kind: ExprKind::Constant(Literal::Bool(value)),
            ty: VariableType::Bool,
            span: span.clone(),
        }
    }

    pub fn int_literal(span: &SourceSpan, value: i64) -> Result<Self, ExprError> {
        Self::build(span, ExprKind::Constant(Literal::Int(value)))
    }

    /// Reference to an enumerated constant whose name was already resolved
    /// to `code`.
    pub fn mtype(span: &SourceSpan, code: MTypeCode) -> Self {
        Self {
            kind: ExprKind::MType(code),
            ty: VariableType::Mtype,
            span: span.clone(),
        }
    }

    pub fn variable(span: &SourceSpan, reference: VariableRef) -> Result<Self, ExprError> {
        Self::build(span, ExprKind::Variable(reference))
    }

    pub fn unary(span: &SourceSpan, op: UnaryOp, operand: Expression) -> Result<Self, ExprError> {
        Self::build(
            span,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        )
    }

    pub fn binary(
        span: &SourceSpan,
        op: BinaryOp,
        left: Expression,
        right: Expression,
    ) -> Result<Self, ExprError> {
        Self::build(
            span,
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    pub fn ternary(
        span: &SourceSpan,
        cond: Expression,
        then_branch: Expression,
        else_branch: Expression,
    ) -> Result<Self, ExprError> {
        Self::build(
            span,
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
        )
    }

    pub fn channel_query(
        span: &SourceSpan,
        op: ChannelOp,
        channel: Expression,
    ) -> Result<Self, ExprError> {
        Self::build(
            span,
            ExprKind::ChannelQuery {
                op,
                channel: Box::new(channel),
            },
        )
    }

    pub fn poll(
        span: &SourceSpan,
        channel: Expression,
        args: Vec<Expression>,
    ) -> Result<Self, ExprError> {
        Self::build(
            span,
            ExprKind::Poll {
                channel: Box::new(channel),
                args,
            },
        )
    }

    pub fn eval(span: &SourceSpan, inner: Expression) -> Result<Self, ExprError> {
        Self::build(span, ExprKind::Eval(Box::new(inner)))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn span(&self) -> &SourceSpan {
        &self.span
    }

    /// Fixed when the node was built; see [`crate::typing`] for the rules.
    pub fn result_type(&self) -> VariableType {
        self.ty
    }

    /// Direct sub-expressions, including index expressions of a variable
    /// reference.
    pub fn children(&self) -> Vec<&Expression> {
        match &self.kind {
            ExprKind::Constant(_) | ExprKind::MType(_) => Vec::new(),
            ExprKind::Variable(reference) => reference.index_expressions(),
            ExprKind::Unary { operand, .. } => vec![operand.as_ref()],
            ExprKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => vec![cond.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
            ExprKind::ChannelQuery { channel, .. } => vec![channel.as_ref()],
            ExprKind::Poll { channel, args } => {
                let mut out = vec![channel.as_ref()];
                out.extend(args.iter());
                out
            }
            ExprKind::Eval(inner) => vec![inner.as_ref()],
        }
    }

    /// Value of an expression built only from literals and enumerated
    /// constants. `None` if any operand varies at run time or the arithmetic
    /// leaves the `int` range.
    pub fn constant_value(&self) -> Option<i64> {
        let value = match &self.kind {
            ExprKind::Constant(literal) => literal.value(),
            ExprKind::MType(code) => i64::from(code.value()),
            ExprKind::Eval(inner) => inner.constant_value()?,
            ExprKind::Unary { op, operand } => {
                let value = operand.constant_value()?;
                match op {
                    UnaryOp::Neg => value.checked_neg()?,
                    UnaryOp::BitNot => !value,
                    UnaryOp::Not => i64::from(value == 0),
                }
            }
            ExprKind::Binary { op, left, right } => {
                fold_binary(*op, left.constant_value()?, right.constant_value()?)?
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                if cond.constant_value()? != 0 {
                    then_branch.constant_value()?
                } else {
                    else_branch.constant_value()?
                }
            }
            ExprKind::Variable(_) | ExprKind::ChannelQuery { .. } | ExprKind::Poll { .. } => {
                return None
            }
        };
        VariableType::Int.contains(value).then_some(value)
    }

    pub fn as_variable(&self) -> Option<&VariableRef> {
        match &self.kind {
            ExprKind::Variable(reference) => Some(reference),
            _ => None,
        }
    }
}

fn fold_binary(op: BinaryOp, left: i64, right: i64) -> Option<i64> {
    let value = match op {
        BinaryOp::Add => left.checked_add(right)?,
        BinaryOp::Sub => left.checked_sub(right)?,
        BinaryOp::Mul => left.checked_mul(right)?,
        BinaryOp::Div => left.checked_div(right)?,
        BinaryOp::Mod => left.checked_rem(right)?,
        BinaryOp::BitAnd => left & right,
        BinaryOp::BitOr => left | right,
        BinaryOp::BitXor => left ^ right,
        BinaryOp::Shl => left.checked_shl(u32::try_from(right).ok()?)?,
        BinaryOp::Shr => left.checked_shr(u32::try_from(right).ok()?)?,
        BinaryOp::And => i64::from(left != 0 && right != 0),
        BinaryOp::Or => i64::from(left != 0 || right != 0),
        BinaryOp::Eq => i64::from(left == right),
        BinaryOp::Ne => i64::from(left != right),
        BinaryOp::Lt => i64::from(left < right),
        BinaryOp::Le => i64::from(left <= right),
        BinaryOp::Gt => i64::from(left > right),
        BinaryOp::Ge => i64::from(left >= right),
    };
    Some(value)
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}
