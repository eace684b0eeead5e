//! Result-type rules.
//!
//! Every rule is a function of the node kind and the (already fixed) result
//! types of its children. Rules run once, when a node is built; operand
//! combinations without a rule are construction errors.

use crate::error::{ExprError, ExprErrorKind};
use crate::expr::{BinaryOp, ChannelOp, ExprKind, Expression, Literal, OperatorClass, UnaryOp};
use crate::types::SourceSpan;
use crate::variable::VariableType;

/// Natural type of an integer literal: the narrowest of `byte`, `short` and
/// `int` holding it.
pub fn literal_type(value: i64) -> Option<VariableType> {
    [VariableType::Byte, VariableType::Short, VariableType::Int]
        .into_iter()
        .find(|ty| ty.contains(value))
}

pub(crate) fn infer(kind: &ExprKind, span: &SourceSpan) -> Result<VariableType, ExprError> {
    match kind {
        ExprKind::Constant(Literal::Bool(_)) => Ok(VariableType::Bool),
        ExprKind::Constant(Literal::Int(value)) => literal_type(*value).ok_or_else(|| {
            ExprError::new(
                ExprErrorKind::InvalidLiteral,
                format!("integer literal out of range: {value}"),
                span,
            )
        }),
        ExprKind::MType(_) => Ok(VariableType::Mtype),
        ExprKind::Variable(reference) => reference.result_type().ok_or_else(|| {
            ExprError::new(
                ExprErrorKind::TypeMismatch,
                format!(
                    "{} is a typedef value, not a scalar",
                    reference.target().name()
                ),
                span,
            )
        }),
        ExprKind::Unary { op, operand } => unary(*op, operand.result_type(), span),
        ExprKind::Binary { op, left, right } => binary(*op, left, right, span),
        ExprKind::Ternary {
            cond,
            then_branch,
            else_branch,
        } => ternary(
            cond.result_type(),
            then_branch.result_type(),
            else_branch.result_type(),
            span,
        ),
        ExprKind::ChannelQuery { op, channel } => {
            expect_channel(channel, op.keyword())?;
            Ok(match op {
                ChannelOp::Len => VariableType::Byte,
                ChannelOp::Empty | ChannelOp::NonEmpty | ChannelOp::Full | ChannelOp::NonFull => {
                    VariableType::Bool
                }
            })
        }
        ExprKind::Poll { channel, args } => {
            check_message(channel, args, span)?;
            Ok(VariableType::Bool)
        }
        ExprKind::Eval(inner) => {
            let ty = inner.result_type();
            if !ty.is_numeric() {
                return Err(mismatch(span, format!("eval of a {ty} value")));
            }
            Ok(ty)
        }
    }
}

fn unary(op: UnaryOp, operand: VariableType, span: &SourceSpan) -> Result<VariableType, ExprError> {
    if !operand.is_numeric() {
        return Err(mismatch(
            span,
            format!("operator {} applied to {operand}", op.symbol()),
        ));
    }
    Ok(match op {
        UnaryOp::Neg => {
            let ty = operand.arithmetic();
            if ty.bits() <= 8 {
                VariableType::Short
            } else {
                ty
            }
        }
        UnaryOp::BitNot => VariableType::Int,
        UnaryOp::Not => VariableType::Bool,
    })
}

fn binary(
    op: BinaryOp,
    left: &Expression,
    right: &Expression,
    span: &SourceSpan,
) -> Result<VariableType, ExprError> {
    let (lhs, rhs) = (left.result_type(), right.result_type());
    let class = op.class();
    if class == OperatorClass::Equality {
        if lhs.is_numeric() != rhs.is_numeric() {
            return Err(mismatch(span, format!("cannot compare {lhs} with {rhs}")));
        }
        return Ok(VariableType::Bool);
    }

    if !lhs.is_numeric() || !rhs.is_numeric() {
        return Err(mismatch(
            span,
            format!("operator {} applied to {lhs} and {rhs}", op.symbol()),
        ));
    }
    match class {
        OperatorClass::Arithmetic | OperatorClass::Bitwise => {
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && right.constant_value() == Some(0) {
                return Err(ExprError::new(
                    ExprErrorKind::InvalidOperand,
                    "division by zero",
                    right.span(),
                ));
            }
            Ok(lhs.wider(rhs))
        }
        OperatorClass::Shift => Ok(lhs.arithmetic()),
        OperatorClass::Logical | OperatorClass::Ordering | OperatorClass::Equality => {
            Ok(VariableType::Bool)
        }
    }
}

fn ternary(
    cond: VariableType,
    then_ty: VariableType,
    else_ty: VariableType,
    span: &SourceSpan,
) -> Result<VariableType, ExprError> {
    if !cond.is_numeric() {
        return Err(mismatch(span, format!("condition of type {cond}")));
    }
    match (then_ty, else_ty) {
        (VariableType::Chan, VariableType::Chan) => Ok(VariableType::Chan),
        (VariableType::Chan, _) | (_, VariableType::Chan) => Err(mismatch(
            span,
            format!("branches of type {then_ty} and {else_ty}"),
        )),
        (VariableType::Mtype, VariableType::Mtype) => Ok(VariableType::Mtype),
        (VariableType::Bool, VariableType::Bool) => Ok(VariableType::Bool),
        _ => Ok(then_ty.wider(else_ty)),
    }
}

/// Checks message arguments against the channel's declared fields. Channels
/// declared without a signature accept any non-empty argument list.
pub(crate) fn check_message(
    channel: &Expression,
    args: &[Expression],
    span: &SourceSpan,
) -> Result<(), ExprError> {
    expect_channel(channel, "message")?;
    if args.is_empty() {
        return Err(ExprError::new(
            ExprErrorKind::ArityMismatch,
            "message needs at least one field",
            span,
        ));
    }
    let Some(signature) = channel.as_variable().and_then(|r| r.channel()) else {
        return Ok(());
    };
    if signature.fields.len() != args.len() {
        return Err(ExprError::new(
            ExprErrorKind::ArityMismatch,
            format!(
                "channel expects {} field(s), got {}",
                signature.fields.len(),
                args.len()
            ),
            span,
        ));
    }
    for (field, arg) in signature.fields.iter().zip(args) {
        if !field.accepts(arg.result_type()) {
            return Err(mismatch(
                arg.span(),
                format!("{} value in a {field} message field", arg.result_type()),
            ));
        }
    }
    Ok(())
}

fn expect_channel(channel: &Expression, what: &str) -> Result<(), ExprError> {
    let ty = channel.result_type();
    if ty != VariableType::Chan {
        return Err(mismatch(
            channel.span(),
            format!("{what} needs a chan operand, got {ty}"),
        ));
    }
    Ok(())
}

fn mismatch(span: &SourceSpan, message: String) -> ExprError {
    ExprError::new(ExprErrorKind::TypeMismatch, message, span)
}
