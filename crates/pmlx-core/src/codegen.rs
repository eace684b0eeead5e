//! Target-code text for expressions.
//!
//! The generated text is a sub-expression in a strongly typed, C-family
//! expression grammar: integers and booleans do not convert implicitly, so
//! every node renders in both an integer and a boolean context. State
//! variables are integers; channel inspections call the runtime helpers
//! named below.

use crate::expr::{ChannelOp, ExprKind, Expression, OperatorClass, UnaryOp, VariableRef};

/// Matches any value in a receive poll.
pub const POLL_WILDCARD: &str = "ANY";

pub fn channel_helper(op: ChannelOp) -> &'static str {
    match op {
        ChannelOp::Len => "chan_len",
        ChannelOp::Empty => "chan_empty",
        ChannelOp::NonEmpty => "chan_nempty",
        ChannelOp::Full => "chan_full",
        ChannelOp::NonFull => "chan_nfull",
    }
}

pub const POLL_HELPER: &str = "chan_poll";

impl Expression {
    /// Text evaluating to this expression's integer value.
    pub fn int_code(&self) -> String {
        match self.kind() {
            ExprKind::Constant(literal) => int_literal(literal.value()),
            ExprKind::MType(code) => code.to_string(),
            ExprKind::Variable(reference) => reference.code(),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg => format!("(-{})", operand.int_code()),
                UnaryOp::BitNot => format!("(~{})", operand.int_code()),
                UnaryOp::Not => bool_to_int(&self.bool_code()),
            },
            ExprKind::Binary { op, left, right } => match op.class() {
                OperatorClass::Arithmetic | OperatorClass::Bitwise | OperatorClass::Shift => {
                    format!("({} {} {})", left.int_code(), op.symbol(), right.int_code())
                }
                OperatorClass::Logical | OperatorClass::Equality | OperatorClass::Ordering => {
                    bool_to_int(&self.bool_code())
                }
            },
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => format!(
                "({} ? {} : {})",
                cond.bool_code(),
                then_branch.int_code(),
                else_branch.int_code()
            ),
            ExprKind::ChannelQuery {
                op: ChannelOp::Len,
                channel,
            } => format!("{}({})", channel_helper(ChannelOp::Len), channel.int_code()),
            ExprKind::ChannelQuery { .. } | ExprKind::Poll { .. } => {
                bool_to_int(&self.bool_code())
            }
            ExprKind::Eval(inner) => inner.int_code(),
        }
    }

    /// Text evaluating to this expression's truth value.
    pub fn bool_code(&self) -> String {
        match self.kind() {
            ExprKind::Constant(literal) => bool_literal(literal.value() != 0),
            ExprKind::MType(code) => bool_literal(code.value() != 0),
            ExprKind::Variable(_) => int_to_bool(&self.int_code()),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => format!("!{}", operand.bool_code()),
                UnaryOp::Neg | UnaryOp::BitNot => int_to_bool(&self.int_code()),
            },
            ExprKind::Binary { op, left, right } => match op.class() {
                OperatorClass::Logical => {
                    format!("({} {} {})", left.bool_code(), op.symbol(), right.bool_code())
                }
                OperatorClass::Equality | OperatorClass::Ordering => {
                    format!("({} {} {})", left.int_code(), op.symbol(), right.int_code())
                }
                OperatorClass::Arithmetic | OperatorClass::Bitwise | OperatorClass::Shift => {
                    int_to_bool(&self.int_code())
                }
            },
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => format!(
                "({} ? {} : {})",
                cond.bool_code(),
                then_branch.bool_code(),
                else_branch.bool_code()
            ),
            ExprKind::ChannelQuery { op, channel } => match op {
                ChannelOp::Len => int_to_bool(&self.int_code()),
                ChannelOp::Empty | ChannelOp::NonEmpty | ChannelOp::Full | ChannelOp::NonFull => {
                    format!("{}({})", channel_helper(*op), channel.int_code())
                }
            },
            ExprKind::Poll { channel, args } => {
                let mut parts = vec![channel.int_code()];
                parts.extend(args.iter().map(poll_argument));
                format!("{POLL_HELPER}({})", parts.join(", "))
            }
            ExprKind::Eval(inner) => inner.bool_code(),
        }
    }
}

impl VariableRef {
    /// Location text, e.g. `box[(i + 1)].val`.
    pub fn code(&self) -> String {
        let mut out = self.variable().name().to_string();
        if self.variable().is_array() {
            match self.index() {
                Some(index) => out.push_str(&format!("[{}]", index.int_code())),
                None => out.push_str("[0]"),
            }
        }
        if let Some(field) = self.field() {
            out.push('.');
            out.push_str(&field.code());
        }
        out
    }
}

/// Plain variable arguments of a poll match anything; everything else is
/// compared by value.
fn poll_argument(arg: &Expression) -> String {
    match arg.kind() {
        ExprKind::Variable(_) => POLL_WILDCARD.to_string(),
        _ => arg.int_code(),
    }
}

fn int_literal(value: i64) -> String {
    if value < 0 {
        format!("({value})")
    } else {
        value.to_string()
    }
}

fn bool_literal(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

fn bool_to_int(code: &str) -> String {
    format!("({code} ? 1 : 0)")
}

fn int_to_bool(code: &str) -> String {
    format!("({code} != 0)")
}
