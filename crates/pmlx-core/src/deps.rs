//! Variable dependencies.
//!
//! [`Expression::read_variables`] is what partial-order reduction relies on:
//! it must list every location an evaluation may read. Expressions never
//! write, so write sets only come from the statement-shaped summaries built
//! by [`Dependencies`].

use crate::error::{ExprError, ExprErrorKind};
use crate::expr::{ExprKind, Expression, VariableRef};
use crate::typing;
use crate::variable::VariableAccess;
use std::collections::BTreeSet;

pub type AccessSet = BTreeSet<VariableAccess>;

impl Expression {
    /// Every location this expression may read, children included.
    pub fn read_variables(&self) -> AccessSet {
        let mut out = AccessSet::new();
        self.collect_reads(&mut out);
        out
    }

    fn collect_reads(&self, out: &mut AccessSet) {
        match self.kind() {
            ExprKind::Constant(_) | ExprKind::MType(_) => {}
            ExprKind::Variable(reference) => {
                out.insert(reference.access());
                reference.collect_index_reads(out);
            }
            ExprKind::Unary { operand, .. } => operand.collect_reads(out),
            ExprKind::Binary { left, right, .. } => {
                left.collect_reads(out);
                right.collect_reads(out);
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.collect_reads(out);
                then_branch.collect_reads(out);
                else_branch.collect_reads(out);
            }
            ExprKind::ChannelQuery { channel, .. } => channel.collect_reads(out),
            ExprKind::Poll { channel, args } => {
                channel.collect_reads(out);
                for arg in args {
                    // a plain variable argument matches any value
                    match arg.as_variable() {
                        Some(reference) => reference.collect_index_reads(out),
                        None => arg.collect_reads(out),
                    }
                }
            }
            ExprKind::Eval(inner) => inner.collect_reads(out),
        }
    }
}

impl VariableRef {
    /// Locations read while computing where this reference points, i.e. the
    /// reads of its index expressions. Excludes the location itself.
    pub fn index_reads(&self) -> AccessSet {
        let mut out = AccessSet::new();
        self.collect_index_reads(&mut out);
        out
    }

    fn collect_index_reads(&self, out: &mut AccessSet) {
        for index in self.index_expressions() {
            index.collect_reads(out);
        }
    }
}

/// Read and write sets of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    reads: AccessSet,
    writes: AccessSet,
}

impl Dependencies {
    /// Evaluating a guard or condition: reads only.
    pub fn of_expression(expr: &Expression) -> Self {
        Self {
            reads: expr.read_variables(),
            writes: AccessSet::new(),
        }
    }

    /// `target = value`
    pub fn of_assignment(target: &Expression, value: &Expression) -> Result<Self, ExprError> {
        let reference = lvalue(target)?;
        let (target_ty, value_ty) = (target.result_type(), value.result_type());
        if !target_ty.accepts(value_ty) {
            return Err(ExprError::new(
                ExprErrorKind::TypeMismatch,
                format!("cannot assign {value_ty} to {target_ty}"),
                value.span(),
            ));
        }
        let mut reads = value.read_variables();
        reads.extend(reference.index_reads());
        Ok(Self {
            reads,
            writes: AccessSet::from([reference.access()]),
        })
    }

    /// `channel!args`: reads the arguments, writes the channel.
    pub fn of_send(channel: &Expression, args: &[Expression]) -> Result<Self, ExprError> {
        let reference = lvalue(channel)?;
        typing::check_message(channel, args, channel.span())?;
        let mut reads = reference.index_reads();
        for arg in args {
            reads.extend(arg.read_variables());
        }
        Ok(Self {
            reads,
            writes: AccessSet::from([reference.access()]),
        })
    }

    /// `channel?targets`: writes the channel and every variable target;
    /// constant and `eval` targets are only compared.
    pub fn of_receive(channel: &Expression, targets: &[Expression]) -> Result<Self, ExprError> {
        let reference = lvalue(channel)?;
        typing::check_message(channel, targets, channel.span())?;
        let mut reads = reference.index_reads();
        let mut writes = AccessSet::from([reference.access()]);
        for target in targets {
            match target.as_variable() {
                Some(variable) => {
                    writes.insert(variable.access());
                    reads.extend(variable.index_reads());
                }
                None => reads.extend(target.read_variables()),
            }
        }
        Ok(Self { reads, writes })
    }

    pub fn reads(&self) -> &AccessSet {
        &self.reads
    }

    pub fn writes(&self) -> &AccessSet {
        &self.writes
    }

    pub fn union(mut self, other: &Dependencies) -> Self {
        self.reads.extend(other.reads.iter().cloned());
        self.writes.extend(other.writes.iter().cloned());
        self
    }

    /// No write of either side may touch a location the other side reads or
    /// writes.
    pub fn is_independent_of(&self, other: &Dependencies) -> bool {
        !overlapping(&self.writes, &other.reads)
            && !overlapping(&self.writes, &other.writes)
            && !overlapping(&other.writes, &self.reads)
    }
}

fn overlapping(left: &AccessSet, right: &AccessSet) -> bool {
    left.iter()
        .any(|access| right.iter().any(|other| access.overlaps(other)))
}

fn lvalue(expr: &Expression) -> Result<&VariableRef, ExprError> {
    expr.as_variable().ok_or_else(|| {
        ExprError::new(
            ExprErrorKind::NotAnLvalue,
            "write target must be a variable",
            expr.span(),
        )
    })
}
