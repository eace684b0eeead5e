pub mod analysis;
pub mod codegen;
pub mod deps;
pub mod error;
pub mod expr;
pub mod frontend;
pub mod frontend_simple;
pub mod ir;
pub mod mtype;
pub mod types;
pub mod typing;
pub mod variable;

pub use analysis::{
    analyze, analyze_parallel, AnalysisError, AnalysisReport, EntryKind, EntryReport,
};
pub use deps::{AccessSet, Dependencies};
pub use error::{ExprError, ExprErrorKind};
pub use expr::{
    BinaryOp, ChannelOp, ExprKind, Expression, Literal, OperatorClass, UnaryOp, VariableRef,
};
pub use frontend::{Frontend, FrontendOutput};
pub use frontend_simple::{FrontendError, FrontendErrorKind, SimpleFrontend};
pub use ir::{CoreIr, Definition, Initializer, Model, Spanned};
pub use mtype::{MTypeCode, MTypeRegistry, MTypeRegistryBuilder, MAX_MTYPES};
pub use types::{CheckResult, Diagnostic, ModelStats, Reason, ReasonKind, SourceSpan, Status};
pub use variable::{
    AccessIndex, ChannelSignature, FieldDecl, Layout, StructType, VarId, Variable,
    VariableAccess, VariableTable, VariableType,
};
