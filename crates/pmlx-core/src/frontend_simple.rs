use crate::error::{render, ExprError, ExprErrorKind};
use crate::expr::{BinaryOp, ChannelOp, Expression, UnaryOp, VariableRef};
use crate::frontend::{Frontend, FrontendOutput};
use crate::ir::{Definition, Initializer, Model, Spanned};
use crate::mtype::{MTypeCode, MTypeRegistry, MTypeRegistryBuilder};
use crate::types::{Diagnostic, SourceSpan};
use crate::variable::{ChannelSignature, FieldDecl, Variable, VariableTable, VariableType};
use indexmap::IndexMap;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendErrorKind {
    UnsupportedSyntax,
    InvalidInput,
    /// Well-formed syntax that names, types or bounds reject.
    Semantic(ExprErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.span, .message))]
pub struct FrontendError {
    pub kind: FrontendErrorKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl FrontendError {
    fn unsupported(message: impl Into<String>, span: &SourceSpan) -> Self {
        Self {
            kind: FrontendErrorKind::UnsupportedSyntax,
            message: message.into(),
            span: Some(span.clone()),
        }
    }

    fn semantic(kind: ExprErrorKind, message: impl Into<String>, span: &SourceSpan) -> Self {
        ExprError::new(kind, message, span).into()
    }
}

impl From<ExprError> for FrontendError {
    fn from(error: ExprError) -> Self {
        Self {
            kind: FrontendErrorKind::Semantic(error.kind),
            message: error.message,
            span: error.span,
        }
    }
}

impl From<io::Error> for FrontendError {
    fn from(error: io::Error) -> Self {
        Self {
            kind: FrontendErrorKind::InvalidInput,
            message: format!("cannot read input: {error}"),
            span: None,
        }
    }
}

/// Frontend for the declaration part of a Promela model: `mtype`, `typedef`,
/// global variables and channels, and constant `#define`s.
///
/// Process bodies (`proctype`, `init`, `never`, ...) are reported as
/// unsupported syntax.
#[derive(Debug, Default)]
pub struct SimpleFrontend {
    mtype_base: u32,
}

impl SimpleFrontend {
    /// Codes of enumerated constants start at `base` instead of 0.
    pub fn with_mtype_base(base: u32) -> Self {
        Self { mtype_base: base }
    }
}

impl Frontend for SimpleFrontend {
    type Ir = Model;
    type Error = FrontendError;

    fn parse_and_resolve(
        &self,
        input: &str,
        path: &str,
    ) -> Result<FrontendOutput<Self::Ir>, Self::Error> {
        let tokens = lex(input, path)?;
        trace!("lexed {} token(s) from {path}", tokens.len());
        let mut parser = Parser::new(tokens, path);
        let parsed = parser.parse_module()?;

        if parsed.items.is_empty() && parsed.unsupported.is_empty() {
            return Err(FrontendError {
                kind: FrontendErrorKind::InvalidInput,
                message: "empty input".to_string(),
                span: None,
            });
        }

        let (model, diagnostics) = resolve_module(parsed, self.mtype_base)?;
        debug!(
            "resolved {path}: {} mtype(s), {} variable(s), {} definition(s)",
            model.mtypes.len(),
            model.variables.len(),
            model.definitions.len()
        );
        Ok(FrontendOutput {
            ir: model,
            diagnostics,
        })
    }
}

fn resolve_module(
    parsed: ParsedModule,
    mtype_base: u32,
) -> Result<(Model, Vec<Diagnostic>), FrontendError> {
    if let Some(unsupported) = parsed.unsupported.first() {
        return Err(FrontendError::unsupported(
            unsupported.message.clone(),
            &unsupported.span,
        ));
    }

    // Every enumerated constant is known before the first expression is built.
    let mut builder = MTypeRegistryBuilder::with_base(mtype_base);
    let mut mtype_spans = HashMap::new();
    for item in &parsed.items {
        if let Item::MTypes(names) = item {
            for name in names {
                builder.declare(&name.value, &name.span)?;
                mtype_spans.insert(name.value.clone(), name.span.clone());
            }
        }
    }
    let mtypes = builder.freeze();

    let mut variables = VariableTable::new();
    let mut definitions = IndexMap::<String, Definition>::new();
    let mut initializers = Vec::new();
    let mut used_mtypes = HashSet::new();

    for item in &parsed.items {
        match item {
            Item::MTypes(_) => {}
            Item::Typedef { name, fields } => {
                let mut decls = Vec::with_capacity(fields.len());
                for field in fields {
                    let ty = match &field.ty.value {
                        RawType::Scalar(ty) => *ty,
                        RawType::Named(inner) => {
                            return Err(FrontendError::unsupported(
                                format!(
                                    "unsupported syntax: typedef field {}.{} of typedef type {inner}",
                                    name.value, field.name.value
                                ),
                                &field.ty.span,
                            ))
                        }
                    };
                    decls.push(FieldDecl {
                        name: field.name.value.clone(),
                        ty,
                        array_len: resolve_size(field.size.as_ref(), &definitions)?,
                    });
                }
                variables.define_struct(&name.value, decls, &name.span)?;
            }
            Item::Variables { ty, decls } => {
                for decl in decls {
                    check_fresh(&decl.name, &mtypes, &definitions)?;
                    let array_len = resolve_size(decl.size.as_ref(), &definitions)?;
                    match (&ty.value, &decl.init) {
                        (RawType::Scalar(VariableType::Chan), Some(RawInit::Value(value))) => {
                            return Err(FrontendError {
                                kind: FrontendErrorKind::InvalidInput,
                                message: format!(
                                    "channel {} must be initialized with [N] of {{...}}",
                                    decl.name.value
                                ),
                                span: Some(value.span.clone()),
                            });
                        }
                        (RawType::Scalar(VariableType::Chan), init) => {
                            let signature = match init {
                                Some(RawInit::Channel { capacity, fields, .. }) => {
                                    Some(ChannelSignature {
                                        capacity: resolve_size(Some(capacity), &definitions)?
                                            .unwrap_or_default(),
                                        fields: message_fields(fields)?,
                                    })
                                }
                                _ => None,
                            };
                            variables.declare_channel(
                                &decl.name.value,
                                signature,
                                array_len,
                                &decl.name.span,
                            )?;
                        }
                        (_, Some(RawInit::Channel { span, .. })) => {
                            return Err(FrontendError {
                                kind: FrontendErrorKind::InvalidInput,
                                message: format!(
                                    "{} is not a channel and cannot take a channel initializer",
                                    decl.name.value
                                ),
                                span: Some(span.clone()),
                            });
                        }
                        (RawType::Scalar(scalar), init) => {
                            let value = match init {
                                Some(RawInit::Value(raw)) => {
                                    let mut resolver = Resolver {
                                        mtypes: &mtypes,
                                        variables: &variables,
                                        definitions: &definitions,
                                        used_mtypes: &mut used_mtypes,
                                    };
                                    Some(resolver.expr(raw)?)
                                }
                                _ => None,
                            };
                            let variable = variables.declare_scalar(
                                &decl.name.value,
                                *scalar,
                                array_len,
                                &decl.name.span,
                            )?;
                            if let Some(value) = value {
                                if !scalar.accepts(value.result_type()) {
                                    return Err(FrontendError::semantic(
                                        ExprErrorKind::TypeMismatch,
                                        format!(
                                            "cannot initialize {} {} with {}",
                                            scalar,
                                            decl.name.value,
                                            value.result_type()
                                        ),
                                        value.span(),
                                    ));
                                }
                                initializers.push(Initializer { variable, value });
                            }
                        }
                        (RawType::Named(type_name), init) => {
                            if let Some(RawInit::Value(value)) = init {
                                return Err(FrontendError {
                                    kind: FrontendErrorKind::InvalidInput,
                                    message: format!(
                                        "typedef variable {} cannot have an initializer",
                                        decl.name.value
                                    ),
                                    span: Some(value.span.clone()),
                                });
                            }
                            variables.declare_struct_var(
                                &decl.name.value,
                                type_name,
                                array_len,
                                &decl.name.span,
                            )?;
                        }
                    }
                }
            }
            Item::Define { name, body } => {
                check_fresh(name, &mtypes, &definitions)?;
                if variables.lookup(&name.value).is_some() {
                    return Err(FrontendError::semantic(
                        ExprErrorKind::DuplicateDeclaration,
                        format!("{} is already a variable", name.value),
                        &name.span,
                    ));
                }
                let mut resolver = Resolver {
                    mtypes: &mtypes,
                    variables: &variables,
                    definitions: &definitions,
                    used_mtypes: &mut used_mtypes,
                };
                let expr = resolver.expr(body)?;
                trace!("#define {} : {}", name.value, expr.result_type());
                definitions.insert(
                    name.value.clone(),
                    Definition {
                        name: name.clone(),
                        expr,
                    },
                );
            }
        }
    }

    let diagnostics = mtypes
        .iter()
        .filter(|(_, code)| !used_mtypes.contains(code))
        .map(|(name, _)| Diagnostic {
            message: format!("mtype constant {name} is never used"),
            span: mtype_spans.get(name).cloned(),
        })
        .collect();

    let model = Model {
        mtypes: Arc::new(mtypes),
        variables: Arc::new(variables),
        initializers,
        definitions: definitions.into_values().collect(),
    };
    Ok((model, diagnostics))
}

/// Variables and macros share one namespace with the enumerated constants.
fn check_fresh(
    name: &Spanned<String>,
    mtypes: &MTypeRegistry,
    definitions: &IndexMap<String, Definition>,
) -> Result<(), FrontendError> {
    let clash = if mtypes.code(&name.value).is_some() {
        "an mtype constant"
    } else if definitions.contains_key(&name.value) {
        "a #define"
    } else {
        return Ok(());
    };
    Err(FrontendError::semantic(
        ExprErrorKind::DuplicateDeclaration,
        format!("{} is already {clash}", name.value),
        &name.span,
    ))
}

fn resolve_size(
    size: Option<&RawSize>,
    definitions: &IndexMap<String, Definition>,
) -> Result<Option<u32>, FrontendError> {
    let Some(size) = size else {
        return Ok(None);
    };
    let (value, span) = match size {
        RawSize::Literal(literal) => (i64::try_from(literal.value).ok(), &literal.span),
        RawSize::Named(name) => {
            let value = definitions
                .get(&name.value)
                .and_then(|definition| definition.expr.constant_value())
                .ok_or_else(|| {
                    FrontendError::semantic(
                        ExprErrorKind::UnresolvedReference,
                        format!("size {} is not a constant #define", name.value),
                        &name.span,
                    )
                })?;
            (Some(value), &name.span)
        }
    };
    value
        .and_then(|value| u32::try_from(value).ok())
        .map(Some)
        .ok_or_else(|| {
            FrontendError::semantic(ExprErrorKind::InvalidIndex, "size out of range", span)
        })
}

fn message_fields(fields: &[Spanned<RawType>]) -> Result<Vec<VariableType>, FrontendError> {
    fields
        .iter()
        .map(|field| match &field.value {
            RawType::Scalar(ty) => Ok(*ty),
            RawType::Named(name) => Err(FrontendError::unsupported(
                format!("unsupported syntax: typedef {name} in a channel message"),
                &field.span,
            )),
        })
        .collect()
}

/// Turns raw syntax into typed expressions. Macro names expand to their
/// resolved body; other names are tried as enumerated constants, then as
/// variables.
fn int_literal(value: i128, span: &SourceSpan) -> Result<Expression, ExprError> {
    let value = i64::try_from(value).map_err(|_| {
        ExprError::new(
            ExprErrorKind::InvalidLiteral,
            format!("integer literal {value} is out of range"),
            span,
        )
    })?;
    Expression::int_literal(span, value)
}

struct Resolver<'a> {
    mtypes: &'a MTypeRegistry,
    variables: &'a VariableTable,
    definitions: &'a IndexMap<String, Definition>,
    used_mtypes: &'a mut HashSet<MTypeCode>,
}

impl Resolver<'_> {
    fn expr(&mut self, raw: &Spanned<RawExpr>) -> Result<Expression, ExprError> {
        let span = &raw.span;
        match &raw.value {
            RawExpr::Int(value) => int_literal(i128::from(*value), span),
            RawExpr::Bool(value) => Ok(Expression::bool_literal(span, *value)),
            RawExpr::Ref(reference) => self.reference(reference, span),
            RawExpr::Unary { op, operand } => match (op, &operand.value) {
                // `-2147483648` only fits `int` once negated
                (UnaryOp::Neg, RawExpr::Int(magnitude)) => {
                    int_literal(-i128::from(*magnitude), span)
                }
                _ => {
                    let operand = self.expr(operand)?;
                    Expression::unary(span, *op, operand)
                }
            },
            RawExpr::Binary { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Expression::binary(span, *op, left, right)
            }
            RawExpr::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr(cond)?;
                let then_branch = self.expr(then_branch)?;
                let else_branch = self.expr(else_branch)?;
                Expression::ternary(span, cond, then_branch, else_branch)
            }
            RawExpr::ChannelQuery { op, channel } => {
                let channel = self.expr(channel)?;
                Expression::channel_query(span, *op, channel)
            }
            RawExpr::Poll { channel, args } => {
                let channel = self.expr(channel)?;
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Expression::poll(span, channel, args)
            }
            RawExpr::Eval(inner) => {
                let inner = self.expr(inner)?;
                Expression::eval(span, inner)
            }
        }
    }

    fn reference(&mut self, raw: &RawRef, span: &SourceSpan) -> Result<Expression, ExprError> {
        let name = &raw.name.value;
        let plain = raw.index.is_none() && raw.field.is_none();

        if let Some(definition) = self.definitions.get(name) {
            if !plain {
                return Err(ExprError::new(
                    ExprErrorKind::TypeMismatch,
                    format!("#define {name} cannot be indexed"),
                    span,
                ));
            }
            return Ok(definition.expr.clone());
        }
        if let Some(code) = self.mtypes.code(name) {
            if !plain {
                return Err(ExprError::new(
                    ExprErrorKind::TypeMismatch,
                    format!("mtype constant {name} cannot be indexed"),
                    span,
                ));
            }
            self.used_mtypes.insert(code);
            return Ok(Expression::mtype(span, code));
        }

        let variable = self.variables.resolve(name, &raw.name.span)?;
        let reference = self.variable_ref(variable, raw)?;
        Expression::variable(span, reference)
    }

    fn variable_ref(
        &mut self,
        variable: Arc<Variable>,
        raw: &RawRef,
    ) -> Result<VariableRef, ExprError> {
        let index = raw
            .index
            .as_deref()
            .map(|index| self.expr(index))
            .transpose()?;
        let reference = VariableRef::new(Arc::clone(&variable), index, &raw.name.span)?;
        let Some(field) = &raw.field else {
            return Ok(reference);
        };

        let Some(layout) = variable.struct_type() else {
            return Err(ExprError::new(
                ExprErrorKind::TypeMismatch,
                format!("{} has no fields", variable.name()),
                &field.name.span,
            ));
        };
        let member = layout.field(&field.name.value).cloned().ok_or_else(|| {
            ExprError::new(
                ExprErrorKind::UnresolvedReference,
                format!("{} has no field {}", layout.name(), field.name.value),
                &field.name.span,
            )
        })?;
        let inner = self.variable_ref(member, field)?;
        reference.with_field(inner, &field.name.span)
    }
}

#[derive(Debug, Clone)]
struct Unsupported {
    message: String,
    span: SourceSpan,
}

#[derive(Debug, Default)]
struct ParsedModule {
    items: Vec<Item>,
    unsupported: Vec<Unsupported>,
}

#[derive(Debug, Clone)]
enum Item {
    MTypes(Vec<Spanned<String>>),
    Typedef {
        name: Spanned<String>,
        fields: Vec<RawField>,
    },
    Variables {
        ty: Spanned<RawType>,
        decls: Vec<VarDecl>,
    },
    Define {
        name: Spanned<String>,
        body: Spanned<RawExpr>,
    },
}

#[derive(Debug, Clone)]
enum RawType {
    Scalar(VariableType),
    Named(String),
}

#[derive(Debug, Clone)]
enum RawSize {
    Literal(Spanned<u64>),
    Named(Spanned<String>),
}

#[derive(Debug, Clone)]
struct RawField {
    ty: Spanned<RawType>,
    name: Spanned<String>,
    size: Option<RawSize>,
}

#[derive(Debug, Clone)]
struct VarDecl {
    name: Spanned<String>,
    size: Option<RawSize>,
    init: Option<RawInit>,
}

#[derive(Debug, Clone)]
enum RawInit {
    Value(Spanned<RawExpr>),
    /// `[capacity] of { fields }`
    Channel {
        capacity: RawSize,
        fields: Vec<Spanned<RawType>>,
        span: SourceSpan,
    },
}

#[derive(Debug, Clone)]
struct RawRef {
    name: Spanned<String>,
    index: Option<Box<Spanned<RawExpr>>>,
    field: Option<Box<RawRef>>,
}

#[derive(Debug, Clone)]
enum RawExpr {
    Int(u64),
    Bool(bool),
    Ref(RawRef),
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<RawExpr>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Spanned<RawExpr>>,
        right: Box<Spanned<RawExpr>>,
    },
    Ternary {
        cond: Box<Spanned<RawExpr>>,
        then_branch: Box<Spanned<RawExpr>>,
        else_branch: Box<Spanned<RawExpr>>,
    },
    ChannelQuery {
        op: ChannelOp,
        channel: Box<Spanned<RawExpr>>,
    },
    Poll {
        channel: Box<Spanned<RawExpr>>,
        args: Vec<Spanned<RawExpr>>,
    },
    Eval(Box<Spanned<RawExpr>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    Int(u64),
    TypeName(VariableType),
    ChanOp(ChannelOp),
    /// Keyword or directive opening a construct this frontend skips.
    Unsupported(String),
    Mtype,
    Typedef,
    Chan,
    Of,
    Define,
    True,
    False,
    Skip,
    Eval,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Semi,
    Comma,
    Dot,
    Assign,
    Arrow,
    Colon,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Shl,
    Shr,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Only emitted at the end of a preprocessor line.
    Newline,
    Eof,
}

fn lex(input: &str, path: &str) -> Result<Vec<Token>, FrontendError> {
    let bytes = input.as_bytes();
    let mut idx = 0usize;
    let mut line = 1u32;
    let mut col = 1u32;
    let mut in_directive = false;
    let mut tokens = Vec::new();

    let make_span = |start_line: u32, start_col: u32, end_line: u32, end_col: u32| SourceSpan {
        path: path.to_string(),
        start_line,
        start_col,
        end_line,
        end_col,
    };

    let bump = |idx: &mut usize, line: &mut u32, col: &mut u32| -> Option<u8> {
        let b = *bytes.get(*idx)?;
        *idx += 1;
        match b {
            b'\n' => {
                *line += 1;
                *col = 1;
            }
            _ => {
                *col += 1;
            }
        }
        Some(b)
    };

    let push_fixed = |tokens: &mut Vec<Token>,
                      kind: TokenKind,
                      len: usize,
                      idx: &mut usize,
                      line: &mut u32,
                      col: &mut u32| {
        let span = make_span(*line, *col, *line, *col + len as u32 - 1);
        for _ in 0..len {
            bump(idx, line, col);
        }
        tokens.push(Token { kind, span });
    };

    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    while idx < bytes.len() {
        let b = bytes[idx];
        let start_line = line;
        let start_col = col;

        match b {
            b' ' | b'\t' | b'\r' => {
                bump(&mut idx, &mut line, &mut col);
            }
            b'\\' if bytes.get(idx + 1) == Some(&b'\n') => {
                bump(&mut idx, &mut line, &mut col);
                bump(&mut idx, &mut line, &mut col);
            }
            b'\n' => {
                if in_directive {
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        span: make_span(line, col, line, col),
                    });
                    in_directive = false;
                }
                bump(&mut idx, &mut line, &mut col);
            }
            b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    bump(&mut idx, &mut line, &mut col);
                }
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                bump(&mut idx, &mut line, &mut col);
                bump(&mut idx, &mut line, &mut col);
                loop {
                    if idx >= bytes.len() {
                        return Err(FrontendError {
                            kind: FrontendErrorKind::InvalidInput,
                            message: "unterminated comment".to_string(),
                            span: Some(make_span(start_line, start_col, start_line, start_col)),
                        });
                    }
                    if bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                        bump(&mut idx, &mut line, &mut col);
                        bump(&mut idx, &mut line, &mut col);
                        break;
                    }
                    bump(&mut idx, &mut line, &mut col);
                }
            }
            b'#' => {
                bump(&mut idx, &mut line, &mut col);
                let start = idx;
                while idx < bytes.len() && is_ident(bytes[idx]) {
                    bump(&mut idx, &mut line, &mut col);
                }
                let word = &input[start..idx];
                let kind = match word {
                    "define" => TokenKind::Define,
                    _ => TokenKind::Unsupported(format!("#{word}")),
                };
                let span = make_span(start_line, start_col, start_line, col - 1);
                if kind != TokenKind::Define {
                    while idx < bytes.len() && bytes[idx] != b'\n' {
                        bump(&mut idx, &mut line, &mut col);
                    }
                }
                in_directive = true;
                tokens.push(Token { kind, span });
            }
            b'0'..=b'9' => {
                let start = idx;
                while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                    bump(&mut idx, &mut line, &mut col);
                }
                let text = &input[start..idx];
                let span = make_span(start_line, start_col, start_line, col - 1);
                let value = text.parse::<u64>().map_err(|_| FrontendError {
                    kind: FrontendErrorKind::InvalidInput,
                    message: format!("invalid integer literal: {text}"),
                    span: Some(span.clone()),
                })?;
                tokens.push(Token {
                    kind: TokenKind::Int(value),
                    span,
                });
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                let start = idx;
                while idx < bytes.len() && is_ident(bytes[idx]) {
                    bump(&mut idx, &mut line, &mut col);
                }
                let text = &input[start..idx];
                let kind = match text {
                    "mtype" => TokenKind::Mtype,
                    "typedef" => TokenKind::Typedef,
                    "chan" => TokenKind::Chan,
                    "of" => TokenKind::Of,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "skip" => TokenKind::Skip,
                    "eval" => TokenKind::Eval,
                    "proctype" | "active" | "init" | "never" | "inline" | "ltl" | "trace"
                    | "notrace" => TokenKind::Unsupported(text.to_string()),
                    _ => match (ChannelOp::from_keyword(text), VariableType::from_keyword(text)) {
                        (Some(op), _) => TokenKind::ChanOp(op),
                        (None, Some(ty)) => TokenKind::TypeName(ty),
                        (None, None) => TokenKind::Ident(text.to_string()),
                    },
                };
                tokens.push(Token {
                    kind,
                    span: make_span(start_line, start_col, start_line, col - 1),
                });
            }
            _ => match operator_at(&bytes[idx..]) {
                Some((kind, len)) => {
                    push_fixed(&mut tokens, kind, len, &mut idx, &mut line, &mut col);
                }
                None => {
                    let span = make_span(start_line, start_col, start_line, start_col);
                    return Err(FrontendError {
                        kind: FrontendErrorKind::InvalidInput,
                        message: format!("unexpected character: {}", b as char),
                        span: Some(span),
                    });
                }
            },
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: make_span(line, col, line, col),
    });

    Ok(tokens)
}

/// Punctuation or operator at the start of `rest`, longest match first.
fn operator_at(rest: &[u8]) -> Option<(TokenKind, usize)> {
    let pair = match rest.get(..2) {
        Some(b"->") => Some(TokenKind::Arrow),
        Some(b"<<") => Some(TokenKind::Shl),
        Some(b">>") => Some(TokenKind::Shr),
        Some(b"&&") => Some(TokenKind::AndAnd),
        Some(b"||") => Some(TokenKind::OrOr),
        Some(b"==") => Some(TokenKind::EqEq),
        Some(b"!=") => Some(TokenKind::NotEq),
        Some(b"<=") => Some(TokenKind::Le),
        Some(b">=") => Some(TokenKind::Ge),
        _ => None,
    };
    if let Some(kind) = pair {
        return Some((kind, 2));
    }

    let kind = match rest.first()? {
        b'{' => TokenKind::LBrace,
        b'}' => TokenKind::RBrace,
        b'[' => TokenKind::LBracket,
        b']' => TokenKind::RBracket,
        b'(' => TokenKind::LParen,
        b')' => TokenKind::RParen,
        b';' => TokenKind::Semi,
        b',' => TokenKind::Comma,
        b'.' => TokenKind::Dot,
        b'=' => TokenKind::Assign,
        b':' => TokenKind::Colon,
        b'?' => TokenKind::Question,
        b'+' => TokenKind::Plus,
        b'-' => TokenKind::Minus,
        b'*' => TokenKind::Star,
        b'/' => TokenKind::Slash,
        b'%' => TokenKind::Percent,
        b'&' => TokenKind::Amp,
        b'|' => TokenKind::Pipe,
        b'^' => TokenKind::Caret,
        b'~' => TokenKind::Tilde,
        b'!' => TokenKind::Bang,
        b'<' => TokenKind::Lt,
        b'>' => TokenKind::Gt,
        _ => return None,
    };
    Some((kind, 1))
}

/// Binary operator levels, loosest first.
const BINARY_LEVELS: usize = 10;

fn binary_op(level: usize, kind: &TokenKind) -> Option<BinaryOp> {
    let op = match (level, kind) {
        (0, TokenKind::OrOr) => BinaryOp::Or,
        (1, TokenKind::AndAnd) => BinaryOp::And,
        (2, TokenKind::Pipe) => BinaryOp::BitOr,
        (3, TokenKind::Caret) => BinaryOp::BitXor,
        (4, TokenKind::Amp) => BinaryOp::BitAnd,
        (5, TokenKind::EqEq) => BinaryOp::Eq,
        (5, TokenKind::NotEq) => BinaryOp::Ne,
        (6, TokenKind::Lt) => BinaryOp::Lt,
        (6, TokenKind::Le) => BinaryOp::Le,
        (6, TokenKind::Gt) => BinaryOp::Gt,
        (6, TokenKind::Ge) => BinaryOp::Ge,
        (7, TokenKind::Shl) => BinaryOp::Shl,
        (7, TokenKind::Shr) => BinaryOp::Shr,
        (8, TokenKind::Plus) => BinaryOp::Add,
        (8, TokenKind::Minus) => BinaryOp::Sub,
        (9, TokenKind::Star) => BinaryOp::Mul,
        (9, TokenKind::Slash) => BinaryOp::Div,
        (9, TokenKind::Percent) => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    path: String,
}

impl Parser {
    fn new(tokens: Vec<Token>, path: &str) -> Self {
        Self {
            tokens,
            pos: 0,
            path: path.to_string(),
        }
    }

    fn parse_module(&mut self) -> Result<ParsedModule, FrontendError> {
        let mut module = ParsedModule::default();

        loop {
            let Some(token) = self.peek().cloned() else {
                break;
            };
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Semi | TokenKind::Newline => {
                    self.pos += 1;
                }
                TokenKind::Mtype
                    if matches!(
                        self.peek_kind_n(1),
                        Some(TokenKind::Assign | TokenKind::LBrace)
                    ) =>
                {
                    self.pos += 1;
                    module.items.push(self.parse_mtype_decl()?);
                }
                TokenKind::Typedef => {
                    self.pos += 1;
                    module.items.push(self.parse_typedef()?);
                }
                TokenKind::Define => {
                    self.pos += 1;
                    module.items.push(self.parse_define()?);
                }
                TokenKind::Unsupported(word) => {
                    self.pos += 1;
                    module.unsupported.push(Unsupported {
                        message: format!("unsupported syntax: {word}"),
                        span: token.span,
                    });
                    if word.starts_with('#') {
                        self.skip_until_line_end();
                    } else {
                        self.skip_block();
                    }
                }
                TokenKind::Mtype | TokenKind::Chan | TokenKind::TypeName(_) => {
                    let ty = self.parse_type()?;
                    module.items.push(self.parse_variables(ty)?);
                }
                TokenKind::Ident(_) if matches!(self.peek_kind_n(1), Some(TokenKind::Ident(_))) => {
                    let ty = self.parse_type()?;
                    module.items.push(self.parse_variables(ty)?);
                }
                _ => {
                    return Err(self.invalid_input(Some(token.span), "expected a declaration"));
                }
            }
        }

        Ok(module)
    }

    fn parse_mtype_decl(&mut self) -> Result<Item, FrontendError> {
        self.consume_is(TokenKind::Assign);
        self.expect(TokenKind::LBrace, "expected '{' after mtype")?;
        let mut names = vec![self.expect_ident_spanned("expected mtype constant")?];
        while self.consume_is(TokenKind::Comma) {
            names.push(self.expect_ident_spanned("expected mtype constant")?);
        }
        self.expect(TokenKind::RBrace, "expected '}' to close mtype declaration")?;
        self.consume_is(TokenKind::Semi);
        Ok(Item::MTypes(names))
    }

    fn parse_typedef(&mut self) -> Result<Item, FrontendError> {
        let name = self.expect_ident_spanned("expected typedef name")?;
        self.expect(TokenKind::LBrace, "expected '{' after typedef name")?;
        let mut fields = Vec::new();
        while !self.peek_is(TokenKind::RBrace) {
            let ty = self.parse_type()?;
            loop {
                let field_name = self.expect_ident_spanned("expected field name")?;
                let size = self.parse_array_size()?;
                fields.push(RawField {
                    ty: ty.clone(),
                    name: field_name,
                    size,
                });
                if !self.consume_is(TokenKind::Comma) {
                    break;
                }
            }
            if !self.consume_is(TokenKind::Semi) && !self.peek_is(TokenKind::RBrace) {
                return Err(self.invalid_input(self.peek_span(), "expected ';' after field"));
            }
        }
        self.expect(TokenKind::RBrace, "expected '}' to close typedef")?;
        self.consume_is(TokenKind::Semi);
        Ok(Item::Typedef { name, fields })
    }

    /// `#define NAME expr` up to the end of the line.
    fn parse_define(&mut self) -> Result<Item, FrontendError> {
        let name = self.expect_ident_spanned("expected macro name after #define")?;
        if let Some(Token {
            kind: TokenKind::LParen,
            span,
        }) = self.peek()
        {
            if span.start_line == name.span.end_line && span.start_col == name.span.end_col + 1 {
                let span = span.clone();
                return Err(FrontendError::unsupported(
                    format!("unsupported syntax: parameterized #define {}", name.value),
                    &span,
                ));
            }
        }
        let body = self.parse_expr()?;
        self.expect_line_end()?;
        Ok(Item::Define { name, body })
    }

    fn parse_type(&mut self) -> Result<Spanned<RawType>, FrontendError> {
        let Some(token) = self.next() else {
            return Err(self.invalid_input(self.peek_span(), "expected type"));
        };
        let value = match token.kind {
            TokenKind::TypeName(ty) => RawType::Scalar(ty),
            TokenKind::Mtype => RawType::Scalar(VariableType::Mtype),
            TokenKind::Chan => RawType::Scalar(VariableType::Chan),
            TokenKind::Ident(name) => RawType::Named(name),
            _ => return Err(self.invalid_input(Some(token.span), "expected type")),
        };
        Ok(Spanned {
            value,
            span: token.span,
        })
    }

    fn parse_variables(&mut self, ty: Spanned<RawType>) -> Result<Item, FrontendError> {
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident_spanned("expected variable name")?;
            let size = self.parse_array_size()?;
            let init = if self.consume_is(TokenKind::Assign) {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            decls.push(VarDecl { name, size, init });
            if !self.consume_is(TokenKind::Comma) {
                break;
            }
        }
        self.consume_is(TokenKind::Semi);
        Ok(Item::Variables { ty, decls })
    }

    fn parse_initializer(&mut self) -> Result<RawInit, FrontendError> {
        let Some(open) = self.peek().cloned() else {
            return Err(self.invalid_input(None, "expected initializer"));
        };
        if open.kind != TokenKind::LBracket {
            return Ok(RawInit::Value(self.parse_expr()?));
        }

        self.pos += 1;
        let capacity = self.parse_size_body()?;
        self.expect(TokenKind::Of, "expected 'of' after channel capacity")?;
        self.expect(TokenKind::LBrace, "expected '{' for message fields")?;
        let mut fields = vec![self.parse_type()?];
        while self.consume_is(TokenKind::Comma) {
            fields.push(self.parse_type()?);
        }
        let close = self.expect(TokenKind::RBrace, "expected '}' to close message fields")?;
        Ok(RawInit::Channel {
            capacity,
            fields,
            span: open.span.to(&close.span),
        })
    }

    fn parse_array_size(&mut self) -> Result<Option<RawSize>, FrontendError> {
        if !self.consume_is(TokenKind::LBracket) {
            return Ok(None);
        }
        self.parse_size_body().map(Some)
    }

    /// Size after '[', through the closing ']'.
    fn parse_size_body(&mut self) -> Result<RawSize, FrontendError> {
        let size = match self.next() {
            Some(Token {
                kind: TokenKind::Int(value),
                span,
            }) => RawSize::Literal(Spanned { value, span }),
            Some(Token {
                kind: TokenKind::Ident(value),
                span,
            }) => RawSize::Named(Spanned { value, span }),
            Some(token) => return Err(self.invalid_input(Some(token.span), "expected size")),
            None => return Err(self.invalid_input(None, "expected size")),
        };
        self.expect(TokenKind::RBracket, "expected ']' after size")?;
        Ok(size)
    }

    fn parse_expr(&mut self) -> Result<Spanned<RawExpr>, FrontendError> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Spanned<RawExpr>, FrontendError> {
        if level == BINARY_LEVELS {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = self.peek_kind().and_then(|kind| binary_op(level, kind)) {
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            let span = left.span.to(&right.span);
            left = Spanned {
                value: RawExpr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Spanned<RawExpr>, FrontendError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Bang) => UnaryOp::Not,
            Some(TokenKind::Minus) => UnaryOp::Neg,
            Some(TokenKind::Tilde) => UnaryOp::BitNot,
            _ => return self.parse_primary(),
        };
        let start = self.peek_span();
        self.pos += 1;
        let operand = self.parse_unary()?;
        let span = match start {
            Some(start) => start.to(&operand.span),
            None => operand.span.clone(),
        };
        Ok(Spanned {
            value: RawExpr::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    fn parse_primary(&mut self) -> Result<Spanned<RawExpr>, FrontendError> {
        let Some(token) = self.next() else {
            return Err(self.invalid_input(None, "expected expression"));
        };
        let start = token.span.clone();
        let spanned = |value: RawExpr, span: SourceSpan| Spanned { value, span };

        match token.kind {
            TokenKind::Int(value) => Ok(spanned(RawExpr::Int(value), start)),
            TokenKind::True => Ok(spanned(RawExpr::Bool(true), start)),
            TokenKind::False => Ok(spanned(RawExpr::Bool(false), start)),
            TokenKind::Skip => Ok(spanned(RawExpr::Int(1), start)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                if self.consume_is(TokenKind::Arrow) {
                    let then_branch = self.parse_expr()?;
                    self.expect(TokenKind::Colon, "expected ':' in conditional expression")?;
                    let else_branch = self.parse_expr()?;
                    let close =
                        self.expect(TokenKind::RParen, "expected ')' to close conditional")?;
                    return Ok(spanned(
                        RawExpr::Ternary {
                            cond: Box::new(inner),
                            then_branch: Box::new(then_branch),
                            else_branch: Box::new(else_branch),
                        },
                        start.to(&close.span),
                    ));
                }
                let close = self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(spanned(inner.value, start.to(&close.span)))
            }
            TokenKind::ChanOp(op) => {
                self.expect(TokenKind::LParen, "expected '(' after channel operator")?;
                let channel = self.parse_expr()?;
                let close = self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(spanned(
                    RawExpr::ChannelQuery {
                        op,
                        channel: Box::new(channel),
                    },
                    start.to(&close.span),
                ))
            }
            TokenKind::Eval => {
                self.expect(TokenKind::LParen, "expected '(' after eval")?;
                let inner = self.parse_expr()?;
                let close = self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(spanned(RawExpr::Eval(Box::new(inner)), start.to(&close.span)))
            }
            TokenKind::Ident(value) => {
                let name = Spanned { value, span: start };
                let (reference, end) = self.parse_ref_rest(name)?;
                let span = reference.name.span.to(&end);
                let reference = spanned(RawExpr::Ref(reference), span);
                if !(self.peek_is(TokenKind::Question)
                    && self.peek_kind_n(1) == Some(&TokenKind::LBracket))
                {
                    return Ok(reference);
                }

                self.pos += 2;
                let mut args = vec![self.parse_expr()?];
                while self.consume_is(TokenKind::Comma) {
                    args.push(self.parse_expr()?);
                }
                let close = self.expect(TokenKind::RBracket, "expected ']' to close poll")?;
                let span = reference.span.to(&close.span);
                Ok(spanned(
                    RawExpr::Poll {
                        channel: Box::new(reference),
                        args,
                    },
                    span,
                ))
            }
            _ => Err(self.invalid_input(Some(token.span), "expected expression")),
        }
    }

    /// Optional `[index]` and `.field` chain after a name. Returns the span
    /// of the last consumed token.
    fn parse_ref_rest(
        &mut self,
        name: Spanned<String>,
    ) -> Result<(RawRef, SourceSpan), FrontendError> {
        let mut end = name.span.clone();
        let index = if self.consume_is(TokenKind::LBracket) {
            let index = self.parse_expr()?;
            end = self
                .expect(TokenKind::RBracket, "expected ']' after index")?
                .span;
            Some(Box::new(index))
        } else {
            None
        };
        let field = if self.consume_is(TokenKind::Dot) {
            let field_name = self.expect_ident_spanned("expected field name")?;
            let (field, field_end) = self.parse_ref_rest(field_name)?;
            end = field_end;
            Some(Box::new(field))
        } else {
            None
        };
        Ok((RawRef { name, index, field }, end))
    }

    fn skip_until_line_end(&mut self) {
        while !self.peek_is(TokenKind::Newline) && !self.peek_is(TokenKind::Eof) {
            self.pos += 1;
        }
    }

    /// Skips to the first '{' and past its matching '}'.
    fn skip_block(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn expect_line_end(&mut self) -> Result<(), FrontendError> {
        if self.consume_is(TokenKind::Newline) || self.peek_is(TokenKind::Eof) {
            return Ok(());
        }
        Err(self.invalid_input(self.peek_span(), "expected end of line"))
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, FrontendError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                let token = token.clone();
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.invalid_input(self.peek_span(), message)),
        }
    }

    fn expect_ident_spanned(&mut self, message: &str) -> Result<Spanned<String>, FrontendError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Ident(value),
                span,
            }) => Ok(Spanned { value, span }),
            Some(token) => Err(self.invalid_input(Some(token.span), message)),
            None => Err(self.invalid_input(self.peek_span(), message)),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_kind_n(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Option<SourceSpan> {
        self.peek().map(|t| t.span.clone())
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(&kind)
    }

    fn consume_is(&mut self, kind: TokenKind) -> bool {
        if self.peek_is(kind) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some(token)
    }

    fn invalid_input(&self, span: Option<SourceSpan>, message: impl Into<String>) -> FrontendError {
        let span = span.or_else(|| {
            self.tokens.last().map(|t| SourceSpan {
                path: self.path.clone(),
                ..t.span.clone()
            })
        });
        FrontendError {
            kind: FrontendErrorKind::InvalidInput,
            message: message.into(),
            span,
        }
    }
}
