use crate::error::{ExprError, ExprErrorKind};
use crate::types::SourceSpan;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Static type tag of a storage location or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Bit,
    Bool,
    Byte,
    Pid,
    Short,
    Int,
    Mtype,
    Chan,
}

impl VariableType {
    pub const ALL: [VariableType; 8] = [
        VariableType::Bit,
        VariableType::Bool,
        VariableType::Byte,
        VariableType::Pid,
        VariableType::Short,
        VariableType::Int,
        VariableType::Mtype,
        VariableType::Chan,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            VariableType::Bit => "bit",
            VariableType::Bool => "bool",
            VariableType::Byte => "byte",
            VariableType::Pid => "pid",
            VariableType::Short => "short",
            VariableType::Int => "int",
            VariableType::Mtype => "mtype",
            VariableType::Chan => "chan",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.keyword() == word)
    }

    pub fn bits(self) -> u32 {
        match self {
            VariableType::Bit | VariableType::Bool => 1,
            VariableType::Byte | VariableType::Pid | VariableType::Mtype | VariableType::Chan => 8,
            VariableType::Short => 16,
            VariableType::Int => 32,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, VariableType::Short | VariableType::Int)
    }

    /// Everything except channel handles can take part in arithmetic and conditions.
    pub fn is_numeric(self) -> bool {
        self != VariableType::Chan
    }

    pub fn min_value(self) -> i64 {
        match self {
            VariableType::Short => i64::from(i16::MIN),
            VariableType::Int => i64::from(i32::MIN),
            _ => 0,
        }
    }

    pub fn max_value(self) -> i64 {
        match self {
            VariableType::Bit | VariableType::Bool => 1,
            VariableType::Byte | VariableType::Pid | VariableType::Mtype | VariableType::Chan => {
                i64::from(u8::MAX)
            }
            VariableType::Short => i64::from(i16::MAX),
            VariableType::Int => i64::from(i32::MAX),
        }
    }

    pub fn contains(self, value: i64) -> bool {
        (self.min_value()..=self.max_value()).contains(&value)
    }

    /// The integer type a value of this type is promoted to inside arithmetic.
    pub fn arithmetic(self) -> VariableType {
        match self {
            VariableType::Bit | VariableType::Bool | VariableType::Pid | VariableType::Mtype => {
                VariableType::Byte
            }
            other => other,
        }
    }

    /// The wider of two arithmetic operand types.
    pub fn wider(self, other: VariableType) -> VariableType {
        let (left, right) = (self.arithmetic(), other.arithmetic());
        if right.bits() > left.bits() {
            right
        } else {
            left
        }
    }

    /// Whether a value of type `from` may be stored in a location of this type.
    pub fn accepts(self, from: VariableType) -> bool {
        match (self, from) {
            (VariableType::Chan, VariableType::Chan) => true,
            (VariableType::Chan, _) | (_, VariableType::Chan) => false,
            _ => true,
        }
    }
}

impl Display for VariableType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Capacity and message layout of a `chan` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSignature {
    pub capacity: u32,
    pub fields: Vec<VariableType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Scalar(VariableType),
    Struct(Arc<StructType>),
}

/// A `typedef` layout. Fields are variables in their own right so accesses to
/// them have identities of their own.
#[derive(Debug)]
pub struct StructType {
    name: String,
    fields: Vec<Arc<Variable>>,
}

impl StructType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Arc<Variable>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Arc<Variable>> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_field(&self, id: VarId) -> bool {
        self.fields.iter().any(|field| field.id == id)
    }
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StructType {}

/// A declared storage location.
#[derive(Debug)]
pub struct Variable {
    id: VarId,
    name: String,
    layout: Layout,
    array_len: Option<u32>,
    channel: Option<ChannelSignature>,
}

impl Variable {
    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn scalar_type(&self) -> Option<VariableType> {
        match &self.layout {
            Layout::Scalar(ty) => Some(*ty),
            Layout::Struct(_) => None,
        }
    }

    pub fn struct_type(&self) -> Option<&Arc<StructType>> {
        match &self.layout {
            Layout::Scalar(_) => None,
            Layout::Struct(ty) => Some(ty),
        }
    }

    pub fn array_len(&self) -> Option<u32> {
        self.array_len
    }

    pub fn is_array(&self) -> bool {
        self.array_len.is_some()
    }

    pub fn channel(&self) -> Option<&ChannelSignature> {
        self.channel.as_ref()
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// One field of a `typedef`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: VariableType,
    pub array_len: Option<u32>,
}

/// All variables of a compilation unit. Built while declarations are resolved,
/// shared read-only afterwards.
#[derive(Debug, Default)]
pub struct VariableTable {
    variables: Vec<Arc<Variable>>,
    globals: IndexMap<String, VarId>,
    structs: IndexMap<String, Arc<StructType>>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_scalar(
        &mut self,
        name: &str,
        ty: VariableType,
        array_len: Option<u32>,
        span: &SourceSpan,
    ) -> Result<Arc<Variable>, ExprError> {
        self.insert_global(name, Layout::Scalar(ty), array_len, None, span)
    }

    pub fn declare_channel(
        &mut self,
        name: &str,
        signature: Option<ChannelSignature>,
        array_len: Option<u32>,
        span: &SourceSpan,
    ) -> Result<Arc<Variable>, ExprError> {
        if let Some(signature) = &signature {
            if signature.fields.is_empty() {
                return Err(ExprError::new(
                    ExprErrorKind::ArityMismatch,
                    format!("channel {name} declares no message fields"),
                    span,
                ));
            }
        }
        self.insert_global(
            name,
            Layout::Scalar(VariableType::Chan),
            array_len,
            signature,
            span,
        )
    }

    pub fn declare_struct_var(
        &mut self,
        name: &str,
        struct_name: &str,
        array_len: Option<u32>,
        span: &SourceSpan,
    ) -> Result<Arc<Variable>, ExprError> {
        let Some(layout) = self.structs.get(struct_name).cloned() else {
            return Err(ExprError::new(
                ExprErrorKind::UnresolvedReference,
                format!("undefined type: {struct_name}"),
                span,
            ));
        };
        self.insert_global(name, Layout::Struct(layout), array_len, None, span)
    }

    pub fn define_struct(
        &mut self,
        name: &str,
        fields: Vec<FieldDecl>,
        span: &SourceSpan,
    ) -> Result<Arc<StructType>, ExprError> {
        if self.structs.contains_key(name) {
            return Err(ExprError::new(
                ExprErrorKind::DuplicateDeclaration,
                format!("duplicate type: {name}"),
                span,
            ));
        }
        if fields.is_empty() {
            return Err(ExprError::new(
                ExprErrorKind::ArityMismatch,
                format!("typedef {name} has no fields"),
                span,
            ));
        }

        let mut members: Vec<Arc<Variable>> = Vec::with_capacity(fields.len());
        for field in fields {
            if members.iter().any(|member| member.name == field.name) {
                return Err(ExprError::new(
                    ExprErrorKind::DuplicateDeclaration,
                    format!("duplicate field: {name}.{}", field.name),
                    span,
                ));
            }
            check_array_len(&field.name, field.array_len, span)?;
            let variable = Arc::new(Variable {
                id: self.next_id(span)?,
                name: field.name,
                layout: Layout::Scalar(field.ty),
                array_len: field.array_len,
                channel: None,
            });
            self.variables.push(Arc::clone(&variable));
            members.push(variable);
        }

        let layout = Arc::new(StructType {
            name: name.to_string(),
            fields: members,
        });
        debug!(
            "defined typedef {name} with {} field(s)",
            layout.fields.len()
        );
        self.structs.insert(name.to_string(), Arc::clone(&layout));
        Ok(layout)
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<Variable>> {
        self.globals.get(name).and_then(|id| self.get(*id))
    }

    /// Looks `name` up, failing with [`ExprErrorKind::UnresolvedReference`].
    pub fn resolve(&self, name: &str, span: &SourceSpan) -> Result<Arc<Variable>, ExprError> {
        self.lookup(name).cloned().ok_or_else(|| {
            ExprError::new(
                ExprErrorKind::UnresolvedReference,
                format!("undefined variable: {name}"),
                span,
            )
        })
    }

    pub fn get(&self, id: VarId) -> Option<&Arc<Variable>> {
        self.variables.get(id.index())
    }

    pub fn struct_type(&self, name: &str) -> Option<&Arc<StructType>> {
        self.structs.get(name)
    }

    /// Top-level variables in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = &Arc<Variable>> + '_ {
        self.globals.values().filter_map(|id| self.get(*id))
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    fn next_id(&self, span: &SourceSpan) -> Result<VarId, ExprError> {
        u32::try_from(self.variables.len())
            .map(VarId)
            .map_err(|_| ExprError::new(ExprErrorKind::Capacity, "too many variables", span))
    }

    fn insert_global(
        &mut self,
        name: &str,
        layout: Layout,
        array_len: Option<u32>,
        channel: Option<ChannelSignature>,
        span: &SourceSpan,
    ) -> Result<Arc<Variable>, ExprError> {
        if self.globals.contains_key(name) {
            return Err(ExprError::new(
                ExprErrorKind::DuplicateDeclaration,
                format!("duplicate variable: {name}"),
                span,
            ));
        }
        check_array_len(name, array_len, span)?;

        let variable = Arc::new(Variable {
            id: self.next_id(span)?,
            name: name.to_string(),
            layout,
            array_len,
            channel,
        });
        debug!("declared variable {name} as {:?}", variable.id);
        self.variables.push(Arc::clone(&variable));
        self.globals.insert(name.to_string(), variable.id);
        Ok(variable)
    }
}

fn check_array_len(name: &str, array_len: Option<u32>, span: &SourceSpan) -> Result<(), ExprError> {
    if array_len == Some(0) {
        return Err(ExprError::new(
            ExprErrorKind::InvalidIndex,
            format!("array {name} must have at least one element"),
            span,
        ));
    }
    Ok(())
}

/// Which element of a variable an access touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessIndex {
    /// Not an array.
    Scalar,
    /// Array element known at compile time.
    Element(u32),
    /// Array element chosen at run time; stands for every element.
    AnyElement,
}

/// One read or write of a storage location.
///
/// Equality, ordering and hashing only look at the variable identity, the
/// index descriptor and the field sub-access, so two reads of `a[i]` and
/// `a[j]` collapse into the single entry `a[*]`.
#[derive(Debug, Clone)]
pub struct VariableAccess {
    var: Arc<Variable>,
    index: AccessIndex,
    field: Option<Box<VariableAccess>>,
}

impl VariableAccess {
    pub fn new(var: Arc<Variable>, index: AccessIndex) -> Self {
        Self {
            var,
            index,
            field: None,
        }
    }

    pub fn with_field(mut self, field: VariableAccess) -> Self {
        self.field = Some(Box::new(field));
        self
    }

    pub fn variable(&self) -> &Arc<Variable> {
        &self.var
    }

    pub fn index(&self) -> AccessIndex {
        self.index
    }

    pub fn field(&self) -> Option<&VariableAccess> {
        self.field.as_deref()
    }

    /// Whether both accesses may touch the same memory.
    pub fn overlaps(&self, other: &VariableAccess) -> bool {
        if self.var.id != other.var.id {
            return false;
        }
        let same_slot = match (self.index, other.index) {
            (AccessIndex::Element(left), AccessIndex::Element(right)) => left == right,
            _ => true,
        };
        same_slot
            && match (&self.field, &other.field) {
                (Some(left), Some(right)) => left.overlaps(right),
                _ => true,
            }
    }

    fn key(&self) -> (VarId, AccessIndex) {
        (self.var.id, self.index)
    }
}

impl PartialEq for VariableAccess {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key() && self.field == other.field
    }
}

impl Eq for VariableAccess {}

impl PartialOrd for VariableAccess {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariableAccess {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .cmp(&other.key())
            .then_with(|| self.field.cmp(&other.field))
    }
}

impl Hash for VariableAccess {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.field.hash(state);
    }
}

impl Display for VariableAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.var.name)?;
        match self.index {
            AccessIndex::Scalar => {}
            AccessIndex::Element(n) => write!(f, "[{n}]")?,
            AccessIndex::AnyElement => f.write_str("[*]")?,
        }
        if let Some(field) = &self.field {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}
