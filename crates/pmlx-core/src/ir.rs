use crate::expr::Expression;
use crate::mtype::MTypeRegistry;
use crate::types::{ModelStats, SourceSpan};
use crate::variable::{Variable, VariableTable};
use std::fmt::Debug;
use std::sync::Arc;

/// Frontend output that passes may share across threads.
pub trait CoreIr: Debug + Send + Sync {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: SourceSpan,
}

/// `#define name expr`
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: Spanned<String>,
    pub expr: Expression,
}

/// Declared initial value of a variable, e.g. `byte x = RED`.
#[derive(Debug, Clone)]
pub struct Initializer {
    pub variable: Arc<Variable>,
    pub value: Expression,
}

/// A resolved compilation unit. The mtype registry and the variable table
/// are frozen; every expression refers into them.
#[derive(Debug, Clone)]
pub struct Model {
    pub mtypes: Arc<MTypeRegistry>,
    pub variables: Arc<VariableTable>,
    pub initializers: Vec<Initializer>,
    pub definitions: Vec<Definition>,
}

impl Model {
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|def| def.name.value == name)
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            mtypes: self.mtypes.len() as u64,
            variables: self.variables.len() as u64,
            definitions: self.definitions.len() as u64,
        }
    }
}

impl CoreIr for Model {}
