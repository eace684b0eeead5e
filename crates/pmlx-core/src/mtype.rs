//! Enumerated constants (`mtype`).
//!
//! Names are collected by [`MTypeRegistryBuilder`] while a model is parsed and
//! frozen into an [`MTypeRegistry`] before any expression is built. Codes are
//! dense and start at the registry base, in declaration order.

use crate::error::{ExprError, ExprErrorKind};
use crate::types::SourceSpan;
use crate::variable::VariableType;
use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Constants are stored in 8 bits.
pub const MAX_MTYPES: usize = 255;

/// Integer code of one enumerated constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MTypeCode(u32);

impl MTypeCode {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Display for MTypeCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct MTypeRegistryBuilder {
    base: u32,
    names: IndexSet<String>,
}

impl MTypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: u32) -> Self {
        Self {
            base,
            names: IndexSet::new(),
        }
    }

    pub fn declare(&mut self, name: &str, span: &SourceSpan) -> Result<MTypeCode, ExprError> {
        if self.names.contains(name) {
            return Err(ExprError::new(
                ExprErrorKind::DuplicateDeclaration,
                format!("duplicate mtype constant: {name}"),
                span,
            ));
        }
        if self.names.len() >= MAX_MTYPES {
            return Err(ExprError::new(
                ExprErrorKind::Capacity,
                format!("too many mtype constants (at most {MAX_MTYPES})"),
                span,
            ));
        }
        let max = VariableType::Mtype.max_value();
        let next = self.base.checked_add(self.names.len() as u32);
        if next.map_or(true, |code| i64::from(code) > max) {
            return Err(ExprError::new(
                ExprErrorKind::Capacity,
                format!("mtype constant {name} would get a code above {max}"),
                span,
            ));
        }
        let (index, _) = self.names.insert_full(name.to_string());
        Ok(code_at(self.base, index))
    }

    pub fn freeze(self) -> MTypeRegistry {
        debug!(
            "froze mtype registry: {} constant(s) from base {}",
            self.names.len(),
            self.base
        );
        MTypeRegistry {
            base: self.base,
            names: self.names,
        }
    }
}

/// Read-only name/code table shared by every consumer of a compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MTypeRegistry {
    base: u32,
    names: IndexSet<String>,
}

impl MTypeRegistry {
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn code(&self, name: &str) -> Option<MTypeCode> {
        self.names
            .get_index_of(name)
            .map(|index| code_at(self.base, index))
    }

    pub fn name(&self, code: MTypeCode) -> Option<&str> {
        let index = code.value().checked_sub(self.base)?;
        self.names.get_index(index as usize).map(String::as_str)
    }

    pub fn contains(&self, code: MTypeCode) -> bool {
        self.name(code).is_some()
    }

    /// Looks `name` up, failing with [`ExprErrorKind::UnresolvedReference`].
    pub fn resolve(&self, name: &str, span: &SourceSpan) -> Result<MTypeCode, ExprError> {
        self.code(name).ok_or_else(|| {
            ExprError::new(
                ExprErrorKind::UnresolvedReference,
                format!("undefined mtype constant: {name}"),
                span,
            )
        })
    }

    /// Constants in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, MTypeCode)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), code_at(self.base, index)))
    }
}

fn code_at(base: u32, index: usize) -> MTypeCode {
    // index < MAX_MTYPES
    MTypeCode(base + index as u32)
}
