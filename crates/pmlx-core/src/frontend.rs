use crate::ir::CoreIr;
use crate::types::Diagnostic;
use std::fs;
use std::io;
use std::path::Path;

pub struct FrontendOutput<IR> {
    pub ir: IR,
    /// Warnings; errors are returned as `Err`.
    pub diagnostics: Vec<Diagnostic>,
}

/// Turns source text into resolved IR: every name is looked up here, so the
/// IR never holds an unresolved reference.
pub trait Frontend {
    type Ir: CoreIr;
    type Error: std::error::Error;

    fn parse_and_resolve(
        &self,
        input: &str,
        path: &str,
    ) -> Result<FrontendOutput<Self::Ir>, Self::Error>;

    /// Reads `path` and resolves its contents. Spans carry `path` as given.
    fn resolve_file(&self, path: &Path) -> Result<FrontendOutput<Self::Ir>, Self::Error>
    where
        Self::Error: From<io::Error>,
    {
        let input = fs::read_to_string(path)?;
        self.parse_and_resolve(&input, &path.to_string_lossy())
    }
}
