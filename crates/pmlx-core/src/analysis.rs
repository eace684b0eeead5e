use crate::deps::AccessSet;
use crate::expr::Expression;
use crate::ir::Model;
use crate::types::{ModelStats, SourceSpan};
use crate::variable::VariableType;
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Define,
    Initializer,
}

/// Everything the code generator needs to know about one expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryReport {
    pub kind: EntryKind,
    pub name: String,
    pub span: SourceSpan,
    pub result_type: VariableType,
    pub int_code: String,
    pub bool_code: String,
    /// Read locations, e.g. `x`, `a[2]`, `box[*].val`.
    pub reads: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisReport {
    pub entries: Vec<EntryReport>,
    pub stats: ModelStats,
    /// Distinct locations read by any entry.
    pub read_locations: u64,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to start analysis workers: {0}")]
    Pool(#[from] ThreadPoolBuildError),
}

struct Job<'a> {
    kind: EntryKind,
    name: &'a str,
    expr: &'a Expression,
}

pub fn analyze(model: &Model) -> AnalysisReport {
    let entries = jobs(model).iter().map(report_entry).collect();
    finish(model, entries)
}

/// Same result as [`analyze`], computed on `workers` threads.
pub fn analyze_parallel(model: &Model, workers: usize) -> Result<AnalysisReport, AnalysisError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;
    let jobs = jobs(model);
    let entries = pool.install(|| jobs.par_iter().map(report_entry).collect::<Vec<_>>());
    Ok(finish(model, entries))
}

fn jobs(model: &Model) -> Vec<Job<'_>> {
    let defines = model.definitions.iter().map(|definition| Job {
        kind: EntryKind::Define,
        name: &definition.name.value,
        expr: &definition.expr,
    });
    let initializers = model.initializers.iter().map(|initializer| Job {
        kind: EntryKind::Initializer,
        name: initializer.variable.name(),
        expr: &initializer.value,
    });
    defines.chain(initializers).collect()
}

fn report_entry(job: &Job<'_>) -> EntryReport {
    EntryReport {
        kind: job.kind,
        name: job.name.to_string(),
        span: job.expr.span().clone(),
        result_type: job.expr.result_type(),
        int_code: job.expr.int_code(),
        bool_code: job.expr.bool_code(),
        reads: job
            .expr
            .read_variables()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

fn finish(model: &Model, entries: Vec<EntryReport>) -> AnalysisReport {
    let mut locations = AccessSet::new();
    for entry in jobs(model) {
        locations.extend(entry.expr.read_variables());
    }
    debug!(
        "analyzed {} entr(ies), {} distinct read location(s)",
        entries.len(),
        locations.len()
    );
    AnalysisReport {
        entries,
        stats: model.stats(),
        read_locations: locations.len() as u64,
    }
}
