use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, LevelFilter};
use pmlx_core::{
    analyze, analyze_parallel, AnalysisReport, CheckResult, Diagnostic, Frontend,
    FrontendErrorKind, Model, Reason, ReasonKind, SimpleFrontend, Status,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pmlx")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, value_enum, default_value = "json", global = true)]
    format: OutputFormat,

    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Log resolution and analysis progress to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// First code assigned to mtype constants.
    #[arg(long, default_value_t = 0, global = true)]
    mtype_base: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and resolve a model.
    Typecheck { file: PathBuf },
    /// Typecheck, then report type, generated code and reads of every
    /// `#define` and initializer.
    Analyze {
        file: PathBuf,

        #[arg(long)]
        parallel: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Serialize)]
struct ResultJson {
    schema_version: String,
    tool: ToolInfo,
    invocation: Invocation,
    inputs: Vec<InputInfo>,
    status: Status,
    exit_code: i32,
    started_at: String,
    finished_at: String,
    duration_ms: u64,
    checks: Vec<CheckResult>,
    diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisReport>,
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    version: String,
    git_sha: String,
}

#[derive(Serialize)]
struct Invocation {
    command: String,
    args: Vec<String>,
    format: String,
    mtype_base: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel: Option<usize>,
}

#[derive(Serialize)]
struct InputInfo {
    path: String,
    sha256: String,
}

/// Everything one command produced, before timing and tool metadata are
/// attached.
struct Outcome {
    check: CheckResult,
    diagnostics: Vec<Diagnostic>,
    analysis: Option<AnalysisReport>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tool error: {err:#}");
            2
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    if cli.verbose {
        TermLogger::init(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Never,
        )
        .context("initialize logger")?;
    }
    if let Command::Analyze {
        parallel: Some(0), ..
    } = &cli.command
    {
        bail!("--parallel must be >= 1");
    }

    let started_at = Utc::now();
    let timer = Instant::now();

    let (command, file, parallel) = match &cli.command {
        Command::Typecheck { file } => ("typecheck", file, None),
        Command::Analyze { file, parallel } => ("analyze", file, *parallel),
    };
    let (inputs, io_error) = build_inputs(&[file.clone()]);
    let outcome = match io_error {
        Some(message) => Outcome {
            check: error_check(command, ReasonKind::InvalidInput, message),
            diagnostics: Vec::new(),
            analysis: None,
        },
        None => execute(command, file, parallel, cli.mtype_base),
    };

    let status = outcome.check.status.clone();
    let exit_code = match status {
        Status::Pass => 0,
        Status::Error => 2,
        Status::Unsupported => 3,
    };
    info!("{command} {}: {}", file.display(), status_label(&status));

    let finished_at = Utc::now();
    let duration_ms = timer.elapsed().as_millis() as u64;

    let result = ResultJson {
        schema_version: "0.1".to_string(),
        tool: ToolInfo {
            name: "pmlx".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: std::env::var("PMLX_GIT_SHA").unwrap_or_else(|_| "UNKNOWN".to_string()),
        },
        invocation: Invocation {
            command: command.to_string(),
            args: vec![file.to_string_lossy().to_string()],
            format: match cli.format {
                OutputFormat::Json => "json".to_string(),
                OutputFormat::Text => "text".to_string(),
            },
            mtype_base: cli.mtype_base,
            parallel,
        },
        inputs,
        status,
        exit_code,
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        finished_at: finished_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        duration_ms,
        checks: vec![outcome.check],
        diagnostics: outcome.diagnostics,
        analysis: outcome.analysis,
    };

    match cli.format {
        OutputFormat::Json => emit_json(&result, cli.output.as_deref()),
        OutputFormat::Text => emit_text(&result, cli.output.as_deref()),
    }?;

    Ok(exit_code)
}

fn execute(command: &str, file: &Path, parallel: Option<usize>, mtype_base: u32) -> Outcome {
    let frontend = SimpleFrontend::with_mtype_base(mtype_base);
    let output = match frontend.resolve_file(file) {
        Ok(output) => output,
        Err(err) => {
            let (status, reason_kind) = match err.kind {
                FrontendErrorKind::UnsupportedSyntax => {
                    (Status::Unsupported, ReasonKind::UnsupportedSyntax)
                }
                FrontendErrorKind::InvalidInput | FrontendErrorKind::Semantic(_) => {
                    (Status::Error, ReasonKind::InvalidInput)
                }
            };
            debug!("frontend rejected {}: {err}", file.display());
            return Outcome {
                check: CheckResult {
                    name: command.to_string(),
                    status,
                    reason: Some(Reason {
                        kind: reason_kind,
                        message: Some(err.to_string()),
                    }),
                    stats: None,
                },
                diagnostics: Vec::new(),
                analysis: None,
            };
        }
    };

    let analysis = match command {
        "analyze" => match run_analysis(&output.ir, parallel) {
            Ok(report) => Some(report),
            Err(err) => {
                return Outcome {
                    check: error_check(command, ReasonKind::InternalError, format!("{err:#}")),
                    diagnostics: output.diagnostics,
                    analysis: None,
                }
            }
        },
        _ => None,
    };
    Outcome {
        check: CheckResult {
            name: command.to_string(),
            status: Status::Pass,
            reason: None,
            stats: Some(output.ir.stats()),
        },
        diagnostics: output.diagnostics,
        analysis,
    }
}

fn run_analysis(model: &Model, parallel: Option<usize>) -> Result<AnalysisReport> {
    match parallel {
        Some(workers) => analyze_parallel(model, workers).context("parallel analysis"),
        None => Ok(analyze(model)),
    }
}

fn build_inputs(paths: &[PathBuf]) -> (Vec<InputInfo>, Option<String>) {
    let mut inputs = Vec::new();
    let mut error: Option<String> = None;

    for path in paths {
        match compute_sha256(path) {
            Ok(sha256) => inputs.push(InputInfo {
                path: path.to_string_lossy().to_string(),
                sha256,
            }),
            Err(err) => {
                if error.is_none() {
                    error = Some(err);
                }
                inputs.push(InputInfo {
                    path: path.to_string_lossy().to_string(),
                    sha256: "UNKNOWN".to_string(),
                });
            }
        }
    }

    (inputs, error)
}

fn compute_sha256(path: &Path) -> Result<String, String> {
    let data = fs::read(path).map_err(|err| format!("{}: {err}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn error_check(name: &str, kind: ReasonKind, message: String) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status: Status::Error,
        reason: Some(Reason {
            kind,
            message: Some(message),
        }),
        stats: None,
    }
}

fn emit_json(result: &ResultJson, output: Option<&Path>) -> Result<()> {
    let payload = serde_json::to_string_pretty(result).context("serialize result json")?;
    if let Some(path) = output {
        write_atomic(path, payload.as_bytes())?;
        return Ok(());
    }

    println!("{payload}");
    Ok(())
}

fn emit_text(result: &ResultJson, output: Option<&Path>) -> Result<()> {
    let mut lines = vec![format!(
        "status={} exit_code={}",
        status_label(&result.status),
        result.exit_code
    )];
    for check in &result.checks {
        if let Some(message) = check.reason.as_ref().and_then(|r| r.message.as_ref()) {
            lines.push(format!("error: {message}"));
        }
    }
    for diagnostic in &result.diagnostics {
        lines.push(format!("warning: {}", diagnostic.message));
    }
    if let Some(analysis) = &result.analysis {
        for entry in &analysis.entries {
            lines.push(format!(
                "{} : {} = {} reads [{}]",
                entry.name,
                entry.result_type,
                entry.int_code,
                entry.reads.join(", ")
            ));
        }
    }
    let summary = lines.join("\n");
    if let Some(path) = output {
        write_atomic(path, summary.as_bytes())?;
        return Ok(());
    }
    println!("{summary}");
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("rename {}", path.display()))?;
    Ok(())
}

fn status_label(status: &Status) -> &'static str {
    match status {
        Status::Pass => "pass",
        Status::Unsupported => "unsupported",
        Status::Error => "error",
    }
}
