// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! xll-inspect
//!
//! Roots a message buffer as the given kind, validates it, deep-copies it and prints
//! a JSON report on stdout. Logs go to stderr and follow `RUST_LOG`.
//! Exits with status 1 when validation fails.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xll_protocol::model::{Cell, Value};
use xll_protocol::{
    Any, BatchRtdUpdate, CopyContext, DeepCopy, Follow, Grid, Limits, NumGrid, Range, RefCache,
    RtdConnectRequest, RtdUpdate, Scalar, Validate, ValidationError,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Validate and deep-copy an xll message buffer")]
struct Args {
    /// Buffer to inspect
    file: PathBuf,
    /// Message kind at the root of the buffer
    #[arg(long, value_enum)]
    root: RootKind,
    /// JSON file with vector, range and output ceilings
    #[arg(long)]
    limits: Option<PathBuf>,
    /// Write the deep-copied buffer here
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RootKind {
    Scalar,
    Any,
    Grid,
    NumGrid,
    Range,
    RefCache,
    RtdConnect,
    RtdUpdate,
    Batch,
}

impl RootKind {
    const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Any => "any",
            Self::Grid => "grid",
            Self::NumGrid => "num-grid",
            Self::Range => "range",
            Self::RefCache => "ref-cache",
            Self::RtdConnect => "rtd-connect",
            Self::RtdUpdate => "rtd-update",
            Self::Batch => "batch",
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    kind: &'static str,
    input_bytes: usize,
    /// `None` when the root itself was dropped by the copy.
    output_bytes: Option<usize>,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    collapsed: usize,
    /// Ceilings in force after clamping.
    limits: Limits,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

/// Outcome of inspecting one root.
struct Inspection {
    validation: Result<(), ValidationError>,
    copy: Option<Vec<u8>>,
    collapsed: usize,
    limits: Limits,
    value: Option<Value>,
}

impl Inspection {
    fn new<V: DeepCopy>(view: &V, limits: Limits, validation: Result<(), ValidationError>) -> Self {
        let mut cx = CopyContext::for_source(limits, view.source());
        let root = view.deep_copy(&mut cx);
        let collapsed = cx.collapsed();
        let limits = *cx.limits();
        Self {
            validation,
            copy: root.map(|root| cx.finish(root)),
            collapsed,
            limits,
            value: None,
        }
    }

    fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

fn inspect(kind: RootKind, bytes: &[u8], limits: Limits) -> Result<Inspection> {
    let context = || format!("buffer is not a {} message", kind.name());
    let inspection = match kind {
        RootKind::Scalar => {
            let view = Scalar::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, Ok(())).with_value(Cell::from_scalar(view).into())
        }
        RootKind::Any => {
            let view = Any::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, view.validate_with(&limits))
                .with_value(Value::from_any_with(view, &limits))
        }
        RootKind::Grid => {
            let view = Grid::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, view.validate_with(&limits))
        }
        RootKind::NumGrid => {
            let view = NumGrid::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, view.validate_with(&limits))
        }
        RootKind::Range => {
            let view = Range::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, view.validate_with(&limits))
        }
        RootKind::RefCache => {
            let view = RefCache::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, Ok(()))
        }
        RootKind::RtdConnect => {
            let view = RtdConnectRequest::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, Ok(()))
        }
        RootKind::RtdUpdate => {
            let view = RtdUpdate::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, Ok(()))
        }
        RootKind::Batch => {
            let view = BatchRtdUpdate::root(bytes).with_context(context)?;
            Inspection::new(&view, limits, Ok(()))
        }
    };
    Ok(inspection)
}

fn load_limits(path: Option<&Path>) -> Result<Limits> {
    let Some(path) = path else {
        return Ok(Limits::default());
    };
    let raw = fs::read(path).with_context(|| format!("reading limits {}", path.display()))?;
    Limits::from_json(&raw).with_context(|| format!("parsing limits {}", path.display()))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(io::stderr)
        .init();

    let limits = load_limits(args.limits.as_deref())?;
    let bytes =
        fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    info!(file = %args.file.display(), kind = args.root.name(), len = bytes.len(), "inspecting");

    let inspection = inspect(args.root, &bytes, limits)?;

    if let Some(out) = &args.out {
        match &inspection.copy {
            Some(copy) => {
                fs::write(out, copy).with_context(|| format!("writing {}", out.display()))?;
                info!(out = %out.display(), len = copy.len(), "wrote copy");
            }
            None => warn!("root was dropped by the copy; nothing written"),
        }
    }

    let report = Report {
        kind: args.root.name(),
        input_bytes: bytes.len(),
        output_bytes: inspection.copy.as_ref().map(Vec::len),
        valid: inspection.validation.is_ok(),
        error: inspection.validation.as_ref().err().map(ToString::to_string),
        collapsed: inspection.collapsed,
        limits: inspection.limits,
        value: inspection.value,
    };
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;

    if let Err(err) = inspection.validation {
        warn!(%err, "validation failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
