//! Orchestration: discovery → propagation → CFG verification →
//! inter-procedural → dedup → classification → result assembly.

pub mod output;

use rayon::prelude::*;
use rusqlite::Connection;
use tracing::{debug, info};

use seep_core::config::TaintOptions;
use seep_core::errors::{FidelityError, SeepErrorCode, TaintError};
use seep_core::telemetry::init_tracing;
use seep_core::traits::{Cancellable, CancellationToken};
use seep_core::types::collections::{BTreeMap, FxHashMap};
use seep_storage::queries::symbols::FunctionRef;
use seep_storage::schema;

use crate::cache::MemoryCache;
use crate::discovery;
use crate::fidelity::{
    reconcile, AnalysisManifest, DedupManifest, DiscoveryManifest, StageCheck,
};
use crate::index::{DirectIndex, TaintIndex};
use crate::propagation::{deduplicate_paths, trace_from_source, SourceMatcher};
use crate::registry::TaintRegistry;
use crate::types::{ReportSummary, SinkOccurrence, SourceOccurrence, TaintPath, TaintReport};

/// Internal failure channel: analysis errors and strict-mode fidelity
/// failures both halt the run.
#[derive(Debug)]
enum EngineError {
    Taint(TaintError),
    Fidelity(FidelityError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Taint(e) => write!(f, "{}", e.formatted()),
            Self::Fidelity(e) => write!(f, "{}", e.formatted()),
        }
    }
}

impl From<TaintError> for EngineError {
    fn from(e: TaintError) -> Self {
        Self::Taint(e)
    }
}

impl From<seep_core::errors::StoreError> for EngineError {
    fn from(e: seep_core::errors::StoreError) -> Self {
        Self::Taint(TaintError::Store(e))
    }
}

impl From<FidelityError> for EngineError {
    fn from(e: FidelityError) -> Self {
        Self::Fidelity(e)
    }
}

/// Open an indexed store read-only and run the full analysis.
pub fn trace_taint_file(
    db_path: &std::path::Path,
    registry: &TaintRegistry,
    options: &TaintOptions,
    cancel: &CancellationToken,
) -> TaintReport {
    match seep_storage::connection::open_read_only(db_path) {
        Ok(conn) => trace_taint(&conn, registry, options, cancel),
        Err(e) => TaintReport::failure(e.formatted()),
    }
}

/// Run the full taint analysis against an indexed store.
///
/// Never panics and never returns `Err`: fatal conditions produce a report
/// with `success == false` and zeroed counts; per-function errors land in
/// the report's diagnostics.
pub fn trace_taint(
    conn: &Connection,
    registry: &TaintRegistry,
    options: &TaintOptions,
    cancel: &CancellationToken,
) -> TaintReport {
    init_tracing();

    if let Err(e) = schema::verify_contract(conn) {
        return TaintReport::failure(e.formatted());
    }

    let result = (|| -> Result<TaintReport, EngineError> {
        if options.use_memory_cache {
            let cache = MemoryCache::attempt_preload(
                conn,
                options.memory_limit_mb,
                registry.sources(),
                registry.sinks(),
            )
            .map_err(TaintError::from)?;
            if let Some(cache) = cache {
                return run_parallel(&cache, registry, options, cancel);
            }
        }
        debug!("running in direct-query mode");
        let direct = DirectIndex::new(conn);
        run_serial(&direct, registry, options, cancel)
    })();

    match result {
        Ok(report) => report,
        Err(e) => TaintReport::failure(e.to_string()),
    }
}

struct Prepared {
    sources: Vec<SourceOccurrence>,
    sinks: Vec<SinkOccurrence>,
    call_graph: FxHashMap<String, Vec<String>>,
}

fn prepare<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    options: &TaintOptions,
) -> Result<Prepared, EngineError> {
    let sources = discovery::find_sources(index, registry.sources())?;
    let sinks = discovery::find_sinks(index, registry.sinks())?;
    info!(sources = sources.len(), sinks = sinks.len(), "discovery complete");

    reconcile(
        StageCheck::Discovery(&DiscoveryManifest {
            source_count: sources.len(),
            sink_count: sinks.len(),
        }),
        options.strict_fidelity,
    )?;

    Ok(Prepared {
        sources,
        sinks,
        call_graph: index.call_graph()?,
    })
}

/// Trace one source. `Ok(None)` means the source was skipped (not external,
/// or no enclosing function).
fn trace_one<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    matcher: &SourceMatcher,
    options: &TaintOptions,
    prepared: &Prepared,
    source: &SourceOccurrence,
) -> Result<Option<Vec<TaintPath>>, TaintError> {
    if !discovery::is_external_source(index, source)? {
        return Ok(None);
    }
    let Some(source_function): Option<FunctionRef> =
        index.containing_function(&source.file, source.line)?
    else {
        return Ok(None);
    };

    trace_from_source(
        index,
        registry,
        matcher,
        options,
        source,
        &source_function,
        &prepared.sinks,
        &prepared.call_graph,
    )
    .map(Some)
}

fn run_serial<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    options: &TaintOptions,
    cancel: &CancellationToken,
) -> Result<TaintReport, EngineError> {
    let prepared = prepare(index, registry, options)?;
    let matcher = SourceMatcher::new(registry);

    let mut traces = Vec::with_capacity(prepared.sources.len());
    let mut cancelled = false;
    for source in &prepared.sources {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        traces.push(trace_one(index, registry, &matcher, options, &prepared, source));
    }

    assemble(options, prepared, traces, cancelled)
}

fn run_parallel<I: TaintIndex + Sync>(
    index: &I,
    registry: &TaintRegistry,
    options: &TaintOptions,
    cancel: &CancellationToken,
) -> Result<TaintReport, EngineError> {
    let prepared = prepare(index, registry, options)?;
    let matcher = SourceMatcher::new(registry);

    // Per-independent-source fan-out; the cache is immutable after preload
    // and results are collected in source order, keeping dedup stable.
    let traces: Vec<Result<Option<Vec<TaintPath>>, TaintError>> = prepared
        .sources
        .par_iter()
        .map(|source| {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            trace_one(index, registry, &matcher, options, &prepared, source)
        })
        .collect();

    let cancelled = cancel.is_cancelled();
    assemble(options, prepared, traces, cancelled)
}

fn assemble(
    options: &TaintOptions,
    prepared: Prepared,
    traces: Vec<Result<Option<Vec<TaintPath>>, TaintError>>,
    cancelled: bool,
) -> Result<TaintReport, EngineError> {
    let mut all_paths: Vec<TaintPath> = Vec::new();
    let mut diagnostics: Vec<String> = Vec::new();
    let mut sources_checked = 0usize;

    for (source, result) in prepared.sources.iter().zip(traces) {
        match result {
            Ok(Some(paths)) => {
                sources_checked += 1;
                all_paths.extend(paths);
            }
            Ok(None) => {}
            // Per-function errors are diagnostics; the run continues.
            Err(e) => diagnostics.push(format!(
                "{}:{} ({}): {}",
                source.file,
                source.line,
                source.pattern,
                e.formatted()
            )),
        }
    }
    if cancelled {
        diagnostics.push("analysis cancelled by host; results are partial".to_string());
    }

    // The sink list is fully enumerated for every checked source; a zero
    // here with sinks present means the loop itself stalled.
    reconcile(
        StageCheck::Analysis {
            manifest: &AnalysisManifest {
                vulnerable_count: all_paths.len(),
                sanitized_count: 0,
                sinks_analyzed: prepared.sinks.len(),
                sources_checked,
            },
            sinks_to_analyze: prepared.sinks.len(),
        },
        options.strict_fidelity,
    )?;

    let pre_count = all_paths.len();
    let unique = deduplicate_paths(all_paths);
    reconcile(
        StageCheck::Dedup(&DedupManifest::new(pre_count, unique.len())),
        options.strict_fidelity,
    )?;

    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    for path in &unique {
        *by_type.entry(path.vulnerability_type.clone()).or_default() += 1;
    }

    info!(
        vulnerabilities = unique.len(),
        sources = prepared.sources.len(),
        sinks = prepared.sinks.len(),
        "analysis complete"
    );

    Ok(TaintReport {
        success: true,
        error: None,
        sources_found: prepared.sources.len(),
        sinks_found: prepared.sinks.len(),
        total_vulnerabilities: unique.len(),
        summary: ReportSummary {
            total_count: unique.len(),
            by_type: by_type.clone(),
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
        },
        vulnerabilities_by_type: by_type,
        taint_paths: unique,
        diagnostics,
    })
}
