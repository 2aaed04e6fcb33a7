//! Build orchestration.
//!
//! A run scans the source root, decodes every fact stream in parallel,
//! merges the decoded streams serially in stream order, freezes the index,
//! renders every source file in parallel against the frozen index, and
//! exports the relationship graph. Nothing a single stream or file does can
//! stop the run; those problems become [`Diagnostic`]s.

use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::diagnostics::{Diagnostic, DiagnosticsReport};
use crate::error::XrefError;
use crate::facts::decode::{decode_file, DecodeError, DecodedStream};
use crate::graph::{self, Graph};
use crate::highlight::grammar::GrammarSet;
use crate::highlight::highlight;
use crate::index::{Index, IndexStats};
use crate::resolve::{DefinitionPrecedence, FirstSeen, PathWeighted, Resolver};
use crate::render::{plain_markup, render_file, verify_markup, wrap_page};
use crate::workspace::{ScanConfig, SourceFile, SourceTree};

/// Extension of fact stream files.
pub const FACTS_EXTENSION: &str = "facts";

// ============================================================================
// Configuration
// ============================================================================

/// Order in which fact streams are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StreamOrder {
    /// Every `*.facts` file under the facts directory, sorted by path.
    #[default]
    Lexical,
    /// Stream paths listed one per line in an order file.
    Explicit(PathBuf),
}

/// Configuration for a build run.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Root of the source tree.
    pub source_root: PathBuf,
    /// Directory searched for `*.facts` streams.
    pub facts_dir: Option<PathBuf>,
    pub order: StreamOrder,
    /// Extra grammar tables layered over the built-ins.
    pub grammar_files: Vec<PathBuf>,
    pub scan: ScanConfig,
    /// `(path prefix, weight)` pairs; empty means first definition wins.
    pub prefer: Vec<(String, i32)>,
    /// Worker threads; `None` uses one per core.
    pub jobs: Option<usize>,
    /// Skip rendering (index and graph only).
    pub skip_render: bool,
    /// Check that every rendered page strips back to its source.
    pub verify: bool,
}

impl BuildConfig {
    /// Streams under `facts_dir`, merged in lexical order.
    pub fn new(source_root: impl Into<PathBuf>, facts_dir: impl Into<PathBuf>) -> Self {
        BuildConfig {
            source_root: source_root.into(),
            facts_dir: Some(facts_dir.into()),
            ..Default::default()
        }
    }

    /// Streams listed in `order_file`, merged in the listed order.
    pub fn with_order_file(
        source_root: impl Into<PathBuf>,
        order_file: impl Into<PathBuf>,
    ) -> Self {
        BuildConfig {
            source_root: source_root.into(),
            order: StreamOrder::Explicit(order_file.into()),
            ..Default::default()
        }
    }

    /// Add a grammar table file.
    pub fn grammar(mut self, path: impl Into<PathBuf>) -> Self {
        self.grammar_files.push(path.into());
        self
    }

    /// Add an exclude glob for the source scan.
    pub fn exclude(mut self, pattern: &str) -> Self {
        self.scan = self.scan.exclude(pattern);
        self
    }

    /// Follow symlinks while scanning the source root.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.scan = self.scan.follow_symlinks(follow);
        self
    }

    /// Leave source files larger than `bytes` out of the scan.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.scan = self.scan.max_file_size(bytes);
        self
    }

    /// Prefer definitions under `prefix` with the given weight.
    pub fn prefer(mut self, prefix: impl Into<String>, weight: i32) -> Self {
        self.prefer.push((prefix.into(), weight));
        self
    }

    /// Set the worker count.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Enable markup verification.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    fn precedence(&self) -> Box<dyn DefinitionPrecedence> {
        if self.prefer.is_empty() {
            return Box::new(FirstSeen);
        }
        let weighted = self
            .prefer
            .iter()
            .fold(PathWeighted::new(), |p, (prefix, weight)| p.with(prefix.clone(), *weight));
        Box::new(weighted)
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared cancellation flag, checked between streams and between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), XrefError> {
        if self.is_cancelled() {
            Err(XrefError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Run Output
// ============================================================================

/// One rendered page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Source path relative to the root.
    pub path: String,
    /// Complete HTML page.
    pub html: Vec<u8>,
    pub links: usize,
    /// False when rendering failed and the page is plain escaped text.
    pub annotated: bool,
}

/// Counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub streams_attempted: usize,
    pub streams_decoded: usize,
    pub streams_failed: usize,
    pub facts: usize,
    pub source_files: usize,
    pub pages: usize,
    pub render_failures: usize,
    pub index: IndexStats,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub index: Index,
    pub graph: Graph,
    pub pages: Vec<RenderedPage>,
    pub diagnostics: DiagnosticsReport,
    pub stats: RunStats,
}

// ============================================================================
// Stream Discovery
// ============================================================================

/// List the fact streams to merge, in merge order.
pub fn discover_streams(config: &BuildConfig) -> Result<Vec<PathBuf>, XrefError> {
    match &config.order {
        StreamOrder::Explicit(order_file) => read_order_file(order_file),
        StreamOrder::Lexical => {
            let dir = config
                .facts_dir
                .as_deref()
                .ok_or_else(|| XrefError::invalid_args("no facts directory or order file given"))?;
            if !dir.is_dir() {
                return Err(XrefError::input(dir, "not a directory"));
            }
            let mut streams: Vec<PathBuf> = WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable entry in facts directory");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| path.extension().is_some_and(|ext| ext == FACTS_EXTENSION))
                .collect();
            streams.sort();
            Ok(streams)
        }
    }
}

/// Relative entries resolve against the order file's directory. Blank lines
/// and `#` comments are skipped.
fn read_order_file(order_file: &Path) -> Result<Vec<PathBuf>, XrefError> {
    let listing =
        fs::read_to_string(order_file).map_err(|e| XrefError::input(order_file, e.to_string()))?;
    let base = order_file.parent().unwrap_or_else(|| Path::new(""));
    Ok(listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let path = Path::new(line);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        })
        .collect())
}

// ============================================================================
// Run
// ============================================================================

/// Execute a build.
pub fn run(config: &BuildConfig, cancel: &CancelFlag) -> Result<RunOutput, XrefError> {
    let tree = SourceTree::scan(&config.source_root, &config.scan)?;

    let mut grammars = GrammarSet::builtin();
    for path in &config.grammar_files {
        let count = grammars.load_file(path)?;
        debug!(path = %path.display(), count, "loaded grammar tables");
    }

    let streams = discover_streams(config)?;

    match config.jobs {
        Some(jobs) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|e| XrefError::internal(format!("cannot start worker pool: {}", e)))?;
            pool.install(|| run_with(config, &tree, &grammars, &streams, cancel))
        }
        None => run_with(config, &tree, &grammars, &streams, cancel),
    }
}

fn run_with(
    config: &BuildConfig,
    tree: &SourceTree,
    grammars: &GrammarSet,
    streams: &[PathBuf],
    cancel: &CancelFlag,
) -> Result<RunOutput, XrefError> {
    let mut stats = RunStats {
        streams_attempted: streams.len(),
        source_files: tree.len(),
        ..Default::default()
    };
    let mut diagnostics = Vec::new();

    // Decode in parallel; collect keeps stream order.
    let decoded: Vec<Option<Result<DecodedStream, DecodeError>>> = streams
        .par_iter()
        .map(|path| {
            if cancel.is_cancelled() {
                return None;
            }
            debug!(stream = %path.display(), "decoding");
            Some(decode_file(path, tree))
        })
        .collect();
    cancel.check()?;

    let mut resolver = Resolver::with_precedence(config.precedence());
    for result in decoded.into_iter().flatten() {
        cancel.check()?;
        match result {
            Ok(stream) => {
                stats.streams_decoded += 1;
                stats.facts += stream.facts.len();
                if !stream.warnings.is_empty() {
                    warn!(
                        stream = %stream.name,
                        dropped = stream.warnings.len(),
                        "dropped facts while decoding"
                    );
                }
                resolver.merge(&stream);
                diagnostics.extend(stream.warnings);
            }
            Err(e) => {
                stats.streams_failed += 1;
                warn!(error = %e, "skipping fact stream");
                diagnostics.push(Diagnostic::from(&e));
            }
        }
    }
    if stats.streams_decoded == 0 {
        return Err(XrefError::NoUsableStreams {
            attempted: stats.streams_attempted,
            failed: stats.streams_failed,
        });
    }

    let (index, merge_diagnostics) = resolver.finish();
    diagnostics.extend(merge_diagnostics);
    stats.index = index.stats();

    let mut pages = Vec::new();
    if !config.skip_render {
        let targets: Vec<&SourceFile> = tree
            .files()
            .filter(|f| {
                grammars.for_path(&f.path).is_some() || !index.occurrences_in(&f.path).is_empty()
            })
            .collect();
        let rendered: Vec<Option<(RenderedPage, Vec<Diagnostic>)>> = targets
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(render_page(file, grammars, &index, config.verify))
            })
            .collect();
        cancel.check()?;
        for (page, page_diagnostics) in rendered.into_iter().flatten() {
            if !page.annotated {
                stats.render_failures += 1;
            }
            diagnostics.extend(page_diagnostics);
            pages.push(page);
        }
        stats.pages = pages.len();
    }

    let graph = graph::export(&index);

    info!(
        streams = stats.streams_decoded,
        failed = stats.streams_failed,
        symbols = stats.index.symbols,
        pages = stats.pages,
        diagnostics = diagnostics.len(),
        "build complete"
    );

    Ok(RunOutput {
        index,
        graph,
        pages,
        diagnostics: DiagnosticsReport::new(diagnostics),
        stats,
    })
}

/// Highlight and annotate one file. Failure falls back to plain escaped text.
fn render_page(
    file: &SourceFile,
    grammars: &GrammarSet,
    index: &Index,
    verify: bool,
) -> (RenderedPage, Vec<Diagnostic>) {
    let text = file.content();
    let highlighted = highlight(text, grammars.for_path_or_plain(&file.path));
    let mut diagnostics = highlighted.diagnostics(&file.path);

    let annotated = render_file(&file.path, text, &highlighted, index).and_then(|rendered| {
        let markup = rendered.to_markup(text);
        if verify {
            verify_markup(text, &markup)?;
        }
        Ok((markup, rendered.links.len()))
    });

    let page = match annotated {
        Ok((markup, links)) => RenderedPage {
            path: file.path.clone(),
            html: wrap_page(&file.path, &markup),
            links,
            annotated: true,
        },
        Err(e) => {
            warn!(file = %file.path, error = %e, "rendering failed; emitting plain text");
            diagnostics.push(Diagnostic::RenderFailed {
                file: file.path.clone(),
                reason: e.to_string(),
            });
            RenderedPage {
                path: file.path.clone(),
                html: wrap_page(&file.path, &plain_markup(text)),
                links: 0,
                annotated: false,
            }
        }
    };
    debug!(file = %page.path, links = page.links, "rendered");
    (page, diagnostics)
}

// ============================================================================
// Writing Outputs
// ============================================================================

/// Relative path of the page for a source file.
pub fn page_path(source: &str) -> String {
    format!("source/{}.html", source)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), XrefError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| XrefError::output(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| XrefError::output(path, e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, XrefError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| XrefError::internal(format!("serialization failed: {}", e)))
}

/// Write the index, graph, diagnostics and pages under `out_dir`. Returns
/// the number of files written.
pub fn write_outputs(output: &RunOutput, out_dir: &Path) -> Result<usize, XrefError> {
    let index_json = output
        .index
        .to_json()
        .map_err(|e| XrefError::internal(format!("serialization failed: {}", e)))?;
    write_file(&out_dir.join("index.json"), index_json.as_bytes())?;
    write_file(&out_dir.join("graph.dot"), output.graph.to_dot().as_bytes())?;
    write_file(&out_dir.join("graph.json"), to_json(&output.graph)?.as_bytes())?;
    write_file(
        &out_dir.join("diagnostics.json"),
        to_json(&output.diagnostics)?.as_bytes(),
    )?;
    for page in &output.pages {
        write_file(&out_dir.join(page_path(&page.path)), &page.html)?;
    }
    let written = 4 + output.pages.len();
    debug!(out_dir = %out_dir.display(), written, "wrote outputs");
    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const A_FACTS: &str = r#"{"record":"header","format":"xref-facts","version":1,"unit":"a.c"}
{"record":"symbol","id":1,"name":"foo","kind":"function","signature":"void (void)"}
{"record":"fact","kind":"declares","symbol":1,"loc":{"file":"a.h","start":5,"end":8}}
{"record":"end","facts":1}
"#;

    fn scratch() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("facts")).unwrap();
        fs::write(dir.path().join("src/a.h"), "void foo(void);\n").unwrap();
        dir
    }

    mod discovery {
        use super::*;

        #[test]
        fn lexical_order_finds_only_facts_files() {
            let dir = scratch();
            let facts = dir.path().join("facts");
            fs::write(facts.join("b.facts"), "").unwrap();
            fs::write(facts.join("a.facts"), "").unwrap();
            fs::write(facts.join("notes.txt"), "").unwrap();
            let config = BuildConfig::new(dir.path().join("src"), &facts);
            let streams = discover_streams(&config).unwrap();
            assert_eq!(streams, vec![facts.join("a.facts"), facts.join("b.facts")]);
        }

        #[test]
        fn order_file_keeps_listed_order() {
            let dir = scratch();
            let order = dir.path().join("order.txt");
            fs::write(&order, "# merge b first\nfacts/b.facts\n\nfacts/a.facts\n").unwrap();
            let config = BuildConfig::with_order_file(dir.path().join("src"), &order);
            let streams = discover_streams(&config).unwrap();
            assert_eq!(
                streams,
                vec![dir.path().join("facts/b.facts"), dir.path().join("facts/a.facts")]
            );
        }

        #[test]
        fn missing_facts_dir_is_input_error() {
            let dir = scratch();
            let config = BuildConfig::new(dir.path().join("src"), dir.path().join("nope"));
            assert!(matches!(discover_streams(&config), Err(XrefError::Input { .. })));
        }

        #[test]
        fn no_stream_source_is_invalid_args() {
            let config = BuildConfig::default();
            assert!(matches!(
                discover_streams(&config),
                Err(XrefError::InvalidArguments { .. })
            ));
        }
    }

    mod runs {
        use super::*;

        #[test]
        fn empty_facts_dir_has_no_usable_streams() {
            let dir = scratch();
            let config = BuildConfig::new(dir.path().join("src"), dir.path().join("facts"));
            let err = run(&config, &CancelFlag::new()).unwrap_err();
            assert!(matches!(
                err,
                XrefError::NoUsableStreams {
                    attempted: 0,
                    failed: 0
                }
            ));
        }

        #[test]
        fn bad_stream_is_skipped_with_diagnostic() {
            let dir = scratch();
            fs::write(dir.path().join("facts/a.facts"), A_FACTS).unwrap();
            fs::write(dir.path().join("facts/z.facts"), "garbage\n").unwrap();
            let config = BuildConfig::new(dir.path().join("src"), dir.path().join("facts"));
            let output = run(&config, &CancelFlag::new()).unwrap();
            assert_eq!(output.stats.streams_decoded, 1);
            assert_eq!(output.stats.streams_failed, 1);
            assert_eq!(output.diagnostics.count("decode_error"), 1);
            assert_eq!(output.index.symbols().len(), 1);
        }

        #[test]
        fn cancelled_run_stops() {
            let dir = scratch();
            fs::write(dir.path().join("facts/a.facts"), A_FACTS).unwrap();
            let config = BuildConfig::new(dir.path().join("src"), dir.path().join("facts"));
            let cancel = CancelFlag::new();
            cancel.cancel();
            assert!(matches!(run(&config, &cancel), Err(XrefError::Cancelled)));
        }

        #[test]
        fn single_worker_matches_default_pool() {
            let dir = scratch();
            fs::write(dir.path().join("facts/a.facts"), A_FACTS).unwrap();
            let config = BuildConfig::new(dir.path().join("src"), dir.path().join("facts"));
            let serial = run(&config.clone().jobs(1), &CancelFlag::new()).unwrap();
            let parallel = run(&config, &CancelFlag::new()).unwrap();
            assert_eq!(serial.index, parallel.index);
            assert_eq!(serial.graph, parallel.graph);
        }

        #[test]
        fn skip_render_produces_no_pages() {
            let dir = scratch();
            fs::write(dir.path().join("facts/a.facts"), A_FACTS).unwrap();
            let mut config = BuildConfig::new(dir.path().join("src"), dir.path().join("facts"));
            config.skip_render = true;
            let output = run(&config, &CancelFlag::new()).unwrap();
            assert!(output.pages.is_empty());
        }
    }

    mod writing {
        use super::*;

        #[test]
        fn writes_layout() {
            let dir = scratch();
            fs::write(dir.path().join("facts/a.facts"), A_FACTS).unwrap();
            let config =
                BuildConfig::new(dir.path().join("src"), dir.path().join("facts")).verify(true);
            let output = run(&config, &CancelFlag::new()).unwrap();
            let out = dir.path().join("out");
            let written = write_outputs(&output, &out).unwrap();
            assert_eq!(written, 5);
            for name in ["index.json", "graph.dot", "graph.json", "diagnostics.json"] {
                assert!(out.join(name).is_file(), "{} missing", name);
            }
            let page = fs::read_to_string(out.join("source/a.h.html")).unwrap();
            assert!(page.contains("id=\"decl-"));
        }

        #[test]
        fn page_paths() {
            assert_eq!(page_path("lib/x.c"), "source/lib/x.c.html");
        }
    }
}
