//! Binary entry point for the xref CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Build index, pages and graph from a facts directory
//! xref build --source src --facts facts --out xref-out
//!
//! # Merge streams in an explicit order, preferring definitions under lib/
//! xref build --source src --order streams.txt --prefer lib/=10 --out xref-out
//!
//! # Look things up in a saved index
//! xref query symbol --index xref-out/index.json foo
//! xref query at --index xref-out/index.json b.c 46
//! xref query search --index xref-out/index.json ns:: --kind function
//!
//! # Export the relationship graph
//! xref graph --index xref-out/index.json --format dot
//! ```
//!
//! All stdout is JSON (except DOT graphs); logs go to stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use xreftool::cli::{
    load_index, parse_preference, query_at, query_search, query_symbol, run_build, run_graph,
    run_highlight,
};
use xreftool_core::error::{OutputErrorCode, XrefError};
use xreftool_core::facts::SymbolKind;
use xreftool_core::highlight::grammar::GrammarSet;
use xreftool_core::index::EdgeKind;
use xreftool_core::output::{emit_response, emit_response_compact, ErrorResponse, GraphResponse};
use xreftool_core::pipeline::{BuildConfig, CancelFlag};

// ============================================================================
// CLI Structure
// ============================================================================

/// Cross-referenced source browsing from compiler fact streams.
#[derive(Parser, Debug)]
#[command(name = "xref", version, about = "Cross-reference index builder and renderer")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit compact single-line JSON.
    #[arg(long, global = true)]
    compact: bool,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for the graph command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum GraphFormat {
    /// Graphviz DOT (default).
    #[default]
    Dot,
    /// JSON response.
    Json,
}

/// Relationship kinds selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EdgeKindArg {
    InheritsFrom,
    Overrides,
    Calls,
}

impl From<EdgeKindArg> for EdgeKind {
    fn from(arg: EdgeKindArg) -> Self {
        match arg {
            EdgeKindArg::InheritsFrom => EdgeKind::InheritsFrom,
            EdgeKindArg::Overrides => EdgeKind::Overrides,
            EdgeKindArg::Calls => EdgeKind::Calls,
        }
    }
}

/// Parse a symbol kind name.
fn parse_symbol_kind(s: &str) -> Result<SymbolKind, String> {
    SymbolKind::parse(s).ok_or_else(|| format!("unknown symbol kind '{}'", s))
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Decode fact streams and build the index, pages and graph.
    Build {
        /// Source root.
        #[arg(long)]
        source: PathBuf,
        /// Directory of `*.facts` streams, merged in lexical order.
        #[arg(long, conflicts_with = "order", required_unless_present = "order")]
        facts: Option<PathBuf>,
        /// File listing stream paths one per line, merged in listed order.
        #[arg(long)]
        order: Option<PathBuf>,
        /// Output directory; nothing is written without it.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Grammar table JSON file (repeatable).
        #[arg(long = "grammars")]
        grammars: Vec<PathBuf>,
        /// Glob of source paths to skip (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        /// Skip source files larger than this many bytes.
        #[arg(long, value_name = "BYTES")]
        max_file_size: Option<u64>,
        /// Follow symlinks under the source root.
        #[arg(long)]
        follow_symlinks: bool,
        /// Definition preference `<prefix>=<weight>` (repeatable).
        #[arg(long, value_parser = parse_preference)]
        prefer: Vec<(String, i32)>,
        /// Worker threads (default: one per core).
        #[arg(long)]
        jobs: Option<usize>,
        /// Build the index and graph only.
        #[arg(long)]
        no_render: bool,
        /// Check every page strips back to its source.
        #[arg(long)]
        verify: bool,
    },
    /// Query a saved index.
    Query {
        #[command(subcommand)]
        op: QueryOp,
    },
    /// Export the relationship graph of a saved index.
    Graph {
        /// Path to `index.json`.
        #[arg(long)]
        index: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value = "dot")]
        format: GraphFormat,
        /// Edge kinds to keep (repeatable; default all).
        #[arg(long = "kind", value_enum)]
        kinds: Vec<EdgeKindArg>,
    },
    /// Classify the tokens of one file.
    Highlight {
        /// File to highlight.
        file: PathBuf,
        /// Grammar table JSON file (repeatable).
        #[arg(long = "grammars")]
        grammars: Vec<PathBuf>,
    },
}

/// Index queries.
#[derive(Subcommand, Debug)]
enum QueryOp {
    /// Describe symbols by id or exact name.
    Symbol {
        #[arg(long)]
        index: PathBuf,
        /// 16-digit id, qualified name, or simple name.
        name: String,
    },
    /// Find the occurrence at a byte offset.
    At {
        #[arg(long)]
        index: PathBuf,
        /// Source-root-relative path.
        file: String,
        /// Byte offset.
        offset: u64,
    },
    /// List symbols by name prefix.
    Search {
        #[arg(long)]
        index: PathBuf,
        prefix: String,
        /// Only symbols of this kind.
        #[arg(long, value_parser = parse_symbol_kind)]
        kind: Option<SymbolKind>,
        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON like every other response
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), XrefError> {
    let global = cli.global;
    match cli.command {
        Command::Build {
            source,
            facts,
            order,
            out,
            grammars,
            exclude,
            max_file_size,
            follow_symlinks,
            prefer,
            jobs,
            no_render,
            verify,
        } => {
            let mut config = match (facts, order) {
                (_, Some(order)) => BuildConfig::with_order_file(source, order),
                (Some(facts), None) => BuildConfig::new(source, facts),
                (None, None) => {
                    return Err(XrefError::invalid_args("either --facts or --order is required"))
                }
            };
            for path in grammars {
                config = config.grammar(path);
            }
            for pattern in &exclude {
                config = config.exclude(pattern);
            }
            if let Some(bytes) = max_file_size {
                config = config.max_file_size(bytes);
            }
            config = config.follow_symlinks(follow_symlinks);
            for (prefix, weight) in prefer {
                config = config.prefer(prefix, weight);
            }
            if let Some(jobs) = jobs {
                if jobs == 0 {
                    return Err(XrefError::invalid_args("--jobs must be at least 1"));
                }
                config = config.jobs(jobs);
            }
            config.skip_render = no_render;
            config = config.verify(verify);

            let response = run_build(&config, out.as_deref(), &CancelFlag::new())?;
            emit(&global, &response)
        }
        Command::Query { op } => execute_query(&global, op),
        Command::Graph {
            index,
            format,
            kinds,
        } => {
            let index = load_index(&index)?;
            let kinds: Vec<EdgeKind> = kinds.into_iter().map(EdgeKind::from).collect();
            let graph = run_graph(&index, &kinds);
            match format {
                GraphFormat::Dot => {
                    let mut stdout = io::stdout();
                    write!(stdout, "{}", graph.to_dot())
                        .and_then(|_| stdout.flush())
                        .map_err(|e| XrefError::internal(e.to_string()))
                }
                GraphFormat::Json => emit(&global, &GraphResponse::new(graph)),
            }
        }
        Command::Highlight { file, grammars } => {
            let mut set = GrammarSet::builtin();
            for path in &grammars {
                set.load_file(path)?;
            }
            let response = run_highlight(&file, &set)?;
            emit(&global, &response)
        }
    }
}

/// Execute a query subcommand.
fn execute_query(global: &GlobalArgs, op: QueryOp) -> Result<(), XrefError> {
    match op {
        QueryOp::Symbol { index, name } => {
            let index = load_index(&index)?;
            emit(global, &query_symbol(&index, &name)?)
        }
        QueryOp::At {
            index,
            file,
            offset,
        } => {
            let index = load_index(&index)?;
            emit(global, &query_at(&index, &file, offset)?)
        }
        QueryOp::Search {
            index,
            prefix,
            kind,
            limit,
        } => {
            let index = load_index(&index)?;
            emit(global, &query_search(&index, &prefix, kind, limit))
        }
    }
}

/// Write a response to stdout.
fn emit<T: Serialize>(global: &GlobalArgs, response: &T) -> Result<(), XrefError> {
    let mut stdout = io::stdout();
    let result = if global.compact {
        emit_response_compact(response, &mut stdout)
    } else {
        emit_response(response, &mut stdout)
    };
    result.map_err(|e| XrefError::internal(e.to_string()))?;
    let _ = stdout.flush();
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn build_with_facts_dir() {
            let args = [
                "xref", "build", "--source", "src", "--facts", "facts", "--out", "out",
            ];
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Command::Build {
                    source,
                    facts,
                    order,
                    out,
                    ..
                } => {
                    assert_eq!(source, PathBuf::from("src"));
                    assert_eq!(facts, Some(PathBuf::from("facts")));
                    assert!(order.is_none());
                    assert_eq!(out, Some(PathBuf::from("out")));
                }
                _ => panic!("expected Build"),
            }
        }

        #[test]
        fn build_requires_facts_or_order() {
            let args = ["xref", "build", "--source", "src"];
            assert!(Cli::try_parse_from(args).is_err());
        }

        #[test]
        fn build_rejects_facts_with_order() {
            let args = [
                "xref", "build", "--source", "src", "--facts", "f", "--order", "o.txt",
            ];
            assert!(Cli::try_parse_from(args).is_err());
        }

        #[test]
        fn build_repeatable_preferences() {
            let args = [
                "xref", "build", "--source", "src", "--facts", "f", "--prefer", "lib/=10",
                "--prefer", "test/=-5",
            ];
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Command::Build { prefer, .. } => {
                    assert_eq!(
                        prefer,
                        vec![("lib/".to_string(), 10), ("test/".to_string(), -5)]
                    );
                }
                _ => panic!("expected Build"),
            }
        }

        #[test]
        fn build_scan_limits() {
            let args = [
                "xref", "build", "--source", "src", "--facts", "f", "--max-file-size", "4096",
                "--follow-symlinks",
            ];
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Command::Build {
                    max_file_size,
                    follow_symlinks,
                    ..
                } => {
                    assert_eq!(max_file_size, Some(4096));
                    assert!(follow_symlinks);
                }
                _ => panic!("expected Build"),
            }
        }

        #[test]
        fn build_bad_preference_is_rejected() {
            let args = [
                "xref", "build", "--source", "src", "--facts", "f", "--prefer", "lib/",
            ];
            assert!(Cli::try_parse_from(args).is_err());
        }

        #[test]
        fn graph_defaults_to_dot() {
            let args = ["xref", "graph", "--index", "index.json"];
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Command::Graph { format, kinds, .. } => {
                    assert_eq!(format, GraphFormat::Dot);
                    assert!(kinds.is_empty());
                }
                _ => panic!("expected Graph"),
            }
        }

        #[test]
        fn graph_kind_filter() {
            let args = [
                "xref", "graph", "--index", "i.json", "--kind", "inherits-from", "--kind", "calls",
            ];
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Command::Graph { kinds, .. } => {
                    assert_eq!(kinds, vec![EdgeKindArg::InheritsFrom, EdgeKindArg::Calls]);
                }
                _ => panic!("expected Graph"),
            }
        }

        #[test]
        fn query_search_kind() {
            let args = [
                "xref", "query", "search", "--index", "i.json", "ns::", "--kind", "function",
            ];
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Command::Query {
                    op: QueryOp::Search { prefix, kind, .. },
                } => {
                    assert_eq!(prefix, "ns::");
                    assert_eq!(kind, Some(SymbolKind::Function));
                }
                _ => panic!("expected Query Search"),
            }
        }

        #[test]
        fn query_at_offset() {
            let args = ["xref", "query", "at", "--index", "i.json", "b.c", "46"];
            let cli = Cli::try_parse_from(args).unwrap();
            match cli.command {
                Command::Query {
                    op: QueryOp::At { file, offset, .. },
                } => {
                    assert_eq!(file, "b.c");
                    assert_eq!(offset, 46);
                }
                _ => panic!("expected Query At"),
            }
        }

        #[test]
        fn global_log_level_after_subcommand() {
            let args = ["xref", "highlight", "a.c", "--log-level", "debug"];
            let cli = Cli::try_parse_from(args).unwrap();
            assert!(matches!(cli.global.log_level, LogLevel::Debug));
        }
    }
}
