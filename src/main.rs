//! staticmap CLI
//!
//! Entry point for the `staticmap` command-line tool.

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use staticmap::{CompilationConfig, CompileError, Compiler, OutputFormat};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "staticmap")]
#[command(about = "Compile wildcard configuration patterns into static lookup artifacts", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a pattern file and render an artifact
    Compile {
        /// Pattern file (.json, .yaml/.yml, .toml)
        input: PathBuf,

        /// Hierarchy file with dimensions and pattern rules
        #[arg(long)]
        hierarchy: Option<PathBuf>,

        /// Artifact path (default: print to stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Artifact format: json, yaml or rust
        #[arg(long, short = 'f')]
        format: Option<String>,

        /// Path to a TOML config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Omit the metadata block
        #[arg(long)]
        no_metadata: bool,

        /// Omit provenance from the metadata block
        #[arg(long)]
        no_provenance: bool,

        /// Generate linear-scan lookups in Rust modules
        #[arg(long)]
        no_optimize: bool,

        /// Upper bound on patterns per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Memory budget for chunked compilation, in MiB
        #[arg(long)]
        max_memory_mb: Option<usize>,

        /// Compile in chunks, reporting progress
        #[arg(long)]
        large: bool,
    },
}

struct CompileArgs {
    input: PathBuf,
    hierarchy: Option<PathBuf>,
    output: Option<PathBuf>,
    large: bool,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            hierarchy,
            output,
            format,
            config,
            no_metadata,
            no_provenance,
            no_optimize,
            chunk_size,
            max_memory_mb,
            large,
        } => {
            let overrides = match build_overrides(
                format.as_deref(),
                no_metadata,
                no_provenance,
                no_optimize,
                chunk_size,
                max_memory_mb,
            ) {
                Ok(o) => o,
                Err(e) => exit_with(&e),
            };
            let compilation = match CompilationConfig::resolve(config.as_deref(), Some(overrides)) {
                Ok(c) => c,
                Err(e) => exit_with(&CompileError::from(e)),
            };
            let args = CompileArgs {
                input,
                hierarchy,
                output,
                large,
            };
            if let Err(e) = run_compile(compilation, args) {
                exit_with(&e);
            }
        }
    }
}

/// Log to stderr so artifacts printed to stdout stay clean.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("staticmap=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_overrides(
    format: Option<&str>,
    no_metadata: bool,
    no_provenance: bool,
    no_optimize: bool,
    chunk_size: Option<usize>,
    max_memory_mb: Option<usize>,
) -> Result<Value, CompileError> {
    let mut overrides = Map::new();
    if let Some(name) = format {
        let format: OutputFormat = name.parse()?;
        overrides.insert("output_format".into(), json!(format.as_str()));
    }
    if no_metadata {
        overrides.insert("include_metadata".into(), json!(false));
    }
    if no_provenance {
        overrides.insert("include_provenance".into(), json!(false));
    }
    if no_optimize {
        overrides.insert("optimize_lookups".into(), json!(false));
    }
    if let Some(size) = chunk_size {
        overrides.insert("chunk_size".into(), json!(size));
    }
    if let Some(mb) = max_memory_mb {
        overrides.insert("max_memory_mb".into(), json!(mb));
    }
    Ok(Value::Object(overrides))
}

fn run_compile(config: CompilationConfig, args: CompileArgs) -> Result<(), CompileError> {
    let mut compiler = Compiler::new(config);

    let artifact = if args.large {
        let report: &mut dyn FnMut(usize, usize) = &mut |done, total| {
            eprintln!("  compiled {}/{} patterns", done, total);
        };
        compiler.compile_large_config(
            &args.input,
            args.hierarchy.as_deref(),
            args.output.as_deref(),
            Some(report),
        )?
    } else {
        compiler.compile_config(&args.input, args.hierarchy.as_deref(), args.output.as_deref())?
    };

    match &artifact.output_path {
        Some(path) => {
            eprintln!(
                "Wrote {} ({} keys from {} patterns) to {}",
                artifact.format,
                artifact.mapping.metadata.expanded_key_count,
                artifact.mapping.metadata.pattern_count,
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(artifact.content.as_bytes())
                .map_err(|source| CompileError::Write {
                    path: PathBuf::from("<stdout>"),
                    source,
                })?;
        }
    }
    Ok(())
}

fn exit_with(err: &CompileError) -> ! {
    eprintln!("Error: {}", err);
    process::exit(err.exit_code());
}
