//! ctxpack CLI - Pack files and folders into LLM prompt context.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use ctxpack::clipboard::SystemClipboard;
use ctxpack::compress::CompressionLevel;
use ctxpack::detect::detect_file_types;
use ctxpack::errors::{exit_code, CtxError};
use ctxpack::extract::{copy_to_clipboard, extract, ExtractMode, ExtractionResult};
use ctxpack::filter::FileTypeSet;
use ctxpack::settings::{ConfigStore, JsonFileStore};
use ctxpack::tokens::{count_with, TokenEstimator};
use ctxpack::tree::format_number;
use ctxpack::CancellationToken;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ctxpack")]
#[command(about = "Pack files and folders into a tree-plus-content prompt for LLMs")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings file (default: <config dir>/ctxpack/settings.json)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the tree and contents of the selected paths
    Extract {
        /// Files or directories to extract
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only render the tree, skip file contents
        #[arg(long)]
        tree_only: bool,

        /// Copy the result to the system clipboard instead of printing it
        #[arg(long)]
        clip: bool,

        /// Output the full result as JSON
        #[arg(long)]
        json: bool,

        /// Print a summary to stderr
        #[arg(long)]
        stats: bool,

        /// Compression level (default: stored setting)
        #[arg(long)]
        compression: Option<CompressionArg>,

        /// Comma-separated file types, e.g. .ts,.md (default: stored setting)
        #[arg(long)]
        types: Option<String>,

        /// Maximum bytes read from a single file
        #[arg(long)]
        max_file_bytes: Option<u64>,

        /// Maximum bytes across all included files
        #[arg(long)]
        max_total_bytes: Option<u64>,

        /// Concurrent file reads
        #[arg(long)]
        jobs: Option<usize>,

        /// Honour .gitignore files
        #[arg(long)]
        gitignore: bool,

        /// Token estimator
        #[arg(long, default_value = "approx")]
        encoding: EncodingArg,
    },

    /// Count characters and tokens in a file or stdin
    Count {
        /// File to count (stdin when absent)
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Token estimator
        #[arg(long, default_value = "approx")]
        encoding: EncodingArg,
    },

    /// Manage the stored file-type allow-list
    Types {
        #[command(subcommand)]
        action: TypesAction,
    },

    /// Show or set the stored compression level
    Compression {
        /// New level
        level: Option<CompressionArg>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TypesAction {
    /// List stored file types
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add file types
    Add {
        #[arg(required = true)]
        suffixes: Vec<String>,
    },
    /// Remove file types
    Remove {
        #[arg(required = true)]
        suffixes: Vec<String>,
    },
    /// Detect file types present in a workspace
    Detect {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Replace the stored list with the detected one
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Light,
    Full,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Approx,
    Cl100k,
    O200k,
}

impl From<CompressionArg> for CompressionLevel {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => CompressionLevel::None,
            CompressionArg::Light => CompressionLevel::Light,
            CompressionArg::Full => CompressionLevel::Full,
        }
    }
}

impl From<EncodingArg> for TokenEstimator {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Approx => TokenEstimator::Approximate,
            EncodingArg::Cl100k => TokenEstimator::Cl100k,
            EncodingArg::O200k => TokenEstimator::O200k,
        }
    }
}

struct ExtractArgs {
    paths: Vec<PathBuf>,
    tree_only: bool,
    clip: bool,
    json: bool,
    stats: bool,
    compression: Option<CompressionArg>,
    types: Option<String>,
    max_file_bytes: Option<u64>,
    max_total_bytes: Option<u64>,
    jobs: Option<usize>,
    gitignore: bool,
    encoding: EncodingArg,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_output = json_flag(&cli.command);

    let result = match cli.command {
        Commands::Extract {
            paths,
            tree_only,
            clip,
            json,
            stats,
            compression,
            types,
            max_file_bytes,
            max_total_bytes,
            jobs,
            gitignore,
            encoding,
        } => run_extract(
            cli.settings,
            ExtractArgs {
                paths,
                tree_only,
                clip,
                json,
                stats,
                compression,
                types,
                max_file_bytes,
                max_total_bytes,
                jobs,
                gitignore,
                encoding,
            },
        ),
        Commands::Count {
            file,
            json,
            encoding,
        } => run_count(file, json, encoding.into()),
        Commands::Types { action } => run_types(cli.settings, action),
        Commands::Compression { level } => run_compression(cli.settings, level),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "ctxpack", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "ctxpack=warn",
        1 => "ctxpack=debug",
        _ => "ctxpack=trace",
    };
    let filter = EnvFilter::try_from_env("CTXPACK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber can only be installed once per process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Extract { json, .. } => *json,
        Commands::Count { json, .. } => *json,
        Commands::Types {
            action: TypesAction::List { json },
        } => *json,
        _ => false,
    }
}

fn open_store(path: Option<PathBuf>) -> Result<JsonFileStore, CtxError> {
    match path {
        Some(path) => Ok(JsonFileStore::new(path)),
        None => Ok(JsonFileStore::default_location()?),
    }
}

// --- Extract command ---

fn run_extract(settings: Option<PathBuf>, args: ExtractArgs) -> Result<(), CtxError> {
    let store = open_store(settings)?;
    let mut config = store.load()?.extraction_config();

    if let Some(types) = &args.types {
        config.file_types = types.parse()?;
    }
    if let Some(level) = args.compression {
        config.compression_level = level.into();
    }
    if let Some(max) = args.max_file_bytes {
        config.max_file_bytes = max;
    }
    if let Some(max) = args.max_total_bytes {
        config.max_total_bytes = max;
    }
    if let Some(jobs) = args.jobs {
        config.max_concurrency = jobs;
    }
    config.respect_gitignore = args.gitignore;
    config.token_estimator = args.encoding.into();

    let mode = if args.tree_only {
        ExtractMode::TreeOnly
    } else {
        ExtractMode::Full
    };
    let result = extract(&args.paths, &config, mode, &CancellationToken::new())?;

    if args.clip {
        copy_to_clipboard(&result, &SystemClipboard)?;
        eprintln!(
            "Copied {} chars (~{} tokens) to clipboard",
            format_number(result.char_count),
            format_number(result.token_count)
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !args.clip {
        print!("{}", result.combined());
    }

    if args.stats {
        print_stats(&result);
    }

    Ok(())
}

fn print_stats(result: &ExtractionResult) {
    let bytes: u64 = result.files.iter().map(|f| f.bytes).sum();
    let lines: usize = result.files.iter().map(|f| f.lines).sum();
    eprintln!("Files: {}", format_number(result.files.len()));
    eprintln!("Lines: {}", format_number(lines));
    eprintln!("Bytes: {}", format_number(bytes as usize));
    eprintln!("Chars: {}", format_number(result.char_count));
    eprintln!("Tokens: ~{}", format_number(result.token_count));
    if result.truncation.total_bytes {
        eprintln!("Truncated: total byte budget reached");
    }
    if result.truncation.file_bytes {
        eprintln!("Truncated: one or more files cut at the per-file limit");
    }
    if !result.warnings.is_empty() {
        eprintln!("Warnings: {}", result.warnings.len());
    }
}

// --- Count command ---

fn run_count(
    file: Option<PathBuf>,
    json: bool,
    estimator: TokenEstimator,
) -> Result<(), CtxError> {
    let text = match file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let counts = count_with(&text, estimator);
    if json {
        println!("{}", serde_json::to_string(&counts)?);
    } else {
        println!("chars: {}", counts.chars);
        println!("tokens: {}", counts.tokens);
    }
    Ok(())
}

// --- Types command ---

fn run_types(settings: Option<PathBuf>, action: TypesAction) -> Result<(), CtxError> {
    let mut store = open_store(settings)?;

    match action {
        TypesAction::List { json } => {
            let types = store.file_types()?;
            if json {
                println!("{}", serde_json::to_string(&types)?);
            } else {
                print_types(&types);
            }
        }
        TypesAction::Add { suffixes } => {
            let mut types = store.file_types()?;
            for suffix in &suffixes {
                types.insert(suffix)?;
            }
            store.set_file_types(types.clone())?;
            print_types(&types);
        }
        TypesAction::Remove { suffixes } => {
            let mut types = store.file_types()?;
            for suffix in &suffixes {
                types.remove(suffix);
            }
            store.set_file_types(types.clone())?;
            print_types(&types);
        }
        TypesAction::Detect { path, save } => {
            let detected = detect_file_types(&path);
            if save {
                store.set_file_types(detected.clone())?;
            }
            print_types(&detected);
        }
    }

    Ok(())
}

fn print_types(types: &FileTypeSet) {
    for suffix in types.iter() {
        println!("{}", suffix);
    }
}

// --- Compression command ---

fn run_compression(settings: Option<PathBuf>, level: Option<CompressionArg>) -> Result<(), CtxError> {
    let mut store = open_store(settings)?;
    if let Some(level) = level {
        store.set_compression_level(level.into())?;
    }
    println!("{}", store.compression_level()?);
    Ok(())
}
