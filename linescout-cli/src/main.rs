use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use linescout::{
    search, ContentIndex, EncodingMode, IndexOptions, Match, SearchOptions, SearchOutput,
};
use std::{
    num::NonZeroUsize,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, applied over the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overrides the configured level; RUST_LOG wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Clone)]
struct SearchArgs {
    /// Text or regular expression to search for
    pattern: String,

    /// Directories or files to search (default: configured roots, else ".")
    roots: Vec<PathBuf>,

    /// Treat the pattern as a regular expression
    #[arg(short = 'r', long = "regex")]
    is_regex: bool,

    /// Match without regard to case
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Lines of context to show around each match
    #[arg(short = 'C', long)]
    context: Option<usize>,

    /// Stop after roughly this many matches
    #[arg(short = 'm', long)]
    max_results: Option<usize>,

    /// Deepest directory level below a root to search
    #[arg(long)]
    max_depth: Option<usize>,

    /// Only search files whose name matches this glob (repeatable)
    #[arg(short = 'g', long = "glob")]
    globs: Vec<String>,

    /// Number of scanning workers
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Load the roots into memory first and search the content index
    #[arg(long)]
    index: bool,

    /// Skip files excluded by .gitignore/.ignore and hidden files
    #[arg(long)]
    respect_ignore: bool,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Show only statistics, not matches
    #[arg(short, long)]
    stats: bool,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a pattern in files
    Search(Box<SearchArgs>),

    /// Print the effective configuration as YAML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut options = SearchOptions::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_logging(&options, cli.verbose);

    match cli.command {
        Commands::Search(args) => {
            apply_args(&mut options, *args.clone())?;
            run_search(options, &args, cli.verbose)
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&options)?);
            Ok(())
        }
    }
}

fn init_logging(options: &SearchOptions, verbose: bool) {
    let level = if verbose { "debug" } else { options.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line flags override whatever the configuration files set
fn apply_args(options: &mut SearchOptions, args: SearchArgs) -> Result<()> {
    options.pattern = args.pattern;
    if !args.roots.is_empty() {
        options.roots = args.roots;
    }
    options.is_regex |= args.is_regex;
    if args.ignore_case {
        options.case_sensitive = false;
    }
    if let Some(context) = args.context {
        options.context_lines = context;
    }
    if let Some(max_results) = args.max_results {
        options.max_results = max_results;
    }
    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }
    if !args.globs.is_empty() {
        options.include_patterns = args.globs;
    }
    if let Some(threads) = args.threads {
        options.worker_count = threads;
    }
    options.respect_ignore_files |= args.respect_ignore;
    if let Some(encoding) = args.encoding {
        options.encoding_mode = match encoding.to_lowercase().as_str() {
            "failfast" | "fail_fast" => EncodingMode::FailFast,
            "lossy" => EncodingMode::Lossy,
            other => anyhow::bail!("Unknown encoding mode '{}' (expected failfast or lossy)", other),
        };
    }
    Ok(())
}

fn run_search(mut options: SearchOptions, args: &SearchArgs, verbose: bool) -> Result<()> {
    let start = Instant::now();

    if args.index {
        let index = build_index(&options)?;
        options = options.with_index(index);
    }

    let output = search(&options)?;
    let elapsed = start.elapsed();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_search_results(&output, args.stats, verbose, elapsed);
    }
    Ok(())
}

/// Builds the content index on a background thread while a spinner runs
fn build_index(options: &SearchOptions) -> Result<Arc<ContentIndex>> {
    let index = Arc::new(ContentIndex::new());
    let handle = index
        .spawn_rebuild(IndexOptions::from(options))
        .context("Failed to start indexer thread")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message("Indexing files");
    while !index.wait_timeout(Duration::from_millis(100)) {
        spinner.tick();
    }
    spinner.finish_and_clear();

    let stats = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Indexer thread panicked"))??;
    eprintln!(
        "Indexed {} files ({} bytes) in {}",
        stats.files_indexed,
        stats.bytes_indexed,
        humantime::format_duration(round_to_millis(stats.elapsed))
    );
    for error in &stats.errors {
        tracing::debug!("Not indexed: {}", error);
    }
    Ok(index)
}

fn round_to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

fn print_search_results(output: &SearchOutput, stats_only: bool, verbose: bool, elapsed: Duration) {
    if !stats_only {
        for file_result in output.file_results() {
            println!("\n{}", file_result.path.display().to_string().blue());
            for m in &file_result.matches {
                print_match(m);
            }
        }
        println!();
    }

    println!(
        "Found {} matches in {} files ({})",
        output.total_matches(),
        output.files_with_matches(),
        humantime::format_duration(round_to_millis(elapsed))
    );
    if output.cap_reached {
        println!("{}", "Result limit reached; output is truncated".yellow());
    }
    if stats_only {
        println!(
            "Searched {} files{}",
            output.files_searched,
            if output.used_index { " from the index" } else { "" }
        );
    }
    if output.is_partial() {
        eprintln!(
            "{}",
            format!("Skipped {} files or directories", output.skipped_files()).yellow()
        );
        if verbose {
            for error in &output.errors {
                eprintln!("  {}", error);
            }
        }
    }
}

fn print_match(m: &Match) {
    for line in m.context_before() {
        println!("{}- {}", line.line_number.to_string().green(), line.text);
    }

    let line = match &m.span {
        Some(span) => format!(
            "{}{}{}",
            &m.line_content[..span.start],
            m.line_content[span.clone()].red().bold(),
            &m.line_content[span.end..]
        ),
        None => m.line_content.clone(),
    };
    println!("{}: {}", m.line_number.to_string().green(), line);

    for line in m.context_after() {
        println!("{}- {}", line.line_number.to_string().green(), line.text);
    }
}
