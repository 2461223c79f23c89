use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::index::ContentIndex;

pub const DEFAULT_MAX_RESULTS: usize = 1000;
pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_WORKER_COUNT: usize = 8;

/// Options for a single search call.
///
/// # Configuration Locations
///
/// Defaults can be loaded from several locations, later ones overriding
/// earlier ones:
/// 1. Global `$CONFIG_DIR/linescout/config.yaml`
/// 2. Local `.linescout.yaml` in the current directory
/// 3. A file passed explicitly (the CLI's `--config` flag)
///
/// # Configuration Format
///
/// ```yaml
/// # Treat the pattern as a regular expression
/// is_regex: false
///
/// # Case sensitive matching
/// case_sensitive: true
///
/// # Directories to search
/// roots: ["src", "tests"]
///
/// # Base-name globs a file must match to be searched
/// include_patterns: ["*.rs", "*.toml"]
///
/// # Result cap, traversal depth and context window
/// max_results: 1000
/// max_depth: 10
/// context_lines: 2
///
/// # Parallel scanning workers
/// worker_count: 8
///
/// # How to handle invalid UTF-8 (fail_fast | lossy)
/// encoding_mode: fail_fast
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
///
/// Library callers usually build options in code instead:
/// ```rust,ignore
/// let options = SearchOptions::new("TODO", ["src"]).ignore_case().context(2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Literal text or regular expression to look for
    pub pattern: String,

    /// Interpret `pattern` as a regular expression
    pub is_regex: bool,

    /// Match case exactly; when false both literal and regex modes fold case
    pub case_sensitive: bool,

    /// Directories (or single files) to search, in order
    pub roots: Vec<PathBuf>,

    /// Glob patterns matched against a file's base name, e.g. "*.rs".
    /// Empty means every file is a candidate.
    pub include_patterns: Vec<String>,

    /// Soft cap on the number of returned matches
    pub max_results: usize,

    /// Deepest directory level below a root whose files are searched
    pub max_depth: usize,

    /// Lines of context collected on each side of a match
    pub context_lines: usize,

    /// Number of parallel scanning workers
    pub worker_count: NonZeroUsize,

    /// How to handle invalid UTF-8 in scanned files
    pub encoding_mode: EncodingMode,

    /// Honor .gitignore, .ignore and hidden-file rules while walking
    pub respect_ignore_files: bool,

    /// Search the in-memory content index instead of the filesystem
    pub use_index: bool,

    /// Index consulted when `use_index` is set
    #[serde(skip)]
    pub index: Option<Arc<ContentIndex>>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// How invalid UTF-8 sequences are handled while reading files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMode {
    /// Skip the file and record an encoding error
    #[default]
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep going
    Lossy,
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_WORKER_COUNT).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            is_regex: false,
            case_sensitive: true,
            roots: vec![PathBuf::from(".")],
            include_patterns: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            max_depth: DEFAULT_MAX_DEPTH,
            context_lines: 0,
            worker_count: default_worker_count(),
            encoding_mode: EncodingMode::default(),
            respect_ignore_files: false,
            use_index: false,
            index: None,
            log_level: default_log_level(),
        }
    }
}

impl SearchOptions {
    /// Creates options for a literal, case-sensitive search of `roots`
    pub fn new<I, P>(pattern: impl Into<String>, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            pattern: pattern.into(),
            roots: roots.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn regex(mut self) -> Self {
        self.is_regex = true;
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn context(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn limit(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn include(mut self, glob: impl Into<String>) -> Self {
        self.include_patterns.push(glob.into());
        self
    }

    pub fn workers(mut self, count: NonZeroUsize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn encoding(mut self, mode: EncodingMode) -> Self {
        self.encoding_mode = mode;
        self
    }

    /// Routes the search through `index` instead of the filesystem
    pub fn with_index(mut self, index: Arc<ContentIndex>) -> Self {
        self.index = Some(index);
        self.use_index = true;
        self
    }

    /// Applies defaults to values that would make a search meaningless:
    /// a zero result cap and an empty root list.
    pub fn normalized(mut self) -> Self {
        if self.max_results == 0 {
            self.max_results = DEFAULT_MAX_RESULTS;
        }
        if self.roots.is_empty() {
            self.roots.push(PathBuf::from("."));
        }
        self
    }

    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an optional
    /// explicit file, which takes precedence. An explicit file that does not
    /// exist is an error.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("linescout/config.yaml")),
            Some(PathBuf::from(".linescout.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }
}
