//! Configuration for the sorter: settings, category table and file filters.
//!
//! Configuration is read from a TOML file. Every section is optional; a
//! missing section falls back to the built-in defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [sorter]
//! root = "/home/me/Downloads"
//! settle_delay_secs = 10
//! default_category = "Misc"
//! log_dir = "Logs"
//! log_file = "auto_sorter.log"
//!
//! [categories]
//! Images = ["png", "jpg", "jpeg", "gif"]
//! Docs = ["pdf", "docx", "txt", "xlsx"]
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["desktop.ini", "Thumbs.db"]
//! extensions = ["part", "crdownload", "tmp"]
//! patterns = []
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use crate::file_category::{CategoryMap, DEFAULT_CATEGORY};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".autosortrc.toml";

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or name?.ext")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// One extension listed under two categories.
    #[error("Extension '{extension}' is mapped to both '{first}' and '{second}'")]
    DuplicateExtension {
        extension: String,
        first: String,
        second: String,
    },
    /// A setting has a value that cannot be used.
    #[error("Invalid value for {field}: {reason}")]
    InvalidSetting { field: String, reason: String },
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sorter: SorterSettings,

    /// `category -> extensions`. Replaces the built-in table when present.
    #[serde(default)]
    pub categories: Option<BTreeMap<String, Vec<String>>>,

    #[serde(default)]
    pub filters: FilterRules,
}

/// General sorter settings from the `[sorter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SorterSettings {
    /// Directory to sort when none is given on the command line.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Seconds to wait after a file appears before moving it.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,

    /// Category for extensions that are not mapped.
    #[serde(default = "default_category")]
    pub default_category: String,

    /// Log directory, relative to the root.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_settle_delay_secs() -> u64 {
    10
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_log_dir() -> String {
    "Logs".to_string()
}

fn default_log_file() -> String {
    "auto_sorter.log".to_string()
}

impl Default for SorterSettings {
    fn default() -> Self {
        Self {
            root: None,
            settle_delay_secs: default_settle_delay_secs(),
            default_category: default_category(),
            log_dir: default_log_dir(),
            log_file: default_log_file(),
        }
    }
}

impl SorterSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

/// File filter rules from the `[filters]` section.
///
/// Nothing is filtered out unless configured. To leave hidden files and
/// in-progress downloads alone:
///
/// ```toml
/// [filters]
/// enable_hidden_files = false
///
/// [filters.exclude]
/// filenames = ["desktop.ini", "Thumbs.db"]
/// extensions = ["part", "partial", "crdownload", "download", "tmp"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to sort hidden files (starting with "."). Defaults to true.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_enable_hidden_files() -> bool {
    true
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from sorting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., "desktop.ini", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the file name (e.g., "~$*").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions to exclude (e.g., "part", "crdownload").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if provided
    /// 2. `.autosortrc.toml` in the current directory
    /// 3. `~/.config/autosort/config.toml`
    /// 4. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is found but cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("autosort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Builds the extension map: the `[categories]` table if present, else the
    /// built-in one, with the configured default category.
    pub fn category_map(&self) -> Result<CategoryMap, ConfigError> {
        match &self.categories {
            Some(table) => CategoryMap::from_table(table, &self.sorter.default_category),
            None => {
                // from_table validates the default category name
                CategoryMap::from_table(&BTreeMap::new(), &self.sorter.default_category)?;
                Ok(CategoryMap::default().with_default_category(&self.sorter.default_category))
            }
        }
    }

    /// Compiles the `[filters]` section.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        self.filters.clone().compile()
    }
}

impl FilterRules {
    /// Compile rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

/// Pre-compiled filter rules.
///
/// Matching is done on the file name only, since sorting never descends into
/// subdirectories.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.into_iter().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Filters that accept every file, hidden ones included.
    pub fn allow_all() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }

    /// Check if a file should be sorted.
    ///
    /// Checks, in order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter
    /// 3. Exact filename match
    /// 4. File extension match
    /// 5. Glob pattern match
    /// 6. Regex pattern match
    /// 7. Default: include
    pub fn should_include(&self, file_name: &str) -> bool {
        let name_path = Path::new(file_name);

        if self.include_patterns.iter().any(|p| p.matches(file_name)) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name) {
            return false;
        }

        if let Some(ext) = name_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.exclude_patterns.iter().any(|p| p.matches(file_name)) {
            return false;
        }

        if self.exclude_regexes.iter().any(|r| r.is_match(file_name)) {
            return false;
        }

        true
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self::allow_all()
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}
