//! Configuration for comparison runs.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags
//! 2. Config file (.tagcompare/config.yaml, or --config / TAGCOMPARE_CONFIG)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .tagcompare/config.yaml
//! - Paths in config file are relative to the directory holding .tagcompare/

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::comparison::{ComparisonOptions, DEFAULT_PROGRESS_INTERVAL, DEFAULT_TRIM_RATIO};
use crate::core::{SelectionPolicy, TypeFilter, DEFAULT_TOP_N};
use crate::domain::OffsetUnit;

pub const CONFIG_DIR: &str = ".tagcompare";
pub const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_RESULTS_PATH: &str = "comparison-results.txt";
pub const DEFAULT_DOCUMENTS_PATH: &str = "comparison-docs.tsv";
pub const DEFAULT_TAGS_PATH: &str = "comparison-tags.tsv";

/// Fatal configuration problems, reported before any input is read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("number of names ({names}) != number of tag inputs ({inputs})")]
    NameCountMismatch { names: usize, inputs: usize },

    #[error("duplicate source name: {0}")]
    DuplicateName(String),

    #[error("at least two tag inputs are needed for a comparison, got {0}")]
    TooFewSources(usize),

    #[error("type filter lists no types")]
    EmptyTypeFilter,

    #[error("sample probability must be within [0, 1], got {0}")]
    InvalidSampleProbability(f64),

    #[error("trim ratio must be positive")]
    InvalidTrimRatio,

    #[error("checkpoint interval must be positive")]
    ZeroCheckpointInterval,

    #[error("selection thresholds are inconsistent: min_f1 {min_f1} > max_f1 {max_f1}")]
    InvalidSelection { min_f1: f64, max_f1: f64 },
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Display names of the tag inputs, in order
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub selection: Option<SelectionPolicy>,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingConfig {
    pub overlap: Option<bool>,
    pub char_offsets: Option<bool>,
    /// Allowed span types (case-insensitive)
    pub types: Option<Vec<String>>,
    /// Raw type field to display name, e.g. "-2": Organism
    #[serde(default)]
    pub type_names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SamplingConfig {
    pub seed: Option<u64>,
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckpointConfig {
    pub interval: Option<u64>,
    pub trim_ratio: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsConfig {
    pub max_documents: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    pub top_n: Option<usize>,
    /// JSON summary path (relative to config file)
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputsConfig {
    pub results: Option<String>,
    pub documents: Option<String>,
    pub tags: Option<String>,
    /// Write the document/tag export (default: true)
    pub export: Option<bool>,
}

/// Values given on the command line; `None` / `false` means "not given"
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub overlap: bool,
    pub char_offsets: bool,
    pub seed: Option<u64>,
    pub checkpoint_interval: Option<u64>,
    pub trim_ratio: Option<u64>,
    pub sample: Option<f64>,
    pub max_documents: Option<u64>,
    /// Comma-separated type allow-list
    pub types: Option<String>,
    /// Comma-separated source names
    pub names: Option<String>,
    pub output: Option<PathBuf>,
    pub doc_output: Option<PathBuf>,
    pub tag_output: Option<PathBuf>,
    pub no_export: bool,
    pub summary: Option<PathBuf>,
    pub top_n: Option<usize>,
}

/// Fully resolved and validated settings
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub overlap: bool,
    pub offset_unit: OffsetUnit,
    pub seed: Option<u64>,
    pub checkpoint_interval: Option<u64>,
    pub trim_ratio: u64,
    pub sample: Option<f64>,
    pub max_documents: Option<u64>,
    pub types: Option<Vec<String>>,
    pub type_names: BTreeMap<String, String>,
    pub names: Option<Vec<String>>,
    pub selection: SelectionPolicy,
    pub top_n: usize,
    pub output: PathBuf,
    pub export: bool,
    pub doc_output: PathBuf,
    pub tag_output: PathBuf,
    pub summary: Option<PathBuf>,
    /// Path to config file (if one was used)
    pub config_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overlap: false,
            offset_unit: OffsetUnit::Byte,
            seed: None,
            checkpoint_interval: None,
            trim_ratio: DEFAULT_TRIM_RATIO,
            sample: None,
            max_documents: None,
            types: None,
            type_names: BTreeMap::new(),
            names: None,
            selection: SelectionPolicy::default(),
            top_n: DEFAULT_TOP_N,
            output: PathBuf::from(DEFAULT_RESULTS_PATH),
            export: true,
            doc_output: PathBuf::from(DEFAULT_DOCUMENTS_PATH),
            tag_output: PathBuf::from(DEFAULT_TAGS_PATH),
            summary: None,
            config_file: None,
        }
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Settings {
    /// Layer `overrides` over `file` over the defaults, then validate
    pub fn resolve(
        file: Option<(&ConfigFile, &Path)>,
        overrides: &Overrides,
    ) -> Result<Settings, ConfigError> {
        let mut settings = Settings::default();

        if let Some((config, config_path)) = file {
            // Base directory is the parent of .tagcompare/
            let base_dir = config_path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(Path::new("."));

            let m = &config.matching;
            settings.overlap = m.overlap.unwrap_or(settings.overlap);
            if m.char_offsets == Some(true) {
                settings.offset_unit = OffsetUnit::Char;
            }
            settings.types = m.types.clone();
            settings.type_names = m.type_names.clone();

            settings.seed = config.sampling.seed;
            settings.sample = config.sampling.probability;
            settings.checkpoint_interval = config.checkpoint.interval;
            settings.trim_ratio = config.checkpoint.trim_ratio.unwrap_or(settings.trim_ratio);
            settings.max_documents = config.limits.max_documents;
            settings.names = config.names.clone();
            if let Some(selection) = &config.selection {
                settings.selection = selection.clone();
            }

            settings.top_n = config.report.top_n.unwrap_or(settings.top_n);
            settings.summary = config.report.summary.as_deref().map(|p| resolve_path(base_dir, p));

            let outputs = &config.outputs;
            if let Some(path) = &outputs.results {
                settings.output = resolve_path(base_dir, path);
            }
            if let Some(path) = &outputs.documents {
                settings.doc_output = resolve_path(base_dir, path);
            }
            if let Some(path) = &outputs.tags {
                settings.tag_output = resolve_path(base_dir, path);
            }
            settings.export = outputs.export.unwrap_or(settings.export);
            settings.config_file = Some(config_path.to_path_buf());
        }

        if overrides.overlap {
            settings.overlap = true;
        }
        if overrides.char_offsets {
            settings.offset_unit = OffsetUnit::Char;
        }
        if overrides.no_export {
            settings.export = false;
        }
        if let Some(types) = &overrides.types {
            settings.types = Some(split_list(types));
        }
        if let Some(names) = &overrides.names {
            settings.names = Some(split_list(names));
        }
        settings.seed = overrides.seed.or(settings.seed);
        settings.sample = overrides.sample.or(settings.sample);
        settings.checkpoint_interval = overrides.checkpoint_interval.or(settings.checkpoint_interval);
        settings.trim_ratio = overrides.trim_ratio.unwrap_or(settings.trim_ratio);
        // zero means no limit
        settings.max_documents = overrides
            .max_documents
            .or(settings.max_documents)
            .filter(|&max| max > 0);
        settings.top_n = overrides.top_n.unwrap_or(settings.top_n);
        settings.summary = overrides.summary.clone().or(settings.summary);
        if let Some(path) = &overrides.output {
            settings.output = path.clone();
        }
        if let Some(path) = &overrides.doc_output {
            settings.doc_output = path.clone();
        }
        if let Some(path) = &overrides.tag_output {
            settings.tag_output = path.clone();
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(p) = self.sample {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::InvalidSampleProbability(p));
            }
        }
        if self.trim_ratio == 0 {
            return Err(ConfigError::InvalidTrimRatio);
        }
        if self.checkpoint_interval == Some(0) {
            return Err(ConfigError::ZeroCheckpointInterval);
        }
        if matches!(&self.types, Some(types) if types.is_empty()) {
            return Err(ConfigError::EmptyTypeFilter);
        }
        if self.selection.min_f1 > self.selection.max_f1 {
            return Err(ConfigError::InvalidSelection {
                min_f1: self.selection.min_f1,
                max_f1: self.selection.max_f1,
            });
        }
        Ok(())
    }

    /// Display names for the tag inputs: configured names, else the paths
    pub fn source_names(&self, tag_paths: &[PathBuf]) -> Result<Vec<String>, ConfigError> {
        if tag_paths.len() < 2 {
            return Err(ConfigError::TooFewSources(tag_paths.len()));
        }

        let names = match &self.names {
            Some(names) => {
                if names.len() != tag_paths.len() {
                    return Err(ConfigError::NameCountMismatch {
                        names: names.len(),
                        inputs: tag_paths.len(),
                    });
                }
                names.clone()
            }
            None => tag_paths.iter().map(|p| p.display().to_string()).collect(),
        };

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateName(name.clone()));
            }
        }
        Ok(names)
    }

    pub fn type_filter(&self) -> TypeFilter {
        match &self.types {
            Some(types) => TypeFilter::new(types),
            None => TypeFilter::allow_all(),
        }
    }

    pub fn comparison_options(&self) -> ComparisonOptions {
        ComparisonOptions {
            overlap: self.overlap,
            offset_unit: self.offset_unit,
            types: self.type_filter(),
            checkpoint_interval: self.checkpoint_interval,
            trim_ratio: self.trim_ratio,
            max_documents: self.max_documents,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            selection: self.selection.clone(),
        }
    }
}

/// Find config file by searching the current directory and parents
pub fn find_config_file() -> Option<PathBuf> {
    find_config_file_from(&std::env::current_dir().ok()?)
}

/// Find config file by searching `start` and its parents
pub fn find_config_file_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Load the config file (explicit or discovered) and layer `overrides` on it
pub fn load_settings(explicit: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let settings = match &config_path {
        Some(path) => {
            let config = load_config_file(path)?;
            Settings::resolve(Some((&config, path.as_path())), overrides)?
        }
        None => Settings::resolve(None, overrides)?,
    };

    Ok(settings)
}
