//! Configuration for page adaptation.
//!
//! YAML file settings plus the binary's CLI arguments and environment variables.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{AdaptationOptions, AdhdSummaryLength, ConfigError, DyslexiaLevel, GradeLevel};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EduAdaptConfig {
    /// Block extraction thresholds
    pub extraction: ExtractionConfig,
    /// Per-profile scheduling
    pub scheduler: SchedulerConfig,
    /// General settings
    pub general: GeneralConfig,
}

impl EduAdaptConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&yaml)?)
    }
}

/// Block extraction thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum trimmed text length (chars)
    pub min_text_length: usize,
    /// Minimum word count
    pub min_word_count: usize,
    /// Minimum rendered width (layout units), checked when measurable
    pub min_element_width: f64,
    /// Inner text a main-content candidate must exceed (chars)
    pub main_content_min_text: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_length: 60,
            min_word_count: 10,
            min_element_width: 360.0,
            main_content_min_text: 100,
        }
    }
}

/// Per-profile scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Generic profile
    pub default: SequentialConfig,
    /// ADHD profile
    pub adhd: StagedConfig,
    /// Autism profile
    pub autism: StagedConfig,
    /// Dyslexia profile
    pub dyslexia: DyslexiaConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default: SequentialConfig::default(),
            adhd: StagedConfig::adhd(),
            autism: StagedConfig::autism(),
            dyslexia: DyslexiaConfig::default(),
        }
    }
}

/// Sequential batch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequentialConfig {
    /// Blocks adapted per run
    pub max_blocks: usize,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self { max_blocks: 10 }
    }
}

/// Staged "first batch, then worker pool" configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagedConfig {
    /// Blocks considered per run
    pub max_candidates: usize,
    /// Blocks adapted sequentially before the pool starts
    pub first_batch: usize,
    /// Worker pool size for the remainder
    pub pool_size: usize,
    /// Prioritize blocks within this multiple of the viewport height.
    /// `None` keeps document order.
    pub viewport_priority: Option<f64>,
    /// Quick summary panel. `None` disables it.
    pub quick_summary: Option<QuickSummaryConfig>,
}

impl StagedConfig {
    pub fn adhd() -> Self {
        Self {
            max_candidates: 8,
            first_batch: 3,
            pool_size: 3,
            viewport_priority: Some(1.2),
            quick_summary: Some(QuickSummaryConfig::default()),
        }
    }

    pub fn autism() -> Self {
        Self {
            max_candidates: 8,
            first_batch: 2,
            pool_size: 2,
            viewport_priority: None,
            quick_summary: None,
        }
    }
}

impl Default for StagedConfig {
    fn default() -> Self {
        Self::adhd()
    }
}

/// Quick summary request configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickSummaryConfig {
    /// Leading blocks combined into the request
    pub blocks: usize,
    /// Maximum combined text length (chars)
    pub max_chars: usize,
}

impl Default for QuickSummaryConfig {
    fn default() -> Self {
        Self {
            blocks: 2,
            max_chars: 1200,
        }
    }
}

/// On-demand supported reading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DyslexiaConfig {
    /// Maximum chunk size (chars)
    pub chunk_size: usize,
    /// Leading jobs eligible for automatic prefetch
    pub prefetch_limit: usize,
    /// Longest text that is prefetched automatically (chars)
    pub prefetch_max_chars: usize,
    /// Simultaneous prefetch adaptations
    pub max_concurrent: usize,
    /// Queue capacity
    pub max_queue_items: usize,
}

impl Default for DyslexiaConfig {
    fn default() -> Self {
        Self {
            chunk_size: 900,
            prefetch_limit: 8,
            prefetch_max_chars: 1200,
            max_concurrent: 2,
            max_queue_items: 8,
        }
    }
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Delay before auto-adapting after load (ms)
    pub settle_delay_ms: u64,
    /// Log level
    pub log_level: String,
}

impl GeneralConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

/// EduAdapt - adapt a page for a learning profile
#[derive(Parser, Debug, Clone)]
#[command(name = "eduadapt")]
#[command(about = "Adapt a document's main content for dyslexia, ADHD and autism profiles")]
pub struct Args {
    /// Document to adapt (JSON element tree)
    #[arg(long)]
    pub document: PathBuf,

    /// Learning profile (dyslexia, adhd, autism, default)
    #[arg(long, env = "PROFILE")]
    pub profile: Option<String>,

    /// Dyslexia simplification level (low, medium, high)
    #[arg(long, default_value = "medium")]
    pub dyslexia_level: DyslexiaLevel,

    /// ADHD summary length (short, long)
    #[arg(long, default_value = "short")]
    pub adhd_summary_length: AdhdSummaryLength,

    /// Reader grade band (lower, middle, upper)
    #[arg(long, default_value = "middle")]
    pub grade_level: GradeLevel,

    /// YAML configuration file
    #[arg(long, env = "EDUADAPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Persisted settings file; auto-adapts from it instead of --profile
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// OpenAI-compatible endpoint (Ollama by default)
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:11434/v1")]
    pub backend_url: String,

    /// Model name
    #[arg(long, env = "MODEL", default_value = "llama3.2")]
    pub model: String,

    /// API key for the endpoint, if it needs one
    #[arg(long, env = "API_KEY")]
    pub api_key: Option<String>,

    /// Dyslexia: request every support section once prefetch finishes
    #[arg(long, default_value = "false")]
    pub reveal_all: bool,

    /// Where to write the adapted document HTML
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Args {
    /// Options for a run started from the command line.
    pub fn options(&self) -> AdaptationOptions {
        AdaptationOptions::default()
            .with_dyslexia_level(self.dyslexia_level)
            .with_summary_length(self.adhd_summary_length)
            .with_grade_level(self.grade_level)
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.profile.is_none() && self.settings.is_none() {
            return Err("Either --profile or --settings is required".to_string());
        }
        if self.backend_url.trim().is_empty() {
            return Err("BACKEND_URL must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EduAdaptConfig::default();
        assert_eq!(config.extraction.min_text_length, 60);
        assert_eq!(config.scheduler.default.max_blocks, 10);
        assert_eq!(config.scheduler.adhd.first_batch, 3);
        assert_eq!(config.scheduler.autism.pool_size, 2);
        assert!(config.scheduler.autism.quick_summary.is_none());
        assert_eq!(config.scheduler.dyslexia.chunk_size, 900);
        assert_eq!(config.general.settle_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = EduAdaptConfig::from_yaml(
            "extraction:\n  min_word_count: 5\nscheduler:\n  dyslexia:\n    max_concurrent: 1\n",
        )
        .unwrap();
        assert_eq!(config.extraction.min_word_count, 5);
        assert_eq!(config.extraction.min_text_length, 60);
        assert_eq!(config.scheduler.dyslexia.max_concurrent, 1);
        assert_eq!(config.scheduler.dyslexia.max_queue_items, 8);
        assert_eq!(config.scheduler.adhd.viewport_priority, Some(1.2));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = EduAdaptConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = EduAdaptConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.scheduler.autism.max_candidates, 8);
        assert_eq!(parsed.general.log_level, "info");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eduadapt.yaml");
        std::fs::write(&path, "general:\n  settle_delay_ms: 250\n").unwrap();

        let config = EduAdaptConfig::from_file(&path).unwrap();
        assert_eq!(config.general.settle_delay_ms, 250);
        assert!(EduAdaptConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_args_parse_and_validate() {
        let args = Args::try_parse_from([
            "eduadapt",
            "--document",
            "page.json",
            "--profile",
            "adhd",
            "--grade-level",
            "lower",
        ])
        .unwrap();
        assert_eq!(args.options().grade_level, GradeLevel::Lower);
        assert_eq!(args.options().dyslexia_level, DyslexiaLevel::Medium);
        assert!(args.validate().is_ok());

        let bare = Args::try_parse_from(["eduadapt", "--document", "page.json"]).unwrap();
        if std::env::var_os("PROFILE").is_none() {
            assert!(bare.validate().is_err());
        }
        assert!(Args::try_parse_from(["eduadapt", "--document", "p.json", "--grade-level", "tenth"]).is_err());
    }
}
