//! TOML configuration.
//!
//! Every section and key has a default, so an empty file (or no file at
//! all, via [`load_config_or_default`]) yields a working [`Config`].
//! API keys are never read from the file; see [`ANSWER_KEY_ENV_OPENAI`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./quack.toml";
/// Environment variable holding the OpenAI API key.
pub const ANSWER_KEY_ENV_OPENAI: &str = "QUACKSTACK_OPENAI_KEY";
/// Environment variable holding the Anthropic API key.
pub const ANSWER_KEY_ENV_ANTHROPIC: &str = "QUACKSTACK_ANTHROPIC_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub project: ProjectConfig,
    pub scan: ScanConfig,
    pub segment: SegmentConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub answer: AnswerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./.quackstack/index.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project key in the store. Defaults to the basename of `root`.
    pub name: Option<String>,
    pub root: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            root: PathBuf::from("."),
        }
    }
}

impl ProjectConfig {
    /// The configured name, else the basename of the canonical root.
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        project_name_for(&self.root)
    }
}

/// Basename of `root` after canonicalization, or `"default"`.
pub fn project_name_for(root: &Path) -> String {
    let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    canonical
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "default".to_string())
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    /// Extensions including the leading dot.
    pub extensions: Vec<String>,
    /// Directory names skipped at any depth.
    pub ignore_dirs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: [
                ".js", ".ts", ".jsx", ".tsx", ".py", ".java", ".cpp", ".c", ".go", ".rs", ".rb",
                ".php", ".cs", ".swift", ".kt", ".scala",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignore_dirs: [
                "node_modules",
                ".git",
                "dist",
                "build",
                "target",
                "__pycache__",
                ".next",
                ".nuxt",
                "coverage",
                ".cache",
                "vendor",
                "tmp",
                "temp",
                ".vscode",
                ".idea",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SegmentConfig {
    pub window_lines: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            window_lines: quackstack_core::segment::DEFAULT_WINDOW_LINES,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
    /// Enrich fragments with git history.
    pub history: bool,
    /// Max commits read per file.
    pub history_depth: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            history: true,
            history_depth: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub limit: usize,
    pub recent_days: u32,
    pub boost_recent: bool,
    pub boost_frequent: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: quackstack_core::search::DEFAULT_LIMIT,
            recent_days: quackstack_core::search::DEFAULT_RECENT_DAYS,
            boost_recent: false,
            boost_frequent: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnswerConfig {
    /// `auto`, `openai`, or `anthropic`.
    pub provider: String,
    pub openai_model: String,
    pub anthropic_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            anthropic_model: "claude-3-5-sonnet-20241022".to_string(),
            temperature: 0.3,
            max_tokens: 2048,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

/// Parse and validate a config from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields [`Config::default`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<()> {
    if config.segment.window_lines == 0 {
        anyhow::bail!("segment.window_lines must be > 0");
    }

    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size must be > 0");
    }

    if config.retrieval.limit < 1 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }
    if config.retrieval.recent_days < 1 {
        anyhow::bail!("retrieval.recent_days must be >= 1");
    }

    match config.answer.provider.as_str() {
        "auto" | "openai" | "anthropic" => {}
        other => anyhow::bail!(
            "Unknown answer provider: '{}'. Must be auto, openai, or anthropic.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.answer.temperature) {
        anyhow::bail!("answer.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
