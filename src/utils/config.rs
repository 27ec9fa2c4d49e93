use crate::errors::ArgusResult;
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

static DEFAULT_CONFIG_TOML: &str = include_str!("../../default-argus.conf");

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Number of analysis workers.
    pub workers: usize,

    /// Per-file wall-clock ceiling for data-flow construction, in seconds.
    /// `None` disables the cap.
    pub file_timeout_secs: Option<u64>,

    /// Stored graphs over this size are skipped by feature extraction.
    pub max_pdg_size_mb: u64,
}
impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            file_timeout_secs: Some(60),
            max_pdg_size_mb: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ParserConfig {
    /// The JavaScript runtime the external parser runs on.
    pub node_binary: String,

    /// Directory holding the `ast.js` / `tokens.js` helpers.
    pub scripts_dir: PathBuf,
}
impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WalkerConfig {
    /// Directories to leave out of the sweep.
    pub excluded_directories: Vec<String>,

    /// Whether to follow symlinks or not.
    pub follow_symlinks: bool,

    /// Whether to visit hidden files or not.
    pub scan_hidden_files: bool,

    /// The maximum source file size to analyze, in megabytes.
    pub max_file_size_mb: Option<u64>,
}
impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            excluded_directories: vec!["node_modules", ".git", "build", "dist"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            follow_symlinks: false,
            scan_hidden_files: false,
            max_file_size_mb: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Walker threads, or `None` to auto-detect.
    pub walker_threads: Option<usize>,

    /// Paths per batch on the walk channel.
    pub batch_size: usize,

    /// Walk channel capacity = threads x this.
    pub channel_multiplier: usize,

    /// Stack size of analysis workers, in bytes. Graph traversals recurse
    /// thousands of frames deep on big inputs.
    pub worker_stack_size: usize,

    /// Stack size of the rayon pool used by the PDG sweep, in bytes.
    pub rayon_thread_stack_size: usize,
}
impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            walker_threads: None,
            batch_size: 100,
            channel_multiplier: 4,
            worker_stack_size: 64 * 1024 * 1024,
            rayon_thread_stack_size: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub parser: ParserConfig,
    pub walker: WalkerConfig,
    pub performance: PerformanceConfig,
}

impl Config {
    pub fn load(config_dir: &Path) -> ArgusResult<Self> {
        let mut config = Config::default();

        let default_config_path = config_dir.join("argus.conf");
        if !default_config_path.exists() {
            create_example_config(config_dir)?;
        }

        let user_config_path = config_dir.join("argus.local");
        if user_config_path.exists() {
            let user_config_content = fs::read_to_string(&user_config_path)?;
            let user_config: Config = toml::from_str(&user_config_content)?;

            config = merge_configs(config, user_config);

            println!(
                "{}: Loaded user config from: {}\n",
                style("note").green().bold(),
                style(user_config_path.display())
                    .underlined()
                    .white()
                    .bold()
            );
        } else {
            println!(
                "{}: Using {} configuration.\n      Create '{}' to customize.\n",
                style("note").green().bold(),
                style("default").bold(),
                style(user_config_path.display())
                    .underlined()
                    .white()
                    .bold()
            );
        }

        Ok(config)
    }
}

fn create_example_config(config_dir: &Path) -> ArgusResult<()> {
    let example_path = config_dir.join("argus.conf");
    if !example_path.exists() {
        fs::write(&example_path, DEFAULT_CONFIG_TOML)?;
        tracing::debug!("Example config created at: {}", example_path.display());
    }
    Ok(())
}

/// Merge user config into the defaults, keeping default exclusions the user
/// did not replace and overriding everything else.
fn merge_configs(mut default: Config, user: Config) -> Config {
    default.analyzer = user.analyzer;
    default.parser = user.parser;

    default.walker.follow_symlinks = user.walker.follow_symlinks;
    default.walker.scan_hidden_files = user.walker.scan_hidden_files;
    default.walker.max_file_size_mb = user.walker.max_file_size_mb;
    default
        .walker
        .excluded_directories
        .extend(user.walker.excluded_directories);
    default.walker.excluded_directories.sort_unstable();
    default.walker.excluded_directories.dedup();

    default.performance = user.performance;

    default
}

#[test]
fn merge_configs_dedupes_exclusions() {
    let mut default_cfg = Config::default();
    default_cfg.walker.excluded_directories = vec!["dist".into(), "build".into()];

    let mut user_cfg = Config::default();
    user_cfg.walker.excluded_directories = vec!["vendor".into(), "dist".into()];

    let merged = merge_configs(default_cfg, user_cfg);
    let mut seen = merged.walker.excluded_directories.clone();
    seen.dedup();
    assert_eq!(seen, merged.walker.excluded_directories);
    assert!(merged.walker.excluded_directories.contains(&"vendor".to_string()));
}

#[test]
fn load_creates_example_and_reads_user_overrides() {
    let cfg_dir = tempfile::tempdir().unwrap();
    let cfg_path = cfg_dir.path();

    let user_toml = r#"
        [analyzer]
        workers = 6
        max_pdg_size_mb = 20

        [walker]
        scan_hidden_files = true
    "#;
    fs::write(cfg_path.join("argus.local"), user_toml).unwrap();

    let cfg = Config::load(cfg_path).expect("Config::load should succeed");

    assert!(cfg_path.join("argus.conf").is_file());
    assert_eq!(cfg.analyzer.workers, 6);
    assert_eq!(cfg.analyzer.max_pdg_size_mb, 20);
    assert!(cfg.walker.scan_hidden_files);
    assert!(!cfg.walker.follow_symlinks);
}

#[test]
fn defaults_match_the_shipped_file() {
    let shipped: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
    let defaults = Config::default();
    assert_eq!(shipped.analyzer.workers, defaults.analyzer.workers);
    assert_eq!(
        shipped.analyzer.file_timeout_secs,
        defaults.analyzer.file_timeout_secs
    );
    assert_eq!(shipped.parser.node_binary, defaults.parser.node_binary);
}
