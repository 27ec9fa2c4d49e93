use crate::analysis::Label;
use crate::features::{FeatureKind, Level};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "argus")]
#[command(about = "A static detector for malicious JavaScript built on program dependency graphs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and store the dependency graph of every JS file under a path
    Pdgs {
        /// Folder to sweep (defaults to the current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Where to store the graphs (defaults to <path>/analysis/pdg)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Select features over labeled corpora and fit the forest
    Learn(LearnOpts),

    /// Classify stored graphs with a trained model
    Classify(ClassifyOpts),
}

#[derive(Args)]
pub struct LearnOpts {
    /// Directories of stored graphs to learn from
    #[arg(long = "d", required = true, num_args = 1..)]
    pub dirs: Vec<PathBuf>,

    /// Label of each directory, in order
    #[arg(long = "l", value_enum, required = true, num_args = 1..)]
    pub labels: Vec<Label>,

    /// Two directories (one benign, one malicious) for chi-square selection
    #[arg(long = "vd", required = true, num_args = 2)]
    pub validation_dirs: Vec<PathBuf>,

    /// Labels of the selection directories, in order
    #[arg(long = "vl", value_enum, required = true, num_args = 2)]
    pub validation_labels: Vec<Label>,

    #[command(flatten)]
    pub features: FeatureArgs,

    #[command(flatten)]
    pub analysis: AnalysisPathArg,

    /// Trees in the forest
    #[arg(long, default_value_t = 500)]
    pub trees: u16,

    /// Chi-square confidence, in percent
    #[arg(long, default_value_t = 99)]
    pub confidence: u32,

    /// Where to store the trained model
    #[arg(long, default_value = "analysis")]
    pub model_dir: PathBuf,

    #[arg(long, default_value = "model")]
    pub model_name: String,

    /// Print the (hopelessly optimistic) training-set score
    #[arg(long)]
    pub score: bool,
}

#[derive(Args)]
pub struct ClassifyOpts {
    /// Directories of stored graphs to classify
    #[arg(long = "d", num_args = 1..)]
    pub dirs: Vec<PathBuf>,

    /// Ground-truth label of each directory, for scoring
    #[arg(long = "l", value_enum, num_args = 1..)]
    pub dir_labels: Vec<Label>,

    /// Individual graph files to classify
    #[arg(long = "f", num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Ground-truth label of each file, for scoring
    #[arg(long = "lf", value_enum, num_args = 1..)]
    pub file_labels: Vec<Label>,

    /// Path of the trained model
    #[arg(long = "m")]
    pub model: PathBuf,

    /// P(malicious) over which a file is flagged
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    #[command(flatten)]
    pub features: FeatureArgs,

    #[command(flatten)]
    pub analysis: AnalysisPathArg,

    /// Confidence of the selection dictionary to load, in percent
    #[arg(long, default_value_t = 99)]
    pub confidence: u32,
}

#[derive(Args, Clone, Copy)]
pub struct FeatureArgs {
    /// Level of the analysis
    #[arg(long, value_enum, default_value = "pdg")]
    pub level: Level,

    /// Kind of features to extract
    #[arg(long, value_enum, default_value = "ngrams")]
    pub features: FeatureKind,

    /// Width of the sliding window over the unit stream
    #[arg(long, default_value_t = 4)]
    pub n: usize,
}

#[derive(Args, Clone)]
pub struct AnalysisPathArg {
    /// Folder holding the feature dictionaries and analysis artifacts
    #[arg(long, default_value = "analysis")]
    pub analysis_path: PathBuf,
}
