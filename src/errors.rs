use serde::de::StdError;
use std::path::PathBuf;
use thiserror::Error;

pub type ArgusResult<T, E = ArgusError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum ArgusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external parser did not produce an AST for the file.
    #[error("no AST produced for {0}")]
    Parse(PathBuf),

    /// A CFG/DFG rule met an arity it cannot handle. The partial graph is
    /// kept; only the offending rule is skipped.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// Per-file wall-clock ceiling exceeded while building the data flow.
    #[error("analysis of {0} timed out")]
    Timeout(PathBuf),

    #[error("could not persist artifact: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync + 'static>),

    #[error("{0}")]
    Msg(String),
}

impl From<&str> for ArgusError {
    fn from(s: &str) -> Self {
        ArgusError::Msg(s.to_owned())
    }
}

impl From<String> for ArgusError {
    fn from(s: String) -> Self {
        ArgusError::Msg(s)
    }
}

#[test]
fn io_conversion_retains_message() {
    let e = std::io::Error::other("boom!");
    let a: ArgusError = e.into();
    assert!(matches!(a, ArgusError::Io(_)));
    assert!(a.to_string().contains("boom"));
}

#[test]
fn simple_string_into_msg() {
    let a: ArgusError = "plain msg".into();
    assert!(matches!(a, ArgusError::Msg(s) if s == "plain msg"));
}

#[test]
fn timeout_mentions_the_file() {
    let a = ArgusError::Timeout(PathBuf::from("sample.js"));
    assert!(a.to_string().contains("sample.js"));
}
