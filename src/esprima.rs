use crate::errors::{ArgusError, ArgusResult};
use crate::utils::config::ParserConfig;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use tracing::{debug, error};

/// Separator between token kinds and values on the tokenizer's stdout.
pub const TOKEN_SEPARATOR: &str = "###aaa@@@###qqq";

/// Run the external parser and read the AST document off its stdout.
pub fn parse_ast(config: &ParserConfig, input: &Path) -> ArgusResult<Value> {
    let script = config.scripts_dir.join("ast.js");
    debug!(target: "esprima", file = %input.display(), "producing AST");
    let output = Command::new(&config.node_binary)
        .arg(&script)
        .arg(input)
        .output()?;
    if !output.status.success() {
        error!(
            target: "esprima",
            "the parser could not produce an AST for {}",
            input.display()
        );
        return Err(ArgusError::Parse(input.to_owned()));
    }
    serde_json::from_slice(&output.stdout).map_err(|e| {
        error!(target: "esprima", "unreadable AST for {}: {e}", input.display());
        ArgusError::Parse(input.to_owned())
    })
}

/// Run the external tokenizer. Without values the stream is one kind per
/// line; with values, `kind SEP value SEP kind SEP value ...`.
pub fn tokens(
    config: &ParserConfig,
    input: &Path,
    with_values: bool,
) -> ArgusResult<Vec<(String, Option<String>)>> {
    let script = config.scripts_dir.join("tokens.js");
    let mut command = Command::new(&config.node_binary);
    command.arg(&script).arg(input);
    if with_values {
        command.arg("1");
    }
    let output = command.output()?;
    if !output.status.success() {
        error!(
            target: "esprima",
            "the tokenizer failed on {}",
            input.display()
        );
        return Err(ArgusError::Parse(input.to_owned()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(if with_values {
        split_token_values(&stdout)
    } else {
        stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| (l.to_owned(), None))
            .collect()
    })
}

fn split_token_values(stdout: &str) -> Vec<(String, Option<String>)> {
    let flat = stdout.replace('\n', "");
    let mut parts: Vec<&str> = flat.split(TOKEN_SEPARATOR).collect();
    // the stream is terminated by a trailing separator
    if parts.last() == Some(&"") {
        parts.pop();
    }
    parts
        .chunks_exact(2)
        .map(|pair| (pair[0].to_owned(), Some(pair[1].to_owned())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_value_stream_splits_into_pairs() {
        let raw = format!(
            "Keyword{TOKEN_SEPARATOR}var{TOKEN_SEPARATOR}Identifier{TOKEN_SEPARATOR}x{TOKEN_SEPARATOR}"
        );
        let pairs = split_token_values(&raw);
        assert_eq!(
            pairs,
            [
                ("Keyword".to_owned(), Some("var".to_owned())),
                ("Identifier".to_owned(), Some("x".to_owned())),
            ]
        );
    }

    #[test]
    fn missing_parser_is_a_parse_error() {
        let config = ParserConfig {
            node_binary: "definitely-not-a-binary".into(),
            scripts_dir: "scripts".into(),
        };
        let err = parse_ast(&config, Path::new("x.js")).unwrap_err();
        assert!(matches!(err, ArgusError::Io(_)));
    }
}
