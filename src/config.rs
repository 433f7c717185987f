//! Command-line and environment configuration

use std::path::PathBuf;

use clap::Parser;

use crate::interpreter::constants::{
    DEFAULT_HEAP_LIMIT, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_EXPRESSION_DEPTH,
    DEFAULT_MAX_LINE_LENGTH,
};

/// Script host with heap snapshot diagnostics.
///
/// Runs each FILE in order and exits non-zero on the first failure. With no
/// files, starts an interactive shell.
#[derive(Debug, Parser)]
#[command(name = "spectre", version, about)]
pub struct Cli {
    /// Script files to run, in order
    pub files: Vec<PathBuf>,

    /// Maximum depth of nested function calls
    #[arg(long, env = "SPECTRE_MAX_CALL_DEPTH", default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    pub max_call_depth: usize,

    /// Maximum nesting of expressions being evaluated, across all active calls
    #[arg(
        long,
        env = "SPECTRE_MAX_EXPRESSION_DEPTH",
        default_value_t = DEFAULT_MAX_EXPRESSION_DEPTH
    )]
    pub max_expression_depth: usize,

    /// Maximum heap size in bytes
    #[arg(long, env = "SPECTRE_HEAP_LIMIT", default_value_t = DEFAULT_HEAP_LIMIT)]
    pub heap_limit: usize,

    /// Longest interactive line accepted; longer lines are truncated
    #[arg(long, env = "SPECTRE_MAX_LINE_LENGTH", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,
}

/// Resolved host configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub max_call_depth: usize,
    pub max_expression_depth: usize,
    pub heap_limit: usize,
    pub max_line_length: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_expression_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
            heap_limit: DEFAULT_HEAP_LIMIT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl From<&Cli> for HostConfig {
    fn from(cli: &Cli) -> Self {
        HostConfig {
            max_call_depth: cli.max_call_depth,
            max_expression_depth: cli.max_expression_depth,
            heap_limit: cli.heap_limit,
            max_line_length: cli.max_line_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["spectre", "a.js", "b.js"]).unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("a.js"), PathBuf::from("b.js")]);

        let config = HostConfig::from(&cli);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert_eq!(config.max_expression_depth, DEFAULT_MAX_EXPRESSION_DEPTH);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from(["spectre", "--max-call-depth", "10", "--heap-limit", "4096"])
            .unwrap();
        assert!(cli.files.is_empty());
        assert_eq!(cli.max_call_depth, 10);
        assert_eq!(cli.heap_limit, 4096);
    }
}
