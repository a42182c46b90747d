use std::env;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;

/// How log lines are formatted.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub enum LogFormat {
    /// Human-readable single-line logs.
    Full,
    /// Like [`LogFormat::Full`], optimized for short line lengths.
    #[default]
    Compact,
    /// Only level and message, for output already timestamped by a supervisor.
    Bare,
    /// Multi-line logs for local debugging.
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "bare" => Ok(Self::Bare),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format {s}, expected one of: full, compact, bare, pretty, json"
            )),
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Compact => "compact",
            Self::Bare => "bare",
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

impl LogFormat {
    /// Reads the format from environment variable `key`, ignoring unset or invalid values.
    #[must_use]
    pub fn from_env_var(key: &str) -> Option<Self> {
        let value = env::var(key).ok()?;
        match value.parse() {
            Ok(format) => Some(format),
            Err(e) => {
                eprintln!("Ignoring environment variable {key}: {e}");
                None
            }
        }
    }

    /// Installs a global subscriber writing to stderr in this format.
    ///
    /// Fails if the process already has a global subscriber.
    pub fn init(self, filter: EnvFilter) -> Result<(), SetGlobalDefaultError> {
        let registry = tracing_subscriber::registry().with(filter);
        let layer = Layer::default().with_writer(std::io::stderr);
        match self {
            Self::Full => set_global_default(registry.with(layer)),
            Self::Compact => set_global_default(registry.with(layer.compact())),
            Self::Bare => set_global_default(
                registry.with(layer.without_time().with_target(false).compact()),
            ),
            Self::Pretty => set_global_default(registry.with(layer.pretty())),
            Self::Json => set_global_default(registry.with(layer.json())),
        }
    }
}

/// Builds a filter from the directives in environment variable `key`, or `default_directives`
/// when unset. Invalid directives are skipped.
#[must_use]
pub fn filter_from_env(key: &str, default_directives: &str) -> EnvFilter {
    let directives = env::var(key).unwrap_or_else(|_| default_directives.to_string());
    EnvFilter::builder().parse_lossy(directives)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("full", LogFormat::Full)]
    #[case("Compact", LogFormat::Compact)]
    #[case("bare", LogFormat::Bare)]
    #[case("verbose", LogFormat::Pretty)]
    #[case("jsonl", LogFormat::Json)]
    fn test_parse(#[case] value: &str, #[case] expected: LogFormat) {
        assert_eq!(value.parse::<LogFormat>().unwrap(), expected);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default().to_string(), "compact");
    }

    #[test]
    fn test_filter_default() {
        let filter = filter_from_env("MASON_TEST_UNSET_LOG_VARIABLE", "mason_core=debug");
        assert_eq!(filter.to_string(), "mason_core=debug");
    }
}
