//! Run configuration from command-line args and environment.

use std::time::Duration;

use crate::error::ConfigError;

/// Root-level timeout applied when nothing overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

pub const TIMEOUT_ENV: &str = "SPECRUN_TIMEOUT_MS";
pub const LOG_ENV: &str = "SPECRUN_LOG";

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            other => Err(ConfigError::InvalidColor(other.to_string())),
        }
    }

    /// Resolve `Auto` against `NO_COLOR` (https://no-color.org/) and whether
    /// stdout is a terminal.
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                std::env::var_os("NO_COLOR").is_none()
                    && std::io::IsTerminal::is_terminal(&std::io::stdout())
            }
        }
    }
}

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Timeout of the root suite, inherited by everything below it.
    pub default_timeout: Duration,
    pub color: ColorChoice,
    /// Title printed as the root suite header.
    pub root_title: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            default_timeout: DEFAULT_TIMEOUT,
            color: ColorChoice::Auto,
            root_title: "root".to_string(),
        }
    }
}

impl RunConfig {
    /// Parse from the process args (compatible with `cargo test -- <args>`)
    /// and environment.
    pub fn from_args() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::parse(&args, |key| std::env::var(key).ok())
    }

    /// Parse from explicit `args` (binary name excluded) and an environment
    /// lookup. Args win over the environment; unknown flags are ignored.
    pub fn parse(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = RunConfig::default();

        if let Some(raw) = env(TIMEOUT_ENV).filter(|v| !v.is_empty()) {
            config.default_timeout = parse_timeout(&raw, "SPECRUN_TIMEOUT_MS")?;
        }
        if env("NO_COLOR").is_some() {
            config.color = ColorChoice::Never;
        }

        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "--timeout" | "--color" => {
                    let value = args
                        .get(i + 1)
                        .ok_or_else(|| ConfigError::MissingValue(arg.to_string()))?;
                    config.apply(arg, value)?;
                    i += 1;
                }
                "--no-color" => config.color = ColorChoice::Never,
                _ => {
                    if let Some((flag, value)) = arg.split_once('=') {
                        if flag == "--timeout" || flag == "--color" {
                            config.apply(flag, value)?;
                        }
                    }
                }
            }
            i += 1;
        }

        Ok(config)
    }

    fn apply(&mut self, flag: &str, value: &str) -> Result<(), ConfigError> {
        match flag {
            "--timeout" => self.default_timeout = parse_timeout(value, "--timeout")?,
            "--color" => self.color = ColorChoice::parse(value)?,
            _ => {}
        }
        Ok(())
    }
}

fn parse_timeout(value: &str, origin: &'static str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::InvalidTimeout {
            value: value.to_string(),
            origin,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults() {
        let config = RunConfig::parse(&[], no_env).unwrap();
        assert_eq!(config.default_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.color, ColorChoice::Auto);
        assert_eq!(config.root_title, "root");
    }

    #[rstest]
    #[case(&["--timeout", "250"], 250)]
    #[case(&["--timeout=750"], 750)]
    #[case(&["--nocapture", "--timeout", "10", "some_filter"], 10)]
    fn timeout_flag(#[case] input: &[&str], #[case] expected_ms: u64) {
        let config = RunConfig::parse(&args(input), no_env).unwrap();
        assert_eq!(config.default_timeout, Duration::from_millis(expected_ms));
    }

    #[rstest]
    #[case(&["--color", "always"], ColorChoice::Always)]
    #[case(&["--color=never"], ColorChoice::Never)]
    #[case(&["--no-color"], ColorChoice::Never)]
    #[case(&["--color", "auto"], ColorChoice::Auto)]
    fn color_flag(#[case] input: &[&str], #[case] expected: ColorChoice) {
        let config = RunConfig::parse(&args(input), no_env).unwrap();
        assert_eq!(config.color, expected);
    }

    #[test]
    fn environment_is_overridden_by_args() {
        let env = |key: &str| match key {
            TIMEOUT_ENV => Some("1200".to_string()),
            _ => None,
        };
        let config = RunConfig::parse(&[], env).unwrap();
        assert_eq!(config.default_timeout, Duration::from_millis(1200));

        let config = RunConfig::parse(&args(&["--timeout", "300"]), env).unwrap();
        assert_eq!(config.default_timeout, Duration::from_millis(300));
    }

    #[test]
    fn no_color_env_disables_color() {
        let env = |key: &str| (key == "NO_COLOR").then(String::new);
        let config = RunConfig::parse(&[], env).unwrap();
        assert_eq!(config.color, ColorChoice::Never);
    }

    #[rstest]
    #[case(&["--timeout", "soon"])]
    #[case(&["--timeout=0"])]
    #[case(&["--timeout=-5"])]
    fn bad_timeouts_are_rejected(#[case] input: &[&str]) {
        let err = RunConfig::parse(&args(input), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { origin: "--timeout", .. }));
    }

    #[test]
    fn missing_flag_value_is_rejected() {
        let err = RunConfig::parse(&args(&["--timeout"]), no_env).unwrap_err();
        assert_eq!(err, ConfigError::MissingValue("--timeout".into()));
    }

    #[test]
    fn bad_color_is_rejected() {
        let err = RunConfig::parse(&args(&["--color", "purple"]), no_env).unwrap_err();
        assert_eq!(err, ConfigError::InvalidColor("purple".into()));
    }

    #[test]
    fn forced_choices_ignore_terminal() {
        assert!(ColorChoice::Always.enabled());
        assert!(!ColorChoice::Never.enabled());
    }
}
