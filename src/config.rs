//! Runtime configuration from environment variables and command-line flags

use std::env;
use std::path::{Path, PathBuf};

/// Largest retained window accepted (one day of per-second slots)
pub const MAX_WINDOW_RETENTION_SECS: u64 = 86_400;

/// Grace period after an interval boundary before it is reported
pub const DEFAULT_LATE_BUFFER_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportBackend {
    Text,
    Jsonl,
    Sqlite,
}

impl ReportBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportBackend::Text => "text",
            ReportBackend::Jsonl => "jsonl",
            ReportBackend::Sqlite => "sqlite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportBackend::Text),
            "jsonl" => Some(ReportBackend::Jsonl),
            "sqlite" => Some(ReportBackend::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing configuration value: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the traffic monitor runtime
///
/// Loaded from environment variables, then overridden by command-line flags.
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    /// Access log to read (CSV or JSONL)
    pub input_path: PathBuf,

    /// Report destination; stdout when unset (text/jsonl only)
    pub output_path: Option<PathBuf>,

    pub backend: ReportBackend,

    /// Reporting cadence in seconds
    pub interval_secs: u64,

    /// Seconds of per-second history kept in the window store
    pub window_retention_secs: u64,

    /// Average hits/second over the alarm horizon that trips the alarm
    pub alarm_threshold: u64,

    pub alarm_horizon_secs: u64,

    pub late_buffer_secs: u64,

    /// Record queue capacity (parse-ahead before backpressure)
    pub channel_buffer: usize,

    /// Tail the input file instead of reading it once
    pub follow: bool,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input_files/sample_csv.txt"),
            output_path: None,
            backend: ReportBackend::Text,
            interval_secs: 10,
            window_retention_secs: 120,
            alarm_threshold: 10,
            alarm_horizon_secs: 120,
            late_buffer_secs: DEFAULT_LATE_BUFFER_SECS,
            channel_buffer: 100,
            follow: false,
        }
    }
}

impl TrafficConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `TRAFFIC_INPUT_PATH` (default: input_files/sample_csv.txt)
    /// - `TRAFFIC_OUTPUT_PATH` (default: stdout)
    /// - `REPORT_BACKEND` (default: text)
    /// - `REPORT_INTERVAL_SECS` (default: 10)
    /// - `WINDOW_RETENTION_SECS` (default: 120)
    /// - `ALARM_THRESHOLD` (default: 10)
    /// - `ALARM_HORIZON_SECS` (default: 120)
    /// - `LATE_BUFFER_SECS` (default: 5)
    /// - `RECORD_CHANNEL_BUFFER` (default: 100)
    /// - `FOLLOW_INPUT` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = env::var("TRAFFIC_INPUT_PATH") {
            config.input_path = path.into();
        }
        if let Ok(path) = env::var("TRAFFIC_OUTPUT_PATH") {
            if !path.trim().is_empty() {
                config.output_path = Some(path.into());
            }
        }
        if let Ok(backend) = env::var("REPORT_BACKEND") {
            config.backend = parse_backend("REPORT_BACKEND", &backend)?;
        }
        if let Some(v) = env_number("REPORT_INTERVAL_SECS")? {
            config.interval_secs = v;
        }
        if let Some(v) = env_number("WINDOW_RETENTION_SECS")? {
            config.window_retention_secs = v;
        }
        if let Some(v) = env_number("ALARM_THRESHOLD")? {
            config.alarm_threshold = v;
        }
        if let Some(v) = env_number("ALARM_HORIZON_SECS")? {
            config.alarm_horizon_secs = v;
        }
        if let Some(v) = env_number("LATE_BUFFER_SECS")? {
            config.late_buffer_secs = v;
        }
        if let Some(v) = env_number("RECORD_CHANNEL_BUFFER")? {
            config.channel_buffer = v as usize;
        }
        if let Ok(follow) = env::var("FOLLOW_INPUT") {
            config.follow = follow.to_lowercase().parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(format!("FOLLOW_INPUT must be true or false, got '{}'", follow))
            })?;
        }

        Ok(config)
    }

    /// Environment first, then command-line flags on top
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = env::args().collect();
        let mut config = Self::from_env()?;
        config.apply_args(&args)?;
        Ok(config)
    }

    /// Override fields from `--flag value` pairs
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(path) = arg_value(args, "--input")? {
            self.input_path = path.into();
        }
        if let Some(path) = arg_value(args, "--output")? {
            self.output_path = Some(path.into());
        }
        if let Some(backend) = arg_value(args, "--backend")? {
            self.backend = parse_backend("--backend", &backend)?;
        }
        if let Some(v) = arg_number(args, "--interval")? {
            self.interval_secs = v;
        }
        if let Some(v) = arg_number(args, "--window-retention")? {
            self.window_retention_secs = v;
        }
        if let Some(v) = arg_number(args, "--alarm-threshold")? {
            self.alarm_threshold = v;
        }
        if let Some(v) = arg_number(args, "--alarm-horizon")? {
            self.alarm_horizon_secs = v;
        }
        if let Some(v) = arg_number(args, "--late-buffer")? {
            self.late_buffer_secs = v;
        }
        if let Some(v) = arg_number(args, "--channel-buffer")? {
            self.channel_buffer = v as usize;
        }
        if args.iter().any(|a| a == "--follow") {
            self.follow = true;
        }
        Ok(())
    }

    /// Check every rule and report all violations together
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.interval_secs < 1 {
            problems.push("interval cannot be < 1".to_string());
        }
        if self.alarm_threshold < 1 {
            problems.push("alarm-threshold cannot be < 1".to_string());
        }
        if self.alarm_horizon_secs < 1 {
            problems.push("alarm-horizon cannot be < 1".to_string());
        }
        if self.window_retention_secs < self.alarm_horizon_secs {
            problems.push(format!(
                "window-retention cannot be < alarm-horizon ({})",
                self.alarm_horizon_secs
            ));
        }
        if self.window_retention_secs > MAX_WINDOW_RETENTION_SECS {
            problems.push(format!(
                "window-retention cannot be > {}",
                MAX_WINDOW_RETENTION_SECS
            ));
        }
        if self.interval_secs.saturating_mul(2) > self.window_retention_secs {
            problems.push("window must be able to hold at least two intervals".to_string());
        }
        if self.late_buffer_secs > self.interval_secs {
            problems.push("late-buffer cannot be > interval".to_string());
        }
        if self.channel_buffer < 1 {
            problems.push("channel-buffer cannot be < 1".to_string());
        }
        if !self.input_path.exists() {
            problems.push(format!(
                "input filepath {} does not exist",
                self.input_path.display()
            ));
        }
        if self.backend == ReportBackend::Sqlite && self.output_path.is_none() {
            problems.push("sqlite backend requires an output path".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue(problems.join("; ")))
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }
}

fn parse_backend(source: &str, value: &str) -> Result<ReportBackend, ConfigError> {
    ReportBackend::parse(value).ok_or_else(|| {
        ConfigError::InvalidValue(format!(
            "{} must be one of text, jsonl, sqlite (got '{}')",
            source, value
        ))
    })
}

fn env_number(var: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be an unsigned integer, got '{}'", var, s))),
        Err(_) => Ok(None),
    }
}

fn arg_value(args: &[String], flag: &str) -> Result<Option<String>, ConfigError> {
    match args.iter().position(|x| x == flag) {
        Some(idx) => match args.get(idx + 1) {
            Some(value) if !value.starts_with("--") => Ok(Some(value.clone())),
            _ => Err(ConfigError::MissingVariable(format!("{} requires a value", flag))),
        },
        None => Ok(None),
    }
}

fn arg_number(args: &[String], flag: &str) -> Result<Option<u64>, ConfigError> {
    match arg_value(args, flag)? {
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be an unsigned integer, got '{}'", flag, s))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn valid_config() -> (tempfile::NamedTempFile, TrafficConfig) {
        let input = tempfile::NamedTempFile::new().unwrap();
        let config = TrafficConfig {
            input_path: input.path().to_path_buf(),
            ..TrafficConfig::default()
        };
        (input, config)
    }

    #[test]
    fn test_default_config_is_valid_with_existing_input() {
        let (_input, config) = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.window_retention_secs, 120);
        assert_eq!(config.late_buffer_secs, 5);
        assert_eq!(config.backend, ReportBackend::Text);
    }

    #[test]
    fn test_args_override_fields() {
        let mut config = TrafficConfig::default();
        config
            .apply_args(&args(&[
                "traffic_monitor",
                "--interval",
                "30",
                "--window-retention",
                "300",
                "--backend",
                "jsonl",
                "--follow",
            ]))
            .unwrap();

        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.window_retention_secs, 300);
        assert_eq!(config.backend, ReportBackend::Jsonl);
        assert!(config.follow);
    }

    #[test]
    fn test_bad_flag_values() {
        let mut config = TrafficConfig::default();
        assert!(matches!(
            config.apply_args(&args(&["x", "--interval", "ten"])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            config.apply_args(&args(&["x", "--interval"])),
            Err(ConfigError::MissingVariable(_))
        ));
        assert!(matches!(
            config.apply_args(&args(&["x", "--backend", "csv"])),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let (_input, mut config) = valid_config();
        config.interval_secs = 0;
        config.alarm_threshold = 0;
        config.window_retention_secs = 60;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("interval cannot be < 1"));
        assert!(err.contains("alarm-threshold cannot be < 1"));
        assert!(err.contains("window-retention cannot be < alarm-horizon"));
    }

    #[test]
    fn test_window_must_hold_two_intervals() {
        let (_input, mut config) = valid_config();
        config.interval_secs = 61;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("at least two intervals"));

        config.interval_secs = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_input_and_sqlite_output() {
        let mut config = TrafficConfig {
            input_path: PathBuf::from("/definitely/not/here.csv"),
            backend: ReportBackend::Sqlite,
            ..TrafficConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("does not exist"));
        assert!(err.contains("sqlite backend requires an output path"));

        // Following still needs the file to exist, since tailing starts at its end
        config.follow = true;
        config.output_path = Some(PathBuf::from("reports.db"));
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("does not exist"));
        assert!(!err.contains("sqlite"));
    }
}
