use crate::logging::LogFormat;
use anyhow::{bail, Context, Result};
use clap::Parser;
use cstp_core::{control::parse_control_url, StorageFailurePolicy};
use serde::Deserialize;
use std::{fmt, fs, net::SocketAddr, path::Path, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_CONTROL_URL: &str = "http://localhost:8001/control/do_pi";

/// Which storage backend records measurements and commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Log,
    Memory,
    Csv,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "memory" => Ok(Self::Memory),
            "csv" => Ok(Self::Csv),
            other => Err(format!(
                "unknown storage backend '{other}' (expected log, memory or csv)"
            )),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => f.write_str("log"),
            Self::Memory => f.write_str("memory"),
            Self::Csv => f.write_str("csv"),
        }
    }
}

/// Command line flags. Every flag can also be set through its environment
/// variable; both override the optional YAML file.
#[derive(Debug, Default, Parser)]
#[command(name = "cstp-app", version, about = "CSTP monitoring and control relay")]
pub struct Cli {
    /// YAML settings file.
    #[arg(long, env = "CSTP_CONFIG")]
    pub config: Option<PathBuf>,

    /// URL of the control computation service.
    #[arg(long, env = "CONTROL_URL")]
    pub control_url: Option<String>,

    /// Older name for `--control-url`; ignored when that one is set.
    #[arg(long, env = "JULIA_CONTROL_URL", hide = true)]
    pub julia_control_url: Option<String>,

    #[arg(long, env = "CONTROL_TIMEOUT_SECS")]
    pub control_timeout_secs: Option<u64>,

    #[arg(long, env = "CSTP_BIND_ADDR")]
    pub bind_addr: Option<SocketAddr>,

    /// Storage backend: log, memory or csv.
    #[arg(long, env = "CSTP_STORAGE")]
    pub storage: Option<StorageKind>,

    /// Directory for the csv storage backend.
    #[arg(long, env = "CSTP_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// What to do when a storage write fails: abort or log_and_continue.
    #[arg(long, env = "CSTP_STORAGE_FAILURE_POLICY")]
    pub storage_failure_policy: Option<StorageFailurePolicy>,

    /// Comma separated list of browser origins allowed by CORS, or `*`.
    #[arg(long, env = "CSTP_CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub cors_allowed_origins: Option<Vec<String>>,

    /// Log output: pretty or json.
    #[arg(long, env = "CSTP_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

/// Process-wide settings. Built once at startup and handed to the
/// components that need them; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub control_url: String,
    pub control_timeout_secs: u64,
    pub bind_addr: SocketAddr,
    pub storage: StorageKind,
    pub storage_dir: PathBuf,
    pub storage_failure_policy: StorageFailurePolicy,
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            control_url: DEFAULT_CONTROL_URL.to_string(),
            control_timeout_secs: 5,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            storage: StorageKind::default(),
            storage_dir: PathBuf::from("./data/records"),
            storage_failure_policy: StorageFailurePolicy::default(),
            cors_allowed_origins: Vec::new(),
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Resolves settings from defaults, the optional YAML file and the
    /// command line / environment, in increasing order of precedence.
    pub fn load(cli: &Cli) -> Result<Self> {
        let base = match &cli.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        let settings = base.with_overrides(cli);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {:?}", path))
    }

    fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(url) = cli.control_url.as_ref().or(cli.julia_control_url.as_ref()) {
            self.control_url = url.clone();
        }
        if let Some(secs) = cli.control_timeout_secs {
            self.control_timeout_secs = secs;
        }
        if let Some(addr) = cli.bind_addr {
            self.bind_addr = addr;
        }
        if let Some(storage) = cli.storage {
            self.storage = storage;
        }
        if let Some(dir) = &cli.storage_dir {
            self.storage_dir = dir.clone();
        }
        if let Some(policy) = cli.storage_failure_policy {
            self.storage_failure_policy = policy;
        }
        if let Some(origins) = &cli.cors_allowed_origins {
            self.cors_allowed_origins = origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(format) = cli.log_format {
            self.log_format = format;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        parse_control_url(&self.control_url).context("control_url is invalid")?;
        if self.control_timeout_secs == 0 {
            bail!("control_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }
}
