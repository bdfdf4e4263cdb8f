use crate::{
    locate_chrome, prepare_output_dir, produce_targets, resolve_output_dir, ChromeCapturer,
    Config, InputKind, InputSource, InterruptMonitor, ReconError, RunOutcome, RunSession,
};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "peepshot")]
#[command(about = "Screenshot every web target of a recon run into one HTML report")]
#[command(version)]
#[command(group(ArgGroup::new("input").args(["xml", "list", "dir", "url"]).multiple(false)))]
pub struct Cli {
    #[arg(long, value_name = "FILE", help = "nmap XML file to parse")]
    pub xml: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "File that contains a list of URLs")]
    pub list: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory of nmap XML files")]
    pub dir: Option<PathBuf>,

    #[arg(long, help = "Single URL to scan")]
    pub url: Option<String>,

    #[arg(long, help = "Number of concurrent workers [default: 1]")]
    pub threads: Option<usize>,

    #[arg(long, help = "Per-capture timeout in seconds [default: 8]")]
    pub timeout: Option<u64>,

    #[arg(long, value_name = "DIR", help = "Output directory (must not exist)")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<PathBuf>,

    #[arg(long, help = "Progress reporting interval in seconds")]
    pub progress_interval: Option<u64>,
}

impl Cli {
    /// The one input source the user selected.
    pub fn input_source(&self) -> Result<InputSource, ReconError> {
        let path_source = |path: &PathBuf| path.to_string_lossy().into_owned();

        if let Some(xml) = &self.xml {
            Ok(InputSource::new(InputKind::Xml, path_source(xml)))
        } else if let Some(list) = &self.list {
            Ok(InputSource::new(InputKind::List, path_source(list)))
        } else if let Some(dir) = &self.dir {
            Ok(InputSource::new(InputKind::Dir, path_source(dir)))
        } else if let Some(url) = &self.url {
            Ok(InputSource::new(InputKind::Single, url.clone()))
        } else {
            Err(ReconError::MissingInput)
        }
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(output) = &self.output {
            config.output_dir = Some(output.clone());
        }
        if self.verbose {
            config.verbose = true;
        }
        if let Some(chrome_path) = &self.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
        if let Some(interval) = self.progress_interval {
            config.progress_interval = Some(interval);
        }
    }
}

/// Defaults, then the optional JSON file, then command-line flags.
pub async fn load_config(args: &Cli) -> Result<Config, ReconError> {
    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path).await.map_err(|e| {
                ReconError::ConfigurationError(format!("{}: {}", path.display(), e))
            })?;
            Config::from_json(&content)?
        }
        None => Config::default(),
    };

    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

pub struct CliRunner {
    pub config: Config,
    pub input: InputSource,
}

impl CliRunner {
    pub async fn new(args: &Cli) -> Result<Self, ReconError> {
        let input = args.input_source()?;
        let config = load_config(args).await?;
        Ok(Self { config, input })
    }

    /// Execute one run.
    ///
    /// Every configuration check happens before the output directory is
    /// created, so a rejected run leaves nothing behind.
    pub async fn run(&self) -> Result<RunOutcome, ReconError> {
        info!("Threads: {}", self.config.threads);
        info!("Capture timeout: {:?}", self.config.capture_timeout());

        let output_dir = resolve_output_dir(self.config.output_dir.as_deref(), chrono::Local::now())?;
        let targets = produce_targets(self.input.kind, &self.input.source).await?;
        let chrome_path = locate_chrome(self.config.chrome_path.as_deref())?;

        println!("Loading {} targets", targets.len());
        prepare_output_dir(&output_dir).await?;

        let capturer = Arc::new(ChromeCapturer::launch(&self.config, &chrome_path, &output_dir).await?);
        let session = RunSession::new(self.config.clone(), capturer.clone(), &output_dir);
        let outcome = session.run(targets, InterruptMonitor::install()).await;

        // Bounded: on interrupt the browser may be stuck on a page.
        if tokio::time::timeout(Duration::from_secs(2), capturer.shutdown())
            .await
            .is_err()
        {
            warn!("Browser did not shut down in time");
        }

        outcome
    }
}

pub fn log_level(verbose: bool) -> tracing::Level {
    if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    }
}

/// Install the global subscriber. Call once the config is merged.
pub fn setup_logging(verbose: bool) -> Result<(), ReconError> {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbose))
        .with_target(false)
        .try_init()
        .map_err(|e| ReconError::ConfigurationError(e.to_string()))
}
