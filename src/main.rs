use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use meterwatch::alerts::{AlertManager, MessageRenderer, SmtpNotifier};
use meterwatch::config::Config;
use meterwatch::cycle::CheckCycle;
use meterwatch::daemon::Daemon;
use meterwatch::persistence::PersistenceManager;
use meterwatch::scheduler::Scheduler;
use meterwatch::source::HttpReadingSource;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments for the meter watcher
#[derive(Parser)]
#[command(
    name = "meterwatch",
    about = "Metered utility balance watcher with tiered email reminders",
    long_about = "Polls the remaining balance of each configured unit on a schedule, keeps a short \
                  history per unit, and emails its recipients once per threshold as the balance \
                  drops. State survives restarts."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "meterwatch.toml",
        help = "Configuration file path (TOML format)"
    )]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging output (debug level)")]
    verbose: bool,

    /// Run a single check cycle and exit
    #[arg(long, help = "Run one check cycle, save state, and exit")]
    once: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if self.config.is_dir() {
            return Err(format!(
                "Configuration path is not a file: {}",
                self.config.display()
            ));
        }

        if let Some(extension) = self.config.extension() {
            if extension != "toml" {
                warn!(
                    "Configuration file does not have .toml extension: {}",
                    self.config.display()
                );
            }
        }

        Ok(())
    }
}

/// Everything the daemon needs, built from the configuration
struct Components {
    cycle: CheckCycle,
    scheduler: Scheduler,
    daemon: Daemon,
}

fn build(config: Config) -> anyhow::Result<Components> {
    let source = HttpReadingSource::new(config.source.clone())
        .context("Failed to build the reading source")?;
    let notifier =
        SmtpNotifier::new(&config.smtp).context("Failed to build the SMTP notifier")?;

    let renderer = match &config.storage.template_path {
        Some(path) => MessageRenderer::from_file(path)?,
        None => MessageRenderer::default(),
    };

    let alert_manager = AlertManager::new(Arc::new(notifier), renderer);
    let daemon = Daemon::new(
        &config.units,
        PersistenceManager::new(config.storage.snapshot_path()),
    );
    let scheduler = Scheduler::new(
        config.schedule.normal_interval(),
        config.schedule.retry_interval(),
    );
    let cycle = CheckCycle::new(config.units, Arc::new(source), alert_manager);

    Ok(Components {
        cycle,
        scheduler,
        daemon,
    })
}

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    info!("Starting meter watcher");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Loaded configuration from {} with {} unit(s)",
        cli.config.display(),
        config.units.len()
    );

    let Components {
        cycle,
        scheduler,
        mut daemon,
    } = match build(config) {
        Ok(components) => components,
        Err(e) => {
            error!("Failed to initialize: {:#}", e);
            std::process::exit(1);
        }
    };

    // SIGINT, SIGTERM and SIGHUP; installed before any cycle runs so a signal
    // never skips the final save
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel();
    if let Err(e) = ctrlc::set_handler(move || {
        if let Err(e) = shutdown_tx.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    }) {
        error!("Failed to install signal handler: {}", e);
        std::process::exit(1);
    }

    let shutdown = async move {
        shutdown_rx.recv().await;
    };

    if cli.once {
        let result = daemon.run_once_until(&cycle, shutdown).await;
        match &result {
            Ok(report) => info!(
                "Check cycle complete: {} unit(s) checked, {} notification(s) sent",
                report.units_checked, report.notifications_sent
            ),
            Err(e) if e.is_fatal() => {
                error!("Check cycle hit an unrecoverable error: {}", e);
                std::process::exit(1);
            }
            Err(e) => error!("Check cycle failed: {}", e),
        }
        let saved = daemon.shutdown().await;
        if result.is_err() || saved.is_err() {
            std::process::exit(1);
        }
        return;
    }

    daemon.start(scheduler, cycle);
    info!("Meter watcher is running. Press Ctrl+C to stop.");

    if let Err(e) = daemon.run_until(shutdown).await {
        error!("Stopping without saving state: {}", e);
        std::process::exit(1);
    }

    info!("Meter watcher shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(config: PathBuf) -> Cli {
        Cli {
            config,
            verbose: false,
            once: false,
        }
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meterwatch.toml");
        std::fs::write(&path, "").unwrap();

        assert!(cli(path).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        // Missing files are reported when the configuration is loaded
        assert!(cli(PathBuf::from("/nonexistent/meterwatch.toml"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = TempDir::new().unwrap();
        assert!(cli(dir.path().to_path_buf()).validate().is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["meterwatch"]);
        assert_eq!(cli.config, PathBuf::from("meterwatch.toml"));
        assert!(!cli.verbose);
        assert!(!cli.once);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["meterwatch", "-c", "/etc/mw.toml", "-v", "--once"]);
        assert_eq!(cli.config, PathBuf::from("/etc/mw.toml"));
        assert!(cli.verbose);
        assert!(cli.once);
    }

    #[test]
    fn test_build_from_minimal_config() {
        let dir = TempDir::new().unwrap();
        let toml = format!(
            r#"
            [source]
            url = "http://127.0.0.1:9/query"

            [smtp]
            server = "smtp.example.com"
            username = "watch@example.com"
            password = "secret"

            [storage]
            state_dir = "{}"

            [[units]]
            id = "A101"
            building = "1"
            recipients = ["a@example.com"]
            "#,
            dir.path().display()
        );
        let config = Config::from_toml(&toml).unwrap();

        let components = build(config).unwrap();
        assert_eq!(components.cycle.units().len(), 1);
    }
}
