mod alerts;
mod config;
mod errors;
mod interval;
mod logging;
mod mailer;
mod monitor;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ebm_core::EopClient;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::{Config, SmtpSettings};
use crate::errors::MonitorError;
use crate::mailer::{Notifier, SmtpNotifier};
use crate::monitor::ResourceMonitor;

/// Poll EBM device stock and email on changes and API outages.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = "EBM_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; variables may come from the real environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let _guard = match logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "EBM monitor exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), MonitorError> {
    info!("Starting EBM Monitor...");
    info!(path = %cli.config.display(), "loading config");

    let config = Config::load(&cli.config)?;
    let credential = crate::config::credential_from_env()?;

    let smtp = SmtpSettings::from_env()?;
    if smtp.is_none() {
        warn!("SMTP configuration missing, notifications will not be delivered");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::new(smtp)?);

    let client = Arc::new(EopClient::new(
        config.endpoint.as_str(),
        credential,
        config.request_timeout,
    )?);
    let recipients: Arc<[String]> = config.recipients.into();

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    for resource in config.resources {
        let span = info_span!("monitor", resource = %resource.display_name);
        let monitor = ResourceMonitor::new(
            resource,
            client.clone(),
            notifier.clone(),
            recipients.clone(),
            config.interval,
        );
        tasks.spawn(monitor.run(cancel.child_token()).instrument(span));
    }

    info!(count = tasks.len(), "monitors started");

    shutdown_signal().await;
    info!("shutdown requested, stopping monitors");
    cancel.cancel();

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "monitor task panicked");
        }
    }

    info!("All monitors finished.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
