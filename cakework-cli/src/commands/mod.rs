//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod example;
mod run;
mod task;

pub use example::{HelloArgs, ImageArgs};
pub use run::RunCommands;
pub use task::TaskCommands;

use std::time::Duration;

use anyhow::Result;
use cakework_client::{CancellationToken, PollConfig};
use cakework_core::domain::job::JobStatus;
use clap::{Args, Subcommand};
use colored::*;
use tracing::info;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit and inspect runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Query the runs of a task
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Run the `say_hello` example task and print the greeting
    Hello(HelloArgs),
    /// Run the `generate_image` example task and print the image URL
    Image(ImageArgs),
}

/// Polling options shared by every command that waits for a run
#[derive(Args, Debug, Clone, Copy)]
pub struct WaitArgs {
    /// Seconds between two status polls
    #[arg(long, default_value_t = 1.0)]
    pub interval: f64,

    /// Seconds to wait before giving up
    #[arg(long, default_value_t = 300.0)]
    pub timeout: f64,
}

impl WaitArgs {
    pub fn poll_config(&self) -> Result<PollConfig> {
        let interval = Duration::try_from_secs_f64(self.interval)
            .map_err(|e| anyhow::anyhow!("Invalid --interval {}: {}", self.interval, e))?;
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .map_err(|e| anyhow::anyhow!("Invalid --timeout {}: {}", self.timeout, e))?;

        let config = PollConfig::new(interval, timeout);
        config.validate()?;
        Ok(config)
    }
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Task { command } => task::handle_task_command(command, config).await,
        Commands::Hello(args) => example::hello(args, config).await,
        Commands::Image(args) => example::image(args, config).await,
    }
}

/// Token cancelled when the user presses Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            eprintln!("{}", "Interrupted, cancelling wait...".yellow());
            token.cancel();
        }
    });

    cancel
}

/// Colorize run status for display
pub fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::InProgress => status_str.cyan(),
        JobStatus::Succeeded => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
