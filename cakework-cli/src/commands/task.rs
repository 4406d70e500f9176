//! Task command handlers

use anyhow::Result;
use cakework_core::domain::job::JobStatus;
use cakework_core::domain::run::Run;
use clap::Subcommand;
use colored::*;

use super::colorize_status;
use crate::config::Config;

/// Task subcommands
#[derive(Subcommand)]
pub enum TaskCommands {
    /// List the runs of a task
    Runs {
        /// Task name
        task: String,

        /// Only show runs in this status (PENDING, IN_PROGRESS, SUCCEEDED, FAILED)
        #[arg(short, long)]
        status: Option<JobStatus>,
    },
}

/// Handle task commands
pub async fn handle_task_command(command: TaskCommands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        TaskCommands::Runs { task, status } => {
            let runs = client.list_runs(&task, status).await?;

            if runs.is_empty() {
                println!("{}", format!("No runs found for task {}.", task).yellow());
            } else {
                println!(
                    "{}",
                    format!("Found {} run(s) for task {}:", runs.len(), task).bold()
                );
                println!();
                for run in runs {
                    print_run_summary(&run);
                }
            }

            Ok(())
        }
    }
}

/// Print a one-entry run summary
fn print_run_summary(run: &Run) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Status:   {}", colorize_status(run.status));
    println!(
        "    Created:  {}",
        run.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(error) = &run.error {
        println!("    Error:    {}", error.red());
    }
    println!();
}
