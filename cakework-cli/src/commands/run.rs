//! Run command handlers
//!
//! Submitting runs, inspecting them and waiting for them to finish.

use std::sync::Arc;

use anyhow::{Context, Result};
use cakework_client::{CakeworkClient, JobPoller};
use cakework_core::domain::job::JobId;
use cakework_core::domain::parameters::Parameters;
use cakework_core::domain::run::{Compute, Run, RunOutput};
use clap::Subcommand;
use colored::*;
use serde_json::Value;
use tracing::debug;

use super::{WaitArgs, cancel_on_ctrl_c, colorize_status};
use crate::config::Config;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Submit a run of a task
    Submit {
        /// Task name
        task: String,

        /// Task parameter as key=value; JSON values are parsed, anything else is a string
        #[arg(short = 'p', long = "param", value_parser = Parameters::parse_assignment)]
        params: Vec<(String, Value)>,

        /// CPUs requested for the run
        #[arg(long)]
        cpu: Option<u32>,

        /// Memory requested for the run, in MB
        #[arg(long)]
        memory: Option<u32>,

        /// Wait for the run to finish and print its result
        #[arg(short, long)]
        wait: bool,

        #[command(flatten)]
        wait_args: WaitArgs,
    },
    /// Get the current status of a run
    Status {
        /// Run ID
        run_id: String,
    },
    /// Get the result of a succeeded run
    Result {
        /// Run ID
        run_id: String,
    },
    /// Get run details
    Get {
        /// Run ID
        run_id: String,
    },
    /// Wait for a run to finish and print its result
    Wait {
        /// Run ID
        run_id: String,

        #[command(flatten)]
        wait_args: WaitArgs,
    },
}

/// Handle run commands
///
/// # Arguments
/// * `command` - The run command to execute
/// * `config` - The CLI configuration
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        RunCommands::Submit {
            task,
            params,
            cpu,
            memory,
            wait,
            wait_args,
        } => {
            let compute = (cpu.is_some() || memory.is_some()).then(|| Compute::new(cpu, memory));
            let parameters = params.into_iter().collect();
            submit_run(client, &task, parameters, compute, wait.then_some(wait_args)).await
        }
        RunCommands::Status { run_id } => get_status(&client, &JobId::new(run_id)).await,
        RunCommands::Result { run_id } => get_result(&client, &JobId::new(run_id)).await,
        RunCommands::Get { run_id } => get_run(&client, &JobId::new(run_id)).await,
        RunCommands::Wait { run_id, wait_args } => {
            wait_for_run(client, &JobId::new(run_id), wait_args).await
        }
    }
}

/// Submit a run, optionally waiting for its result
///
/// The wait options are validated before anything is submitted.
async fn submit_run(
    client: CakeworkClient,
    task: &str,
    parameters: Parameters,
    compute: Option<Compute>,
    wait: Option<WaitArgs>,
) -> Result<()> {
    let poll_config = wait.map(|args| args.poll_config()).transpose()?;
    let poller = JobPoller::new(Arc::new(client), poll_config.unwrap_or_default());

    debug!(task, parameters = parameters.len(), ?compute, "Submitting run");

    let run_id = match compute {
        Some(compute) => poller.submit_with_compute(task, parameters, compute).await?,
        None => poller.submit(task, parameters).await?,
    };

    println!("{}", "✓ Run submitted".green().bold());
    println!("  Task:   {}", task.cyan());
    println!("  Run ID: {}", run_id.to_string().bold());

    if poll_config.is_some() {
        println!();
        let output = wait_with(&poller, &run_id).await?;
        print_output(&output);
    }

    Ok(())
}

async fn get_status(client: &CakeworkClient, run_id: &JobId) -> Result<()> {
    let status = client.get_run_status(run_id).await?;
    println!("{}", colorize_status(status));
    Ok(())
}

async fn get_result(client: &CakeworkClient, run_id: &JobId) -> Result<()> {
    let output = client
        .get_run_result(run_id)
        .await
        .with_context(|| format!("Failed to fetch result of run {}", run_id))?;
    print_output(&output);
    Ok(())
}

async fn get_run(client: &CakeworkClient, run_id: &JobId) -> Result<()> {
    let run = client.get_run(run_id).await?;
    print_run_details(&run);
    Ok(())
}

async fn wait_for_run(client: CakeworkClient, run_id: &JobId, wait_args: WaitArgs) -> Result<()> {
    let poller = JobPoller::new(Arc::new(client), wait_args.poll_config()?);
    let output = wait_with(&poller, run_id).await?;
    print_output(&output);
    Ok(())
}

/// Wait for a run with the poller's policy, cancelling the wait on Ctrl-C
pub async fn wait_with(poller: &JobPoller, run_id: &JobId) -> Result<RunOutput> {
    let cancel = cancel_on_ctrl_c();

    println!(
        "{}",
        format!(
            "Waiting for run {} (timeout {:?})...",
            run_id,
            poller.config().timeout
        )
        .dimmed()
    );

    let output = poller.wait(run_id, &cancel).await?;

    println!("{}", "✓ Run succeeded".green().bold());
    Ok(output)
}

/// Print a run result, pretty-printing JSON payloads
fn print_output(output: &RunOutput) {
    match output.json::<Value>() {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", output),
        },
        _ => println!("{}", output),
    }
}

/// Print detailed run information
fn print_run_details(run: &Run) {
    println!("{}", "Run Details:".bold());
    println!("  ID:        {}", run.id.to_string().cyan());
    println!("  Task:      {}", run.task);
    println!("  Status:    {}", colorize_status(run.status));
    println!(
        "  Created:   {}",
        run.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated:   {}",
        run.updated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(compute) = &run.compute {
        println!(
            "  Compute:   {} CPU, {} MB",
            compute.effective_cpu(),
            compute.effective_memory()
        );
    }

    if !run.parameters.is_empty() {
        println!("\n{}", "Parameters:".bold());
        for (key, value) in run.parameters.iter() {
            println!("  {} = {}", key.cyan(), value);
        }
    }

    if let Some(output) = run.output() {
        println!("\n{}", "Result:".bold());
        print_output(&output);
    }

    if let Some(error) = &run.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}
