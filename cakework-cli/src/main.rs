//! Cakework CLI
//!
//! Command-line interface for submitting runs to the Cakework job service
//! and waiting for their results.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cakework")]
#[command(about = "Cakework job service CLI", long_about = None)]
struct Cli {
    /// Job service URL
    #[arg(
        long,
        env = "CAKEWORK_ENDPOINT",
        default_value = "http://localhost:8080"
    )]
    endpoint: String,

    /// Access token sent with every request
    #[arg(long, env = "CAKEWORK_TOKEN", hide_env_values = true)]
    token: String,

    /// App the tasks are registered under
    #[arg(long, env = "CAKEWORK_APP")]
    app: String,

    /// Log client activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "cakework=debug,cakework_client=debug"
    } else {
        "cakework=info,cakework_client=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config {
        endpoint: cli.endpoint,
        token: cli.token,
        app: cli.app,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use commands::RunCommands;
    use serde_json::json;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_submit_params() {
        let cli = Cli::try_parse_from([
            "cakework", "--token", "secret", "--app", "demo", "run", "submit", "say_hello", "-p",
            "name=jessie", "-p", "age=34", "--memory", "512", "--wait",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                command:
                    RunCommands::Submit {
                        task,
                        params,
                        cpu,
                        memory,
                        wait,
                        ..
                    },
            } => {
                assert_eq!(task, "say_hello");
                assert_eq!(
                    params,
                    vec![
                        ("name".to_string(), json!("jessie")),
                        ("age".to_string(), json!(34)),
                    ]
                );
                assert_eq!(cpu, None);
                assert_eq!(memory, Some(512));
                assert!(wait);
            }
            _ => panic!("expected run submit"),
        }
    }

    #[test]
    fn test_rejects_malformed_param() {
        let result = Cli::try_parse_from([
            "cakework", "--token", "secret", "--app", "demo", "run", "submit", "say_hello", "-p",
            "no-equals-sign",
        ]);
        assert!(result.is_err());
    }
}
