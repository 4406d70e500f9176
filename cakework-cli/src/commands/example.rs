//! Typed example tasks
//!
//! `hello` and `image` submit through the typed request structs rather than
//! a raw parameter bag.

use std::sync::Arc;

use anyhow::{Context, Result};
use cakework_client::JobPoller;
use cakework_core::task::{GenerateImage, GeneratedImage, SayHello};
use clap::Args;
use colored::*;

use super::WaitArgs;
use super::run::wait_with;
use crate::config::Config;

#[derive(Args)]
pub struct HelloArgs {
    /// Who to greet
    name: String,

    #[command(flatten)]
    wait_args: WaitArgs,
}

#[derive(Args)]
pub struct ImageArgs {
    /// What to draw
    prompt: String,

    /// Rendering style
    #[arg(long, default_value = "oil painting")]
    style: String,

    /// Public URL of the bucket the images are stored in
    #[arg(
        long,
        env = "CAKEWORK_BUCKET_URL",
        default_value = "https://cakework-images.s3.amazonaws.com"
    )]
    bucket_url: String,

    #[command(flatten)]
    wait_args: WaitArgs,
}

pub async fn hello(args: HelloArgs, config: &Config) -> Result<()> {
    let poller = JobPoller::new(Arc::new(config.client()?), args.wait_args.poll_config()?);

    let run_id = poller.submit_task(&SayHello { name: args.name }).await?;
    let output = wait_with(&poller, &run_id).await?;

    println!("{}", output.as_str().bold());
    Ok(())
}

pub async fn image(args: ImageArgs, config: &Config) -> Result<()> {
    let poller = JobPoller::new(Arc::new(config.client()?), args.wait_args.poll_config()?);

    let request = GenerateImage {
        prompt: args.prompt,
        style: args.style,
    };
    let run_id = poller.submit_task(&request).await?;
    let output = wait_with(&poller, &run_id).await?;

    let image: GeneratedImage = output
        .json()
        .with_context(|| format!("Unexpected result for run {}: {}", run_id, output))?;

    println!("{}", image.url(&args.bucket_url).cyan());
    Ok(())
}
