use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    config, ColorSelection, HttpRenderBackend, JobController, JobEvent, PollScheduler,
    RenderBackend, Rgba, SyncRenderController,
};
use shared::domain::{RenderArtifact, RenderParameters};

#[derive(Parser, Debug)]
#[command(about = "Submit a waveform render job and save the resulting animation")]
struct Args {
    /// Rendering service base URL; falls back to client.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Foreground color as #rrggbb or #rrggbbaa.
    #[arg(long)]
    fg_color: Option<String>,
    /// Background color as #rrggbb or #rrggbbaa.
    #[arg(long)]
    bg_color: Option<String>,
    /// Frames per second for the animation.
    #[arg(long)]
    frames: Option<u32>,
    /// Extra render parameters as NAME=VALUE pairs, passed through verbatim.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,
    /// Use the one-shot synchronous render path instead of the job protocol.
    #[arg(long)]
    sync: bool,
    /// Where to write the rendered animation.
    #[arg(long, default_value = "waveform.webp")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }

    let mut params = RenderParameters::new();
    if let Some(frames) = args.frames {
        params.insert("frames", frames.to_string());
    }
    for pair in &args.params {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("invalid --param '{pair}', expected NAME=VALUE");
        };
        params.insert(name, value);
    }
    ColorSelection {
        foreground: parse_color(args.fg_color.as_deref()).context("invalid --fg-color")?,
        background: parse_color(args.bg_color.as_deref()).context("invalid --bg-color")?,
    }
    .apply(&mut params);

    let backend: Arc<dyn RenderBackend> = Arc::new(HttpRenderBackend::new(
        &settings.server_url,
        settings.request_timeout,
    )?);

    let artifact = if args.sync {
        SyncRenderController::new(backend).render(&params).await?
    } else {
        run_job_lifecycle(backend, &settings, params).await?
    };

    std::fs::write(&args.output, &artifact.bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Saved {} ({} bytes, {})",
        args.output.display(),
        artifact.bytes.len(),
        artifact.content_type
    );
    Ok(())
}

fn parse_color(input: Option<&str>) -> Result<Option<Rgba>> {
    input
        .map(|hex| Rgba::parse_hex(hex).map_err(Into::into))
        .transpose()
}

async fn run_job_lifecycle(
    backend: Arc<dyn RenderBackend>,
    settings: &client_core::ClientSettings,
    params: RenderParameters,
) -> Result<RenderArtifact> {
    let controller = JobController::new(
        backend,
        PollScheduler::new(settings.poll_interval, settings.max_poll_ticks),
    );
    let mut events = controller.subscribe();
    controller.start(params).await?;

    loop {
        match events.recv().await? {
            JobEvent::Polling { job_id } => {
                println!("Job {job_id} accepted, waiting for completion...");
            }
            JobEvent::Status { state, .. } => println!("Status: {state}"),
            JobEvent::Ready { artifact } => return Ok(artifact),
            JobEvent::Failed { error } => bail!("render job failed: {error}"),
            _ => {}
        }
    }
}
