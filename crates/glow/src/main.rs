use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use glow_core::{
    shutdown_signal, ConfigManager, EffectDescription, StreamController, StreamError,
};

mod bridge;

use bridge::ManualBridge;

/// Streams keyframe lighting effects to an entertainment group.
#[derive(Parser, Debug)]
#[command(name = "glow")]
#[command(about = "Real-time light streaming over DTLS")]
struct Args {
    /// Path to the configuration file (default: glow.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entertainment group to stream to
    #[arg(short, long)]
    group: String,

    /// Effect description file to queue, in order (repeatable)
    #[arg(short, long = "effect")]
    effects: Vec<PathBuf>,

    /// Cut the idle animation short and start the first queued effect immediately
    #[arg(long)]
    play: bool,

    /// Override the configured bridge address
    #[arg(long, value_parser = parse_ip)]
    bridge_ip: Option<IpAddr>,

    /// Override the configured channel count of the group
    #[arg(long)]
    channels: Option<usize>,
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load().context("Failed to load configuration")?;
    if let Some(ip) = args.bridge_ip {
        settings.bridge_ip = ip.to_string();
    }
    if let Some(channels) = args.channels {
        settings.channel_count = channels;
    }
    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow::anyhow!("Invalid settings: {}", errors.join(", ")))?;

    let connector = settings
        .connector()
        .with_context(|| format!("Cannot stream with {}", config.config_path().display()))?;
    let bridge = ManualBridge::new(settings.channel_count);
    let grace = settings.shutdown_grace();

    log::info!(
        "Streaming to group {} via {}:{} ({})",
        args.group,
        settings.bridge_ip,
        settings.stream_port,
        settings.color_space.as_str()
    );

    let mut controller = StreamController::new(Arc::new(bridge), Arc::new(connector), settings);
    controller
        .connect(&args.group)
        .await
        .context("Failed to start streaming")?;

    let result = queue_effects(&controller, &args).await;
    match &result {
        Ok(()) => {
            log::info!("Streaming, press Ctrl-C to stop");
            shutdown_signal().await;
        }
        Err(e) => log::error!("{:#}", e),
    }

    if let Ok(status) = controller.status().await {
        log::info!(
            "Stopping in state {:?} with {} effects still queued",
            status.state,
            status.queued
        );
    }

    if let Err(e) = controller.shutdown_within(grace).await {
        log::error!("{}", e);
        std::process::exit(1);
    }

    result
}

async fn queue_effects(controller: &StreamController, args: &Args) -> anyhow::Result<()> {
    for path in &args.effects {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let description = EffectDescription::from_json(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let queued = controller.enqueue_description(description).await?;
        log::info!("Queued {} ({} waiting)", path.display(), queued);
    }

    if args.play {
        match controller.play_next().await {
            Ok(()) => log::info!("Playing first queued effect"),
            Err(StreamError::QueueEmpty) => log::warn!("Nothing queued to play"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
