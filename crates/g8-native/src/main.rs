#![warn(clippy::all, rust_2018_idioms)]

mod embed;
mod headless;

use anyhow::{Context, anyhow, bail};
use clap::Parser;
use g8_link::prelude::*;
use log::{info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the emulator link end to end with a headless module
#[derive(Debug, Parser)]
#[command(name = "g8-native", version)]
struct Args {
    /// ROM to load once the module is ready
    rom: Option<PathBuf>,

    /// CPU speed: slow, normal, fast, or the preset's Hz value
    #[arg(long)]
    speed: Option<SpeedPreset>,

    /// JSON file overriding the default bridge configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            BridgeConfig::from_json_str(&json)?
        }
        None => BridgeConfig::default(),
    };

    let (command_outbox, command_rx) = link(ContextId::HOST);
    let (signal_outbox, signal_rx) = link(ContextId::EMBED);

    let embed = embed::spawn(config.clone(), signal_outbox, command_rx)
        .context("Failed to start embedded context")?;

    let mut host = HostController::new(ContextId::EMBED, command_outbox, &config)
        .with_observer(|change| info!("[host] {change:?}"));

    // Controls stay disabled until the handshake completes
    let deadline = Instant::now() + READY_TIMEOUT;
    while !host.is_ready() {
        match signal_rx.recv_deadline(deadline) {
            Ok(envelope) => {
                host.receive(&envelope.source, Some(envelope.message));
            }
            Err(_) => {
                host.teardown();
                bail!("Embedded module never became ready");
            }
        }
    }

    if let Some(path) = args.rom {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        if !name.as_deref().is_some_and(|n| config.accepts_file(n)) {
            warn!(
                "{} does not have an accepted extension ({})",
                path.display(),
                config.accept_attribute()
            );
        }
        if let Some((path, ticket)) = host.select_file(Some(path)) {
            let read = std::fs::read(&path);
            let submission = host.finish_load(ticket, read);
            info!("[host] load {}: {submission:?}", path.display());
        }
    }

    let speed = args.speed.unwrap_or(config.default_speed);
    host.submit(Intent::SetSpeed(speed));
    host.submit(Intent::TogglePause);
    host.submit(Intent::TogglePause);
    host.submit(Intent::Reset);

    // Focus signals may still be in flight
    for envelope in signal_rx.try_iter() {
        host.receive(&envelope.source, Some(envelope.message));
    }
    info!(
        "[host] ready={} focus={:?} paused={} speed={}",
        host.is_ready(),
        host.focus(),
        host.paused(),
        speed.label()
    );

    host.teardown();
    drop(host);

    let report = embed
        .join()
        .map_err(|_| anyhow!("Embedded context panicked"))?;
    println!("{report:#?}");
    Ok(())
}
