//! voxq Player - command-line entry point
//!
//! Plays DCA files for one tenant through the in-process loopback
//! transport, pacing frames at the configured opus frame interval. Useful
//! for exercising the controller end to end without a chat platform.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use voxq_common::events::{PlaybackEvent, StopReason};
use voxq_common::logging::init_tracing;
use voxq_common::{ChannelId, TenantId};
use voxq_player::config::PlayerConfig;
use voxq_player::transport::{spawn_paced_sink, LoopbackTransport};
use voxq_player::{ControllerRegistry, DcaFileItem, PlayOutcome};

/// Command-line arguments for voxq-player
#[derive(Parser, Debug)]
#[command(name = "voxq-player")]
#[command(about = "Per-tenant opus playback controller")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "VOXQ_CONFIG")]
    config: Option<PathBuf>,

    /// Tenant (guild) to play for
    #[arg(short, long, default_value = "local")]
    tenant: String,

    /// Voice channel to join
    #[arg(long, default_value = "voice")]
    voice_channel: String,

    /// Text channel the request is attributed to
    #[arg(long)]
    text_channel: Option<String>,

    /// Re-append each finished item to the back of the queue
    #[arg(long = "loop")]
    loop_queue: bool,

    /// Replay each finished item immediately
    #[arg(long)]
    repeat: bool,

    /// Print playback events to stdout as JSON lines
    #[arg(long)]
    events: bool,

    /// DCA files to play, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_path) =
        PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging, "voxq_player=info").context("Failed to initialise logging")?;

    match &config_path {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file, using built-in defaults"),
    }
    config.log_summary();

    let (transport, mut sessions) = LoopbackTransport::new(config.transport.frame_capacity);
    let frame_interval = config.transport.frame_interval();
    tokio::spawn(async move {
        while let Some(session) = sessions.recv().await {
            spawn_paced_sink(session, frame_interval);
        }
    });

    let registry = ControllerRegistry::new(Arc::new(transport), &config.player);
    let mut events = registry.subscribe();

    let tenant = TenantId::from(args.tenant);
    let voice_channel = ChannelId::from(args.voice_channel);
    let text_channel = args.text_channel.map(ChannelId::from);

    for path in &args.files {
        let item = DcaFileItem::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        match registry
            .play(tenant.clone(), voice_channel.clone(), text_channel.clone(), Arc::new(item))
            .await
        {
            PlayOutcome::Started => info!("Started playback of {}", path.display()),
            PlayOutcome::Enqueued { position } => {
                info!("Queued {} at position {}", path.display(), position)
            }
        }
    }

    // The controller may already be gone if the join failed
    if args.loop_queue {
        if let Err(e) = registry.toggle_loop(&tenant).await {
            warn!("Could not enable loop: {}", e);
        }
    }
    if args.repeat {
        if let Err(e) = registry.toggle_repeat(&tenant).await {
            warn!("Could not enable repeat: {}", e);
        }
    }

    let reason = tokio::select! {
        reason = wait_for_stop(&mut events, &tenant, args.events) => reason,
        _ = shutdown_signal() => {
            registry.shutdown().await;
            wait_for_stop(&mut events, &tenant, args.events).await
        }
    };

    match reason {
        Some(StopReason::JoinFailed) => bail!("Could not join voice channel"),
        Some(reason) => info!("Playback finished: {:?}", reason),
        None => warn!("Event stream closed before playback finished"),
    }

    Ok(())
}

/// Wait for the tenant's controller to stop, optionally echoing events
async fn wait_for_stop(
    events: &mut broadcast::Receiver<PlaybackEvent>,
    tenant: &TenantId,
    echo: bool,
) -> Option<StopReason> {
    loop {
        match events.recv().await {
            Ok(event) => {
                if echo {
                    println!("{}", event.to_json());
                }
                if let PlaybackEvent::ControllerStopped { tenant: t, reason, .. } = &event {
                    if t == tenant {
                        return Some(*reason);
                    }
                }
            }
            Err(RecvError::Lagged(missed)) => warn!("Missed {} playback events", missed),
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
