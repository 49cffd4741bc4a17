//! Affirm demo binary.
//!
//! Runs several simulated devices over an in-process mesh: the first device
//! maps its surroundings, places a label and shares its map; the others adopt
//! it. Each device's final status is logged.
//!
//! # Usage
//!
//! ```bash
//! affirm-demo --peers 3 --label "You are enough"
//! RUST_LOG=affirm_core=debug affirm-demo --retries 3
//! ```

use std::{sync::Arc, time::Duration};

use affirm_core::{Environment, MappingStatus, Peer, TrackingState};
use affirm_proto::Transform;
use affirm_session::{
    BroadcastPolicy, MemoryMesh, RecordingRenderer, SessionConfig, SessionHandle,
    SessionLifecycleManager, SimulatedTracking, SystemEnv,
};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Affirm shared-world demo
#[derive(Parser, Debug)]
#[command(name = "affirm-demo")]
#[command(about = "Run a scripted multi-device Affirm session in memory")]
#[command(version)]
struct Args {
    /// Number of simulated devices
    #[arg(short, long, default_value = "3")]
    peers: usize,

    /// Label the first device places
    #[arg(short, long, default_value = "You are loved")]
    label: String,

    /// Broadcast retry attempts (0 for best effort)
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

struct Device {
    handle: SessionHandle,
    tracking: SimulatedTracking,
    renderer: RecordingRenderer,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if args.peers < 2 {
        return Err("need at least two peers to share a world".into());
    }

    let policy = match args.retries {
        0 => BroadcastPolicy::BestEffort,
        n => BroadcastPolicy::Retry { max_attempts: n, initial_backoff_ms: 50 },
    };

    let env = SystemEnv::new();
    let mesh = MemoryMesh::new();
    let mut devices = Vec::with_capacity(args.peers);

    for i in 1..=args.peers {
        let name = format!("device-{i}");
        let channel = Arc::new(mesh.join(Peer::new(env.random_u64(), name.as_str())));
        let tracking = SimulatedTracking::new(format!("feature points of {name}").into_bytes());
        let renderer = RecordingRenderer::new();
        let config =
            SessionConfig { display_name: name, broadcast_policy: policy, ..SessionConfig::default() };

        let handle = SessionLifecycleManager::start(
            config,
            env,
            channel,
            Arc::new(tracking.clone()),
            Arc::new(renderer.clone()),
        )
        .await?;
        devices.push(Device { handle, tracking, renderer });
    }

    let Some(host) = devices.first() else {
        return Err("no devices started".into());
    };
    tracing::info!(host = %host.handle.local_peer(), "host maps the room");

    host.tracking.set_mapped(true);
    host.handle.frame_updated(MappingStatus::Mapped, TrackingState::Normal)?;
    host.handle.select_label(args.label.as_str())?;
    host.handle.tap(Transform::translation(0.0, 0.0, -0.5))?;
    host.handle.share_map()?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    for device in &devices {
        let status = device.handle.status().await?;
        tracing::info!(
            peer = %device.handle.local_peer(),
            anchors = status.anchor_count,
            visible = device.renderer.visible().len(),
            provider = ?status.map_provider.as_ref().map(|p| p.display_name.as_str()),
            message = %status.message(),
            "device status"
        );
    }

    for device in devices {
        device.handle.shutdown().await?;
    }

    Ok(())
}
