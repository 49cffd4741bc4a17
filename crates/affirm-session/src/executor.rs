//! Action execution for the session runtime.
//!
//! The controller returns actions; this module performs them. Rendering runs
//! inline on the event loop. Broadcasts and tracking calls are handed to two
//! ordered workers so the loop never waits on the network or on a tracking
//! restart.

use std::{sync::Arc, time::Duration};

use affirm_core::{Environment, SyncAction, SyncEvent};
use affirm_proto::{Anchor, MessageKind, WorldMap};
use bytes::Bytes;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    channel::{ChannelError, PeerChannel},
    renderer::Renderer,
    session::Command,
    tracking::TrackingSystem,
};

/// Policy for handling broadcast send failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastPolicy {
    /// Log failure and drop the message.
    #[default]
    BestEffort,

    /// Retry failed sends with exponential backoff.
    Retry {
        /// Maximum number of retry attempts
        max_attempts: u32,
        /// Initial backoff duration in milliseconds
        initial_backoff_ms: u64,
    },
}

impl BroadcastPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` once retries
    /// are exhausted.
    pub fn backoff(self, attempt: u32) -> Option<Duration> {
        match self {
            Self::BestEffort => None,
            Self::Retry { max_attempts, initial_backoff_ms } => {
                if attempt == 0 || attempt > max_attempts {
                    return None;
                }
                let factor = 1u64 << (attempt - 1).min(16);
                Some(Duration::from_millis(initial_backoff_ms.saturating_mul(factor)))
            },
        }
    }
}

/// Encoded message waiting for the outbound worker.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub(crate) kind: MessageKind,
    pub(crate) payload: Bytes,
}

/// Work for the tracking worker.
#[derive(Debug)]
pub(crate) enum TrackingJob {
    Snapshot { request: u64 },
    ApplyBaseMap { swap: u64, map: WorldMap },
    Reset,
    AddAnchor(Anchor),
}

/// Dispatches controller actions to the renderer and the workers.
pub(crate) struct ActionExecutor<R> {
    renderer: Arc<R>,
    outbound: UnboundedSender<Outbound>,
    tracking: UnboundedSender<TrackingJob>,
}

impl<R: Renderer> ActionExecutor<R> {
    pub(crate) fn new(
        renderer: Arc<R>,
        outbound: UnboundedSender<Outbound>,
        tracking: UnboundedSender<TrackingJob>,
    ) -> Self {
        Self { renderer, outbound, tracking }
    }

    pub(crate) fn execute(&self, actions: Vec<SyncAction>) {
        for action in actions {
            match action {
                SyncAction::Broadcast { kind, payload } => {
                    if self.outbound.send(Outbound { kind, payload }).is_err() {
                        tracing::warn!(%kind, "outbound worker gone, dropping broadcast");
                    }
                },
                SyncAction::RequestSnapshot { request } => {
                    self.submit(TrackingJob::Snapshot { request });
                },
                SyncAction::ApplyBaseMap { swap, map } => {
                    self.submit(TrackingJob::ApplyBaseMap { swap, map });
                },
                SyncAction::ResetTracking => self.submit(TrackingJob::Reset),
                SyncAction::AnchorAdded(anchor) => {
                    self.renderer.on_anchor_added(&anchor);
                    self.submit(TrackingJob::AddAnchor(anchor));
                },
                SyncAction::AnchorsCleared => self.renderer.on_clear_all(),
            }
        }
    }

    fn submit(&self, job: TrackingJob) {
        if self.tracking.send(job).is_err() {
            tracing::warn!("tracking worker gone, dropping job");
        }
    }
}

/// Send one payload according to `policy`.
pub(crate) async fn send_with_policy<E, C>(
    env: &E,
    channel: &C,
    policy: BroadcastPolicy,
    payload: Bytes,
) -> Result<(), ChannelError>
where
    E: Environment,
    C: PeerChannel + ?Sized,
{
    let mut attempt = 0;
    loop {
        match channel.broadcast(payload.clone()).await {
            Ok(()) => return Ok(()),
            Err(ChannelError::Closed) => return Err(ChannelError::Closed),
            Err(e) => {
                attempt += 1;
                let Some(delay) = policy.backoff(attempt) else {
                    return Err(e);
                };
                tracing::debug!(attempt, ?delay, error = %e, "broadcast failed, retrying");
                env.sleep(delay).await;
            },
        }
    }
}

/// Drain outbound messages in order, one at a time.
pub(crate) fn spawn_outbound_worker<E, C>(
    env: E,
    channel: Arc<C>,
    policy: BroadcastPolicy,
    mut rx: UnboundedReceiver<Outbound>,
) -> JoinHandle<()>
where
    E: Environment,
    C: PeerChannel + 'static,
{
    tokio::spawn(async move {
        while let Some(Outbound { kind, payload }) = rx.recv().await {
            let len = payload.len();
            match send_with_policy(&env, channel.as_ref(), policy, payload).await {
                Ok(()) => tracing::debug!(%kind, len, "broadcast sent"),
                Err(e) => tracing::warn!(%kind, len, error = %e, "broadcast dropped"),
            }
        }
        tracing::debug!("outbound worker stopped");
    })
}

/// Run tracking jobs in order and post completions back to the event loop.
pub(crate) fn spawn_tracking_worker<T>(
    tracking: Arc<T>,
    mut rx: UnboundedReceiver<TrackingJob>,
    events: UnboundedSender<Command>,
) -> JoinHandle<()>
where
    T: TrackingSystem + 'static,
{
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let completions = run_job(tracking.as_ref(), job).await;
            if completions.into_iter().any(|event| events.send(Command::Event(event)).is_err()) {
                break;
            }
        }
        tracing::debug!("tracking worker stopped");
    })
}

async fn run_job<T: TrackingSystem + ?Sized>(tracking: &T, job: TrackingJob) -> Vec<SyncEvent> {
    match job {
        TrackingJob::Snapshot { request } => {
            let result = tracking.current_snapshot().await.map_err(|e| e.to_string());
            vec![SyncEvent::SnapshotReady { request, result }]
        },
        TrackingJob::ApplyBaseMap { swap, map } => match tracking.apply_base_map(&map).await {
            Ok(()) => vec![SyncEvent::BaseMapApplied { swap }],
            Err(e) => {
                tracing::warn!(swap, error = %e, "applying base map failed");
                vec![SyncEvent::BaseMapFailed { swap, reason: e.to_string() }]
            },
        },
        TrackingJob::Reset => match tracking.reset_fresh().await {
            Ok(()) => vec![],
            Err(e) => vec![SyncEvent::SessionFailed { reason: e.to_string() }],
        },
        TrackingJob::AddAnchor(anchor) => {
            tracking.add_anchor(&anchor).await;
            vec![]
        },
    }
}
