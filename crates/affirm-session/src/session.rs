//! Session lifecycle and event loop.
//!
//! One task owns the [`SyncController`]. Every input reaches it through a
//! single unbounded queue: user intents from the [`SessionHandle`], inbound
//! payloads from the channel's receive handler, and completions from the
//! tracking worker. That queue is the serialization domain; nothing else
//! touches controller state.
//!
//! ```text
//! SessionHandle ──┐
//! PeerChannel ────┼──> queue ──> event loop ──> ActionExecutor ──┬──> Renderer
//! tracking worker ┘       ^                                      ├──> outbound worker ──> PeerChannel
//!                         └──────────────────────────────────────┴──> tracking worker ──> TrackingSystem
//! ```

use std::sync::Arc;

use affirm_core::{
    Environment, MappingStatus, Peer, SessionStatus, SyncController, SyncEvent, TrackingState,
};
use affirm_proto::Transform;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    channel::PeerChannel,
    config::SessionConfig,
    error::SessionError,
    executor::{ActionExecutor, spawn_outbound_worker, spawn_tracking_worker},
    renderer::Renderer,
    tracking::TrackingSystem,
};

/// Input to the event loop.
#[derive(Debug)]
pub(crate) enum Command {
    Event(SyncEvent),
    Status(oneshot::Sender<SessionStatus>),
    Shutdown,
}

/// Starts sessions.
pub struct SessionLifecycleManager;

impl SessionLifecycleManager {
    /// Start tracking, register the receive handler and spawn the event loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Config` if `config` is invalid
    /// - `TrackingUnsupported` if the device cannot track (fatal)
    /// - `Tracking` if tracking fails to start
    pub async fn start<E, C, T, R>(
        config: SessionConfig,
        env: E,
        channel: Arc<C>,
        tracking: Arc<T>,
        renderer: Arc<R>,
    ) -> Result<SessionHandle, SessionError>
    where
        E: Environment,
        C: PeerChannel + 'static,
        T: TrackingSystem + 'static,
        R: Renderer + 'static,
    {
        config.validate().map_err(SessionError::Config)?;

        if !tracking.is_supported() {
            tracing::error!("world tracking unsupported, not starting session");
            return Err(SessionError::TrackingUnsupported);
        }
        tracking.start(config.plane_detection).await?;

        let local = channel.local_peer();
        let (commands, queue) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (tracking_tx, tracking_rx) = mpsc::unbounded_channel();

        commands
            .send(Command::Event(SyncEvent::SessionStarted))
            .map_err(|_| SessionError::Closed)?;

        let inbound = commands.clone();
        channel.on_receive(Box::new(move |bytes, from| {
            if inbound.send(Command::Event(SyncEvent::DataReceived { bytes, from })).is_err() {
                tracing::trace!("session stopped, dropping inbound payload");
            }
        }));

        let outbound_worker = spawn_outbound_worker(
            env.clone(),
            Arc::clone(&channel),
            config.broadcast_policy,
            outbound_rx,
        );
        let tracking_worker =
            spawn_tracking_worker(Arc::clone(&tracking), tracking_rx, commands.clone());

        let event_loop = EventLoop {
            controller: SyncController::new(env),
            executor: ActionExecutor::new(renderer, outbound_tx, tracking_tx),
            channel,
            tracking,
        };
        let task = tokio::spawn(event_loop.run(queue, outbound_worker, tracking_worker));

        tracing::info!(peer = %local, name = %config.display_name, "session started");
        Ok(SessionHandle { commands, local, task: Some(task) })
    }
}

struct EventLoop<E: Environment, C, T, R> {
    controller: SyncController<E>,
    executor: ActionExecutor<R>,
    channel: Arc<C>,
    tracking: Arc<T>,
}

impl<E, C, T, R> EventLoop<E, C, T, R>
where
    E: Environment,
    C: PeerChannel,
    T: TrackingSystem,
    R: Renderer,
{
    async fn run(
        mut self,
        mut queue: mpsc::UnboundedReceiver<Command>,
        outbound_worker: JoinHandle<()>,
        tracking_worker: JoinHandle<()>,
    ) {
        while let Some(command) = queue.recv().await {
            match command {
                Command::Event(event) => self.dispatch(event),
                Command::Status(reply) => {
                    let peers = self.channel.current_peers();
                    let _ = reply.send(self.controller.status(&peers));
                },
                Command::Shutdown => break,
            }
        }

        // Closing the worker queues lets both workers finish what they hold.
        let Self { executor, tracking, .. } = self;
        drop(executor);
        if let Err(e) = outbound_worker.await {
            tracing::error!(error = %e, "outbound worker panicked");
        }
        if let Err(e) = tracking_worker.await {
            tracing::error!(error = %e, "tracking worker panicked");
        }

        tracking.pause().await;
        tracing::info!("session stopped");
    }

    fn dispatch(&mut self, event: SyncEvent) {
        match self.controller.handle(event) {
            Ok(actions) => self.executor.execute(actions),
            Err(e) if e.is_fatal() => tracing::error!(error = %e, "controller invariant violated"),
            Err(e) if e.is_user_actionable() => tracing::info!(error = %e, "request not possible"),
            Err(e) => tracing::debug!(error = %e, "event rejected"),
        }
    }
}

/// Handle to a running session.
///
/// Every method enqueues and returns immediately; none waits on the network.
/// Dropping the handle stops the session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    local: Peer,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// This device's identity.
    pub fn local_peer(&self) -> &Peer {
        &self.local
    }

    /// Choose the label the next tap places.
    pub fn select_label(&self, label: impl Into<String>) -> Result<(), SessionError> {
        self.send(SyncEvent::SelectLabel { label: label.into() })
    }

    /// Place `label` at `transform` and share it.
    pub fn place_anchor(
        &self,
        label: impl Into<String>,
        transform: Transform,
    ) -> Result<(), SessionError> {
        self.send(SyncEvent::PlaceAnchor { label: label.into(), transform })
    }

    /// Report a tap on a surface at `transform`.
    pub fn tap(&self, transform: Transform) -> Result<(), SessionError> {
        self.send(SyncEvent::SurfaceTapped { transform })
    }

    /// Share the current map with every peer.
    pub fn share_map(&self) -> Result<(), SessionError> {
        self.send(SyncEvent::ShareMap)
    }

    /// Clear the world locally. Ignored unless `confirmed`.
    pub fn reset_world(&self, confirmed: bool) -> Result<(), SessionError> {
        self.send(SyncEvent::ResetWorld { confirmed })
    }

    /// Feed the latest frame's tracking inputs.
    pub fn frame_updated(
        &self,
        mapping: MappingStatus,
        tracking: TrackingState,
    ) -> Result<(), SessionError> {
        self.send(SyncEvent::FrameUpdated { mapping, tracking })
    }

    /// Tracking was interrupted.
    pub fn interrupted(&self) -> Result<(), SessionError> {
        self.send(SyncEvent::SessionInterrupted)
    }

    /// Tracking resumed.
    pub fn interruption_ended(&self) -> Result<(), SessionError> {
        self.send(SyncEvent::InterruptionEnded)
    }

    /// Tracking failed.
    pub fn failed(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.send(SyncEvent::SessionFailed { reason: reason.into() })
    }

    /// Status after every previously enqueued command has been processed.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Status(reply)).map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the event loop, flush both workers and pause tracking.
    pub async fn shutdown(mut self) -> Result<(), SessionError> {
        self.commands.send(Command::Shutdown).map_err(|_| SessionError::Closed)?;
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                tracing::error!(error = %e, "session task panicked");
                SessionError::Closed
            })?;
        }
        Ok(())
    }

    fn send(&self, event: SyncEvent) -> Result<(), SessionError> {
        self.commands.send(Command::Event(event)).map_err(|_| SessionError::Closed)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}
