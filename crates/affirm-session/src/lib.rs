//! Affirm session runtime.
//!
//! Drives an [`affirm_core::SyncController`] against real collaborators:
//! - a [`PeerChannel`] for multicast to co-located peers
//! - a [`TrackingSystem`] for the device's world tracking
//! - a [`Renderer`] for drawing anchors
//!
//! ## Architecture
//!
//! ```text
//! affirm-session
//!   ├─ SessionLifecycleManager  (startup, capability check)
//!   ├─ SessionHandle            (non-blocking user intents, status)
//!   ├─ event loop               (single consumer, owns the controller)
//!   ├─ ActionExecutor           (renderer inline, ordered workers)
//!   ├─ MemoryMesh               (in-process PeerChannel)
//!   ├─ SimulatedTracking        (in-memory TrackingSystem)
//!   └─ SystemEnv                (production Environment impl)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod error;
mod executor;
mod memory;
mod renderer;
mod session;
mod system_env;
mod tracking;

pub use channel::{ChannelError, PeerChannel, ReceiveHandler};
pub use config::{MAX_DISPLAY_NAME_LEN, SessionConfig};
pub use error::SessionError;
pub use executor::BroadcastPolicy;
pub use memory::{MemoryChannel, MemoryMesh};
pub use renderer::{RecordingRenderer, Renderer};
pub use session::{SessionHandle, SessionLifecycleManager};
pub use system_env::SystemEnv;
pub use tracking::{PlaneDetection, SimulatedTracking, TrackingError, TrackingSystem};
