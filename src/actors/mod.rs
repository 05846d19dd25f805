//! Actor-based runtime around the [`NetworkMonitor`](crate::monitor::NetworkMonitor)
//!
//! Each actor runs as an independent async task communicating via Tokio
//! channels. The monitor itself is shared state; the actors drive it and
//! react to what it publishes.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  +-----------------+
//!                  |   Hub (main)    |
//!                  +--------+--------+
//!                           | spawns
//!                  +--------v--------+    probes    +---------------+
//!                  | SchedulerActor  +------------->+ ProbeExecutor |
//!                  +--------+--------+              +---------------+
//!                           | apply_measurement
//!                  +--------v--------+
//!                  | NetworkMonitor  |
//!                  +--------+--------+
//!                           | MonitorEvent (broadcast)
//!           +---------------+---------------+
//!           |               |               |
//!   +-------v------+ +------v-------+ +-----v------+
//!   | StorageActor | | NotifierActor| |  WebSocket |
//!   +--------------+ +--------------+ +------------+
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control messages
//! 2. **Events**: the monitor publishes to a broadcast channel for fan-out
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod messages;
pub mod notifier;
pub mod scheduler;
pub mod storage;
