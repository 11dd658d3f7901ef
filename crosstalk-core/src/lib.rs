//! # Crosstalk Core
//!
//! The core of a multi-protocol chat bridge: an in-process event bus that
//! federates user presence and messages across heterogeneous chat
//! transports, so that a named channel can span two or more of them and
//! appear on each side as a single room populated by local-looking users.
//!
//! # Key Components
//!
//! *   [`manager::BridgeManager`]: the event loop. Bridges enqueue events
//!     into a single FIFO; the manager translates, applies its bookkeeping,
//!     expands the target into a recipient set and delivers to each bridge.
//! *   [`bridge::Bridge`]: the contract a transport implements — lifecycle
//!     hooks, a provided dispatch that keeps a local channel mirror current,
//!     and command routing.
//! *   [`target`]: the well-known broadcast addresses, expanded at dispatch
//!     time.
//! *   [`command`]: shell-style argument splitting and the registry of
//!     callable commands.

/// The bridge contract: the trait the manager drives, per-bridge plumbing,
/// puppet bookkeeping and departure debouncing.
pub mod bridge;
/// Authoritative channel membership state, owned by the manager.
pub mod channel;
/// Argument splitting and the command registry.
pub mod command;
/// Configuration structures shared by transports.
pub mod config;
/// The error taxonomy: user errors, state errors, bus failures.
pub mod error;
/// Identity tokens and the event value type.
pub mod event;
/// The Bridge Manager and its queue handle.
pub mod manager;
/// Cross-bridge mention sigils.
pub mod mention;
/// Broadcast target constants.
pub mod target;
