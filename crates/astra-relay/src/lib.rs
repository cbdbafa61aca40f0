//! # astra-relay
//!
//! Real-time WebSocket relay for the Astra sensory gym.
//!
//! A client opens `/ws/sensory-gym?token=...`; the token is validated before
//! the upgrade is accepted. Each accepted connection becomes a
//! [`session::RelaySession`] registered in the process-wide
//! [`registry::ConnectionRegistry`] (one live session per user), and a
//! [`bridge::UpstreamBridge`] task opens the paired connection to the
//! hand-tracking service and pumps landmark frames back through the registry
//! to the client, in arrival order.
//!
//! - Cooperative cancellation via `CancellationToken` at every await point
//! - Bounded per-client send queues; drops are counted, never block a bridge
//! - Idempotent teardown: exactly one registry removal per session, whichever
//!   side closes first
//! - `/health` and `/metrics` endpoints, graceful shutdown via
//!   [`shutdown::ShutdownCoordinator`]

#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod connection;
pub mod handler;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
