//! Real-time synchronization core for the estate marketplace portal.
//!
//! One persistent WebSocket connection per authenticated identity is multiplexed
//! between chat messaging, presence tracking, notification delivery and
//! admin-issued session termination.

// layers
pub mod domain;
pub mod infrastructure;
pub mod realtime;
pub mod ui;

// crate-wide
pub mod config;
pub mod error;
