//! Data Transfer Objects (DTOs) for the realtime core.
//!
//! DTOs are organized by protocol:
//! - `websocket`: envelope, event names and event payload DTOs
//! - `http`: notification REST API DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
