//! Infrastructure layer: wire DTOs and adapters for the domain gateways.

pub mod credential;
pub mod dto;
pub mod rest;
pub mod transport;
