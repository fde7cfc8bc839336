//! Request extractors shared across handlers.

pub mod auth;
pub mod client_ip;
