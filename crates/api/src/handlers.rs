//! HTTP request handlers.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod health;
pub mod posts;
