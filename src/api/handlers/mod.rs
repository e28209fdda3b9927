//! API route handlers.

pub mod auth;
pub mod health;
pub mod logs;
pub mod lots;
