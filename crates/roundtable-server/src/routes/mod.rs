//! Route handlers, grouped by resource.

pub mod auth;
pub mod games;
pub mod health;
pub mod rooms;
pub mod ws;
