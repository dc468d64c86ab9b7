//! Runtime adapters for Lantern (persistence, user config).

pub mod cache;
pub mod config;
mod fsutil;
