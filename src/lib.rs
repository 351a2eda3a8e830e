//! Tradekeeper
//!
//! A trading-discipline journal: trades are logged through an admission
//! pipeline that enforces per-trade risk caps, a daily loss cap with a
//! day-lock, and a maximum trade count per day.

pub mod application;
pub mod config;
pub mod domain;
pub mod persistence;
