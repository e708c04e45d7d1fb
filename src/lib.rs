//! Turnstile - Fixed-Window Request Rate Limiting
//!
//! This crate implements an in-memory fixed-window rate limiter with named,
//! pre-configured quotas, an axum middleware that gates routes behind them,
//! and a standalone HTTP decision service. State is process-local by design:
//! a restart clears all quotas.

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod ratelimit;
