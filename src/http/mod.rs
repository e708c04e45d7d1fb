//! HTTP surface: the quota gate middleware and the decision server.

pub mod gate;
pub mod server;

pub use gate::{enforce_quota, QuotaGate};
pub use server::HttpServer;
