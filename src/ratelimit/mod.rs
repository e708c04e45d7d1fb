//! Fixed-window rate limiting core.

pub mod limiter;
pub mod registry;
pub mod store;

pub use limiter::{Decision, RateLimiter};
pub use registry::{LimiterRegistry, LimiterScope};
pub use store::{LimiterStore, StoreKey, WindowRecord};
