//! Security layer: path validation, host/command filtering, rate limiting.
//!
//! Every tool call passes through some subset of this module before any
//! network round-trip happens.

pub mod filter;
pub mod path;
pub mod ratelimit;

pub use filter::Filter;
pub use path::{validate_filename, validate_local_path, validate_path};
pub use ratelimit::RateLimiter;
