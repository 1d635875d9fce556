//! Waitlist sign-up service: validation, rate limiting, and document-store persistence.

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod storage;
pub mod telemetry;
pub mod waitlist;
