//! Utility modules: logging setup and the pool event log.
pub mod devlog;
pub mod logger;
