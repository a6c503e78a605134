//! vidflow library crate.
//!
//! A local job queue and workflow engine for turning raw recordings into
//! published shorts and articles.

pub mod ai;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod utils;

pub use error::{Error, Result};
