//! # golf-server
//!
//! HTTP front-end for the golf build-and-measure service.
//!
//! Contributors upload an assembly source through a multipart form; the
//! server builds it in a fresh sandbox, measures the binary and keeps the
//! smallest size per contributor in the highscore list.

pub mod config;
pub mod http;
pub mod server;
pub mod types;

pub use config::{ConfigError, GolfConfig, MAX_BODY_BYTES, MAX_NAME_CHARS};
pub use server::{GolfServer, SubmitForm};
