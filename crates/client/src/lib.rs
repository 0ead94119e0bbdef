//! Transport for the remote job service.
//!
//! Provides the [`JobService`](service::JobService) seam the explorer
//! talks to, its HTTP implementation over [`reqwest`], bearer-token
//! providers, and environment-driven configuration.

pub mod auth;
pub mod config;
pub mod decode;
pub mod http;
pub mod service;

pub use auth::{AuthProvider, StaticTokenProvider, Token};
pub use config::{ClientConfig, ConfigError, Endpoint};
pub use http::HttpJobService;
pub use service::JobService;
