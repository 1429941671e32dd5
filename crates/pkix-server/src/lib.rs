//! OCSP Responder and Forwarder
//!
//! This crate serves OCSP over HTTP on top of the `pkix-proto` message
//! implementation. It runs in one of two modes:
//!
//! - **Responder**: looks the requested CertID up in a store of pre-signed
//!   responses and replies with RFC 5019 caching headers
//! - **Forwarder**: validates the request locally, relays it to an upstream
//!   responder and replays the upstream reply
//!
//! Protocol errors are answered with unsigned OCSP error responses; HTTP
//! level problems (wrong method, wrong content type, empty body, upstream
//! failure) with a bare status line.
//!
//! # Example
//!
//! ```rust,no_run
//! use pkix_server::{Config, PkixServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("pkix.json")?;
//!     let server = PkixServer::from_config(&config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod forwarder;
pub mod responder;
pub mod server;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, ConfigError, Mode, StoreConfig, UpstreamConfig};
pub use dispatch::{outcome_for, recover, Outcome, ServiceError, Stage};
pub use forwarder::Forwarder;
pub use responder::{OcspHandler, Responder};
pub use server::{router, to_response, PkixServer, ServerError};
pub use store::{FsStore, Store, StoreError};
