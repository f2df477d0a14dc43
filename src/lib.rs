//! A bounded connection-pooling HTTP/1.1 client.
//!
//! `Session` is the entry point: it owns one capacity-bounded `Pool` per
//! distinct endpoint (`scheme://host:port`) it has been asked to talk to,
//! and multiplexes requests onto leased `Connection`s from those pools.
//!
//! ```no_run
//! # async fn run() -> conduit::Result<()> {
//! let session = conduit::Session::new(8);
//! let response = session.request("GET", "http://example.com/", None).await?;
//! println!("{}", response.status_code());
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod endpoint;
mod error;
mod parser;
mod pool;
mod request;
mod response;
mod session;

pub use config::SessionConfig;
pub use connection::Connection;
pub use endpoint::{EndpointKey, Scheme};
pub use error::{ConduitError, Result};
pub use parser::RawHeader;
pub use pool::Pool;
pub use response::Response;
pub use session::Session;
