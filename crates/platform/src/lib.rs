//! Client for the hosted platform's PostgREST-style table endpoint.
//!
//! Every call is made with the project's public key and the *caller's* access
//! token, so the platform evaluates its row-level policies as that caller.

mod client;
mod error;
mod query;

pub use client::PlatformClient;
pub use error::PlatformError;
pub use query::{Filter, Order};
