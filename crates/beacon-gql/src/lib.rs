//! Beacon GQL — GraphQL client for the remote civic API.
//!
//! Every request flows through [`GqlClient`], which brackets it with a
//! loading guard so the shared loading indicator reflects all in-flight
//! queries and mutations, including ones that fail or are cancelled.

pub mod client;
pub mod types;

pub use client::{GqlClient, GqlError};
pub use types::{GqlErrorEntry, GqlRequest, GqlResponse};
