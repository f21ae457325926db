// surepet-api: Async Rust client for the Sure Petcare cloud API

pub mod auth;
pub mod cache;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod transport;

pub use auth::{Credential, LoginCredentials, TokenManager, TokenSource, token_seems_valid};
pub use cache::{CachedResource, ResourceCache};
pub use client::{DEFAULT_BASE_URL, Method, SureClient};
pub use endpoints::Envelope;
pub use error::Error;
pub use transport::TransportConfig;
