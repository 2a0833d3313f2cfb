// Credential lifecycle (reuse / refresh / authorize)
pub mod auth;

// Environment-style configuration
pub mod config;

// Encrypted credential storage and staleness policy
pub mod credentials;

// Error taxonomy
pub mod error;

// Product search and flattening
pub mod etl;

// OAuth token exchanges
pub mod oauth;

pub use error::{Error, Result};
