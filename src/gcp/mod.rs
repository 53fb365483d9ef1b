//! Google Cloud credential handling and OAuth token minting.

pub mod credentials;
pub mod token;

pub use credentials::ServiceAccountKey;
pub use token::TokenProvider;
