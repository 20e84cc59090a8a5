//! Validated identifiers, client credentials, and the cached bearer token.

pub mod credentials;
pub mod id;

pub use credentials::*;
pub use id::*;
pub use oauth2::{AccessToken, ClientSecret};
