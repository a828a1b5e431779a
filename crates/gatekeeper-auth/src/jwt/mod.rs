//! Token codec: JWT encoding, decoding, and claims.

pub mod claims;
pub mod decoder;
pub mod encoder;
mod keys;

pub use claims::{AccessClaims, RefreshClaims, TokenType};
pub use decoder::JwtDecoder;
pub use encoder::{IssuedToken, JwtEncoder, TokenPair};
pub use keys::token_digest;
