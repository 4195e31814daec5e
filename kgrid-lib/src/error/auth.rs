//! Authentication error types

/// Errors that can occur while obtaining an access token.
///
/// Login flows live outside this crate; token providers report through this
/// type when they cannot hand out a usable token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token is available (not logged in, or the session was revoked).
    #[error("No access token available: {message}")]
    Unavailable { message: String },

    /// Access token expired and could not be renewed.
    #[error("Token expired and refresh failed: {message}")]
    TokenExpired { message: String },
}
