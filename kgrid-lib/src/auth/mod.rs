//! Authentication
//!
//! Only the token seam lives here; interactive sign-in belongs to the host.

mod token;

pub use token::AccessToken;
pub use token::StaticTokenProvider;
pub use token::TokenProvider;
