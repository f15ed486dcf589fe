pub mod password;
pub mod session;
pub mod token;
pub mod totp;

pub use session::SessionAuthenticator;
