pub mod file;
pub mod game;
pub mod platform;
pub mod user;

pub use file::{FileRecord, NewFile};
pub use game::{Game, NewGame};
pub use platform::{NewPlatform, StreamingPlatform};
pub use user::{LoginRecord, UserProfile};
