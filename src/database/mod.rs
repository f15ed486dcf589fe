pub mod gateway;
pub mod manager;
pub mod models;
pub mod patch;
pub mod postgres;

pub use gateway::{StorageGateway, StorageScope};
pub use manager::{DatabaseError, DatabaseManager};
pub use patch::{Patch, PatchField, PatchValue, UpdateTarget};
pub use postgres::PgGateway;
