pub mod envelope;
pub mod request;
pub mod router;

pub use envelope::{Envelope, Reply};
pub use request::{HandlerRequest, JsonBody, Method};
pub use router::app;
