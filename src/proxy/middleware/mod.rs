// Middleware module - request annotation and CORS

pub mod cors;
pub mod logging;

pub use cors::CorsNegotiator;
pub use logging::{logging_middleware, RequestId};
