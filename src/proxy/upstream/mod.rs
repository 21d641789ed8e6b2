// Upstream module - forwarding engine and failure handling

pub mod body;
pub mod client;
pub mod engine;
pub mod sanitizer;

pub use client::HttpForwarder;
pub use engine::{ForwardError, ForwardedResponse, ForwardingEngine};
pub use sanitizer::{Disposition, ErrorSanitizer, ResponseState};
