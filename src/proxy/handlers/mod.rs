// Handlers module - routes answered by the gateway itself
pub mod special;

pub use special::SpecialRouteResolver;
