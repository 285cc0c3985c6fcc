pub mod compiler;
pub mod dsl;
pub mod runtime;
pub mod schema;
