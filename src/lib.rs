pub mod calc;
pub mod config;
pub mod runtime;
pub mod scenario;
pub mod store;
