pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod prompt;
pub mod validate;
