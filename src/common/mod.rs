pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod models;
pub mod utils;
